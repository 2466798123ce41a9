//! Presentation side: renders status events and results on stdout.
//!
//! Text mode prints one line per event with its progress; JSON mode prints
//! one object per line so the output can be piped into other tools.

use dbupdater_core::{LifecycleOutcome, PreflightReport, StatusEvent, UpgradePlan};
use serde::Serialize;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Line<'a> {
    Status(&'a StatusEvent),
    Outcome(&'a LifecycleOutcome),
    Check {
        plan: &'a UpgradePlan,
        ready: bool,
        #[serde(flatten)]
        report: &'a PreflightReport,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct Console {
    json: bool,
}

impl Console {
    pub const fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn event(self, event: &StatusEvent) {
        if self.json {
            emit(&Line::Status(event));
        } else {
            println!("{}", format_event(event));
        }
    }

    pub fn outcome(self, outcome: &LifecycleOutcome) {
        if self.json {
            emit(&Line::Outcome(outcome));
        } else if outcome.success {
            println!("✓ Upgrade complete: {}", outcome.message);
        } else {
            println!("✗ Upgrade failed: {}", outcome.message);
        }
    }

    pub fn preflight(self, plan: &UpgradePlan, report: &PreflightReport) {
        if self.json {
            emit(&Line::Check {
                plan,
                ready: report.is_ready(),
                report,
            });
            return;
        }

        println!("Database:   {}", plan.database());
        println!("Procedure:  {}", plan.procedure());
        match &report.database_dir {
            Some(dir) => println!("Directory:  {}", dir.display()),
            None => println!("Directory:  (unresolved)"),
        }
        if let Some(files) = &report.files {
            for (kind, path) in files.files() {
                println!("  {kind} file: {}", path.display());
            }
        }
        match &report.server_version {
            Some(version) => println!("Server:     {version}"),
            None => println!("Server:     (unreachable)"),
        }
        println!("Attachment: {}", report.attachment);

        if report.is_ready() {
            println!("✓ Ready to upgrade");
        } else {
            for problem in &report.problems {
                println!("✗ {problem}");
            }
        }
    }
}

fn format_event(event: &StatusEvent) -> String {
    let mark = if event.success { ' ' } else { '!' };
    format!(
        "[{}/{}]{mark} {}",
        event.progress_count, event.progress_total, event.text
    )
}

fn emit(line: &Line<'_>) {
    match serde_json::to_string(line) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::warn!("Failed to serialize output: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use dbupdater_core::Stage;

    use super::*;

    #[test]
    fn test_event_line_shows_progress() {
        let event = StatusEvent::at(Stage::Attached, "Database 'Sample' attached successfully", true);
        assert_eq!(
            format_event(&event),
            "[3/7]  Database 'Sample' attached successfully"
        );
    }

    #[test]
    fn test_failed_event_is_marked() {
        let event = StatusEvent::at(Stage::Detached, "Failed to detach", false);
        assert!(format_event(&event).starts_with("[6/7]!"));
    }

    #[test]
    fn test_status_json_is_tagged() {
        let event = StatusEvent::starting("Opening connection to database");
        let json = serde_json::to_value(Line::Status(&event)).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["progress_count"], 0);
        assert_eq!(json["text"], "Opening connection to database");
    }
}
