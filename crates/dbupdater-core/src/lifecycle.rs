//! Attach → execute → detach lifecycle controller.
//!
//! The controller walks [`LifecyclePhase`] in fixed order and never moves
//! backwards. Failures before the procedure end the run immediately. A
//! procedure failure does not: connections are still closed and the
//! database still detached, so the engine is not left holding a locked
//! half-upgraded database, but the cleanup gate then keeps the files.

use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::Serialize;

use crate::{
    config::PathSource,
    engine::{release, ConnectionScope, Engine},
    report::StatusReporter,
    stages::{self, CleanupDecision},
    trace::Trace,
    types::{
        AttachmentState, DatabaseFileSet, DatabaseName, FileNames, LifecycleOutcome,
        ProcedureName, Stage, StatusEvent,
    },
    Error, Result,
};

// ═══════════════════════════════════════════════════════════════════════════
// STATE MACHINE CONTRACT
// ═══════════════════════════════════════════════════════════════════════════

/// Shared contract for lifecycle state machines
///
/// # Contract Requirements
///
/// 1. **Transition Consistency**: `can_transition_to(next)` must return true if and only if `next`
///    is in `valid_next_states()`
///
/// 2. **Terminal States**: If `is_terminal()` returns true, `valid_next_states()` must return an
///    empty vec
///
/// 3. **Non-Terminal States**: If `is_terminal()` returns false, `valid_next_states()` must return
///    at least one state
///
/// 4. **Exhaustive Matching**: `all_states()` must return all possible enum variants
pub trait LifecycleState: Copy + Eq + Sized + 'static {
    /// Returns true if transition from `self` to `next` is valid
    fn can_transition_to(self, next: Self) -> bool {
        self.valid_next_states().contains(&next)
    }

    /// Returns all valid next states from current state
    fn valid_next_states(self) -> Vec<Self>;

    /// Returns true if this is a terminal state (no transitions out)
    fn is_terminal(self) -> bool;

    /// Returns all possible states for this state machine
    fn all_states() -> &'static [Self];
}

/// Controller states, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Start,
    PathResolved,
    FilesVerified,
    AttachmentChecked,
    Attached,
    ProcedureExecuted,
    ConnectionsClosed,
    Detached,
    CleanupDone,
    CleanupSkipped,
    Finished,
}

impl LifecycleState for LifecyclePhase {
    fn valid_next_states(self) -> Vec<Self> {
        match self {
            Self::Start => vec![Self::PathResolved, Self::Finished],
            Self::PathResolved => vec![Self::FilesVerified, Self::Finished],
            Self::FilesVerified => vec![Self::AttachmentChecked, Self::Finished],
            // Already attached: the attach step is skipped.
            Self::AttachmentChecked => {
                vec![Self::Attached, Self::ProcedureExecuted, Self::Finished]
            }
            Self::Attached => vec![Self::ProcedureExecuted],
            Self::ProcedureExecuted => vec![Self::ConnectionsClosed],
            Self::ConnectionsClosed => vec![Self::Detached, Self::CleanupSkipped],
            Self::Detached => vec![Self::CleanupDone, Self::CleanupSkipped],
            Self::CleanupDone | Self::CleanupSkipped => vec![Self::Finished],
            Self::Finished => Vec::new(),
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Finished)
    }

    fn all_states() -> &'static [Self] {
        &[
            Self::Start,
            Self::PathResolved,
            Self::FilesVerified,
            Self::AttachmentChecked,
            Self::Attached,
            Self::ProcedureExecuted,
            Self::ConnectionsClosed,
            Self::Detached,
            Self::CleanupDone,
            Self::CleanupSkipped,
            Self::Finished,
        ]
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PLAN
// ═══════════════════════════════════════════════════════════════════════════

/// Validated names for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradePlan {
    database: DatabaseName,
    procedure: ProcedureName,
    file_names: FileNames,
}

impl UpgradePlan {
    pub const fn new(database: DatabaseName, procedure: ProcedureName, file_names: FileNames) -> Self {
        Self {
            database,
            procedure,
            file_names,
        }
    }

    pub const fn database(&self) -> &DatabaseName {
        &self.database
    }

    pub const fn procedure(&self) -> &ProcedureName {
        &self.procedure
    }

    pub const fn file_names(&self) -> &FileNames {
        &self.file_names
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CONTROLLER
// ═══════════════════════════════════════════════════════════════════════════

/// Runs the lifecycle once. [`LifecycleController::run`] consumes the
/// controller, so a finished run cannot be re-entered.
pub struct LifecycleController<E, P> {
    engine: E,
    paths: P,
    plan: UpgradePlan,
    reporter: Arc<dyn StatusReporter>,
    trace: Trace,
    stage_timeout: Option<Duration>,
    phase: LifecyclePhase,
    reached: Option<Stage>,
    attachment: AttachmentState,
    files_deleted: bool,
}

impl<E, P> LifecycleController<E, P>
where
    E: Engine,
    P: PathSource,
{
    pub fn new(engine: E, paths: P, plan: UpgradePlan) -> Self {
        Self {
            engine,
            paths,
            plan,
            reporter: Arc::new(|_: StatusEvent| {}),
            trace: Trace::disabled(),
            stage_timeout: None,
            phase: LifecyclePhase::Start,
            reached: None,
            attachment: AttachmentState::Unknown,
            files_deleted: false,
        }
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn StatusReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.trace = trace;
        self
    }

    /// Deadline applied to every engine-facing stage.
    #[must_use]
    pub const fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Drive the lifecycle to `Finished` and return the outcome.
    ///
    /// Never returns an error: every failure is converted into a failed
    /// outcome with a human-readable message.
    pub async fn run(mut self) -> LifecycleOutcome {
        self.reporter
            .report(StatusEvent::starting("Opening connection to database"));

        let result = self.drive().await;
        self.phase = LifecyclePhase::Finished;

        let outcome = match result {
            Ok(()) => LifecycleOutcome {
                stage_reached: self.reached,
                success: true,
                message: format!("Database '{}' upgraded", self.plan.database),
                attachment: self.attachment,
                files_deleted: self.files_deleted,
                error: None,
            },
            Err(err) => {
                self.trace.line(format!("Error {err}"));
                LifecycleOutcome {
                    stage_reached: self.reached,
                    success: false,
                    message: err.to_string(),
                    attachment: self.attachment,
                    files_deleted: self.files_deleted,
                    error: Some(err),
                }
            }
        };

        self.trace.line("Done");
        self.trace.flush();
        outcome
    }

    async fn drive(&mut self) -> Result<()> {
        let dir = self.resolve_path()?;
        let files = self.verify_files(&dir)?;
        self.ensure_attached(&files).await?;

        let procedure = self.execute_procedure().await;
        self.close_connections().await?;
        let detach = self.detach().await;

        let decision = CleanupDecision::evaluate(procedure.is_ok(), detach.is_ok());
        let cleanup = self.cleanup(&files, decision);
        self.advance(LifecyclePhase::Finished)?;

        // The procedure's error is the one worth surfacing.
        procedure.and(detach).and(cleanup)
    }

    fn resolve_path(&mut self) -> Result<PathBuf> {
        let dir = self.terminal(Stage::PathResolved, self.paths.database_dir())?;
        self.trace.line(format!("Database Path: {}", dir.display()));
        self.advance(LifecyclePhase::PathResolved)?;
        self.reach(
            Stage::PathResolved,
            format!("Database directory: {}", dir.display()),
        );
        Ok(dir)
    }

    fn verify_files(&mut self, dir: &Path) -> Result<DatabaseFileSet> {
        self.trace.line("Checking that the data and log files exist");
        let files = self.terminal(
            Stage::FilesVerified,
            stages::verify_files(dir, self.plan.file_names()),
        )?;
        for (kind, path) in files.files() {
            self.trace.line(format!("Found {kind} file {}", path.display()));
        }
        self.advance(LifecyclePhase::FilesVerified)?;
        self.reach(Stage::FilesVerified, "Database files found");
        Ok(files)
    }

    async fn ensure_attached(&mut self, files: &DatabaseFileSet) -> Result<()> {
        let name = self.plan.database.clone();

        self.trace.line(format!("Checking whether '{name}' is attached"));
        let probed = self
            .deadline(
                "Attachment check",
                stages::probe_attachment(&self.engine, &name),
            )
            .await;
        self.attachment = self.terminal(Stage::Attached, probed)?;
        self.advance(LifecyclePhase::AttachmentChecked)?;

        if self.attachment == AttachmentState::Attached {
            self.trace.line(format!("'{name}' is already attached"));
            self.reach(
                Stage::Attached,
                format!("Database '{name}' is already attached"),
            );
            return Ok(());
        }

        self.trace
            .line(format!("'{name}' is not attached, attempting to attach it"));
        self.reporter.report(StatusEvent::at(
            Stage::FilesVerified,
            format!("Database '{name}' is not attached. Attempting to attach..."),
            true,
        ));
        let attached = self
            .deadline("Attach", stages::attach_database(&self.engine, &name, files))
            .await;
        self.terminal(Stage::Attached, attached)?;

        self.attachment = AttachmentState::Attached;
        self.advance(LifecyclePhase::Attached)?;
        self.trace.line(format!("'{name}' attached"));
        self.reach(
            Stage::Attached,
            format!("Database '{name}' attached successfully"),
        );
        Ok(())
    }

    /// Runs the upgrade; a failure is reported but not propagated here.
    async fn execute_procedure(&mut self) -> Result<()> {
        let name = self.plan.database.clone();
        let procedure = self.plan.procedure.clone();

        self.trace.line(format!("Executing {procedure}"));
        let result = self
            .deadline(
                "Stored procedure",
                stages::run_procedure(&self.engine, &name, &procedure),
            )
            .await;
        self.advance(LifecyclePhase::ProcedureExecuted)?;

        match &result {
            Ok(()) => {
                self.trace.line(format!("{procedure} succeeded"));
                self.reach(
                    Stage::ProcedureRan,
                    format!("Stored procedure '{procedure}' executed successfully"),
                );
            }
            Err(err) => {
                tracing::error!("Upgrade procedure {procedure} failed: {err}");
                self.trace.line(format!("{procedure} failed: {err}"));
                self.reached = Some(Stage::ProcedureRan);
                self.reporter.report(StatusEvent::at(
                    Stage::ProcedureRan,
                    format!("Stored procedure '{procedure}' failed: {err}"),
                    false,
                ));
            }
        }
        result
    }

    async fn close_connections(&mut self) -> Result<()> {
        let name = self.plan.database.clone();

        self.trace.line("Closing database connections");
        let reaped = self
            .deadline("Close connections", async {
                Ok(stages::close_connections(&self.engine, &name).await)
            })
            .await;
        self.advance(LifecyclePhase::ConnectionsClosed)?;

        let (text, clean) = match reaped {
            Ok(summary) if summary.is_clean() => (
                format!(
                    "Closed {} connection(s) to '{name}'",
                    summary.killed
                ),
                true,
            ),
            Ok(summary) => (
                format!(
                    "Closed {} of {} connection(s) to '{name}'{}",
                    summary.killed,
                    summary.found,
                    summary
                        .error
                        .map(|e| format!(": {e}"))
                        .unwrap_or_default()
                ),
                false,
            ),
            Err(err) => (format!("Closing connections to '{name}' gave up: {err}"), false),
        };
        self.trace.line(&text);
        self.reached = Some(Stage::ConnectionsClosed);
        self.reporter
            .report(StatusEvent::at(Stage::ConnectionsClosed, text, clean));
        Ok(())
    }

    async fn detach(&mut self) -> Result<()> {
        let name = self.plan.database.clone();

        self.trace.line(format!("Detaching '{name}'"));
        let result = self
            .deadline("Detach", stages::detach_database(&self.engine, &name))
            .await;

        match &result {
            Ok(()) => {
                self.advance(LifecyclePhase::Detached)?;
                self.attachment = AttachmentState::NotAttached;
                self.trace.line(format!("'{name}' detached"));
                self.reach(
                    Stage::Detached,
                    format!("Database '{name}' detached successfully"),
                );
            }
            Err(err) => {
                tracing::error!("Detach of '{name}' failed: {err}");
                self.trace.line(format!("Detach failed: {err}"));
                self.reporter.report(StatusEvent::at(
                    Stage::Detached,
                    format!("Failed to detach database '{name}': {err}"),
                    false,
                ));
            }
        }
        result
    }

    fn cleanup(&mut self, files: &DatabaseFileSet, decision: CleanupDecision) -> Result<()> {
        if !decision.allows_deletion() {
            self.advance(LifecyclePhase::CleanupSkipped)?;
            self.trace
                .line(format!("Keeping database files: {decision}"));
            self.reporter.report(StatusEvent::at(
                Stage::FilesDeleted,
                format!("Database files kept because {decision}"),
                false,
            ));
            return Ok(());
        }

        self.trace.line("Deleting database files");
        let report = stages::delete_files(files);
        self.advance(LifecyclePhase::CleanupDone)?;

        for path in &report.deleted {
            self.trace.line(format!("Deleted {}", path.display()));
        }

        if !report.is_complete() {
            let failures = report
                .failed
                .iter()
                .map(|(path, reason)| format!("{}: {reason}", path.display()))
                .collect::<Vec<_>>()
                .join("; ");
            self.files_deleted = false;
            self.reporter.report(StatusEvent::at(
                Stage::FilesDeleted,
                format!("Failed to delete {failures}"),
                false,
            ));
            return Err(Error::IoError(format!("Failed to delete {failures}")));
        }

        self.files_deleted = true;
        self.reach(Stage::FilesDeleted, "Database files deleted");
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────
    // helpers
    // ───────────────────────────────────────────────────────────────────────

    fn advance(&mut self, next: LifecyclePhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!("Lifecycle {} -> {next}", self.phase);
        self.phase = next;
        Ok(())
    }

    /// Record a completed stage and report it.
    fn reach(&mut self, stage: Stage, text: impl Into<String>) {
        self.reached = Some(stage);
        self.reporter.report(StatusEvent::at(stage, text, true));
    }

    /// Pass a result through, reporting its failure as the run's last event.
    fn terminal<T>(&self, stage: Stage, result: Result<T>) -> Result<T> {
        result.inspect_err(|err| {
            if err.is_precondition() {
                tracing::warn!("{stage} failed before any engine contact: {err}");
            } else {
                tracing::error!("{stage} failed: {err}");
            }
            self.reporter
                .report(StatusEvent::at(stage, err.to_string(), false));
        })
    }

    async fn deadline<T>(&self, stage: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match self.stage_timeout {
            None => fut.await,
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| Error::StageTimeout {
                    stage: stage.to_string(),
                    seconds: limit.as_secs(),
                })?,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PREFLIGHT
// ═══════════════════════════════════════════════════════════════════════════

/// Read-only diagnostics: everything a run would check, nothing it would do.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PreflightReport {
    pub database_dir: Option<PathBuf>,
    pub files: Option<DatabaseFileSet>,
    pub server_version: Option<String>,
    pub attachment: AttachmentState,
    pub problems: Vec<String>,
}

impl PreflightReport {
    pub fn is_ready(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Check directory, files and engine connectivity without side effects.
///
/// Unlike a run, a missing file does not stop the check: connectivity is
/// still tested so one pass reports every problem.
pub async fn preflight<E, P>(engine: &E, paths: &P, plan: &UpgradePlan) -> PreflightReport
where
    E: Engine + ?Sized,
    P: PathSource + ?Sized,
{
    let mut report = PreflightReport::default();

    match paths.database_dir() {
        Ok(dir) => {
            match stages::verify_files(&dir, plan.file_names()) {
                Ok(files) => report.files = Some(files),
                Err(e) => report.problems.push(e.to_string()),
            }
            report.database_dir = Some(dir);
        }
        Err(e) => report.problems.push(e.to_string()),
    }

    let mut conn = match engine.connect(&ConnectionScope::Admin).await {
        Ok(conn) => conn,
        Err(e) => {
            report.problems.push(e.to_string());
            return report;
        }
    };

    match conn.server_version().await {
        Ok(version) => report.server_version = Some(version),
        Err(e) => report.problems.push(e.to_string()),
    }

    match conn.database_exists(plan.database()).await {
        Ok(true) => report.attachment = AttachmentState::Attached,
        Ok(false) => report.attachment = AttachmentState::NotAttached,
        Err(e) => report.problems.push(e.to_string()),
    }

    release(conn).await;
    report
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod lifecycle_tests;
