//! Command handlers: load configuration, run the worker, render results.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ArgMatches;
use dbupdater_core::{
    preflight, AttachmentState, ChannelReporter, Config, LifecycleController, LifecycleOutcome,
    PathSource, Trace,
};

use super::GlobalOptions;
use crate::{console::Console, tds::TdsEngine};

/// Format an error for display, appending its cause when it adds detail.
pub fn format_error(err: &anyhow::Error) -> String {
    let msg = err.to_string();
    if let Some(source) = err.source() {
        let source_msg = source.to_string();
        if !msg.contains(&source_msg) && !source_msg.is_empty() {
            return format!("{msg}\nCause: {source_msg}");
        }
    }
    msg
}

/// Dispatch to the selected command and return the process exit code.
pub async fn run_cli(matches: &ArgMatches) -> Result<i32> {
    let options = GlobalOptions::from_matches(matches);
    let config = load_config(&options).await?;

    match matches.subcommand_name() {
        Some("check") => handle_check(&config, &options).await,
        Some("run") | None => handle_run(config, &options).await,
        Some(other) => anyhow::bail!("Unknown command '{other}'"),
    }
}

/// Defaults, config files and environment, then the command-line flags.
pub async fn load_config(options: &GlobalOptions) -> Result<Config> {
    let mut config = Config::load(options.config.as_deref()).await?;

    if let Some(dir) = &options.database_dir {
        config.database_dir = Some(dir.clone());
    }
    if options.logging {
        config.trace.enabled = true;
    }

    tracing::debug!(
        "Configured database '{}', procedure '{}', directory {:?}",
        config.database,
        config.procedure,
        config.database_dir
    );
    Ok(config)
}

pub async fn handle_run(config: Config, options: &GlobalOptions) -> Result<i32> {
    let plan = config.upgrade_plan()?;
    let engine = TdsEngine::from_connection_string(&config.connection)?;
    let trace = open_trace(&config);
    let console = Console::new(options.json);

    let (reporter, mut events) = ChannelReporter::channel();
    let controller = LifecycleController::new(engine, config.clone(), plan)
        .with_reporter(Arc::new(reporter))
        .with_trace(trace.clone())
        .with_stage_timeout(config.stage_timeout());

    let worker = tokio::spawn(controller.run());

    // Ends once the worker drops its reporter, whether it finished or panicked.
    while let Some(event) = events.recv().await {
        console.event(&event);
    }

    let outcome = match worker.await {
        Ok(outcome) => outcome,
        Err(join_error) => {
            tracing::error!("Upgrade worker aborted: {join_error}");
            trace.line(format!("Error Unexpected failure: {join_error}"));
            trace.flush();
            LifecycleOutcome {
                stage_reached: None,
                success: false,
                message: format!("Unexpected failure: {join_error}"),
                attachment: AttachmentState::Unknown,
                files_deleted: false,
                error: None,
            }
        }
    };

    console.outcome(&outcome);
    Ok(outcome.exit_code())
}

pub async fn handle_check(config: &Config, options: &GlobalOptions) -> Result<i32> {
    let plan = config.upgrade_plan()?;
    let engine = TdsEngine::from_connection_string(&config.connection)
        .context("Cannot check engine connectivity")?;

    let report = preflight(&engine, config, &plan).await;
    Console::new(options.json).preflight(&plan, &report);

    Ok(i32::from(!report.is_ready()))
}

/// Open the trace log in the database directory when enabled.
///
/// A trace that cannot be opened is reported and skipped; it never stops a run.
fn open_trace(config: &Config) -> Trace {
    if !config.trace.enabled {
        return Trace::disabled();
    }

    let path = match config.database_dir() {
        Ok(dir) => config.trace_path(&dir),
        Err(e) => {
            tracing::warn!("No trace log: {e}");
            return Trace::disabled();
        }
    };

    match Trace::to_file(&path) {
        Ok(trace) => {
            trace.line(format!("DbUpdater version {}", env!("CARGO_PKG_VERSION")));
            trace.blank();
            trace
        }
        Err(e) => {
            tracing::warn!("{e}; continuing without a trace log");
            Trace::disabled()
        }
    }
}
