//! DbUpdater CLI - attach, upgrade and detach a file-based database
//!
//! Binary name: `dbupdater`

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

use std::process;

mod cli;
mod console;
mod tds;

use cli::handlers::{format_error, run_cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = cli::normalize_legacy_args(std::env::args_os());
    let matches = match cli::build_cli().try_get_matches_from(args) {
        Ok(matches) => matches,
        Err(e) => {
            // --help and --version land here too and must exit 0
            let _ = e.print();
            #[allow(clippy::exit)]
            process::exit(e.exit_code());
        }
    };

    init_tracing(cli::GlobalOptions::from_matches(&matches).verbose);

    let code = match run_cli(&matches).await {
        Ok(code) => code,
        Err(err) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Error: {}", format_error(&err));
            }

            err.downcast_ref::<dbupdater_core::Error>()
                .map_or(1, dbupdater_core::Error::exit_code)
        }
    };

    #[allow(clippy::exit)]
    process::exit(code);
}

/// Logs go to stderr so stdout carries only status lines or JSON.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::builder()
            .with_default_directive(tracing::Level::WARN.into())
            .from_env_lossy()
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
