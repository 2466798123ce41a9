//! CLI utilities and helpers

pub mod commands;
pub mod handlers;

use std::{ffi::OsString, path::PathBuf};

use clap::ArgMatches;
pub use commands::build_cli;

/// Flags shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub database_dir: Option<PathBuf>,
    pub logging: bool,
    pub json: bool,
    pub verbose: bool,
}

impl GlobalOptions {
    /// Global args propagate down, so the innermost matches see them all.
    pub fn from_matches(matches: &ArgMatches) -> Self {
        let scoped = matches.subcommand().map_or(matches, |(_, sub)| sub);
        Self {
            config: scoped.get_one::<PathBuf>("config").cloned(),
            database_dir: scoped.get_one::<PathBuf>("database-dir").cloned(),
            logging: scoped.get_flag("logging"),
            json: scoped.get_flag("json"),
            verbose: scoped.get_flag("verbose"),
        }
    }
}

/// Options whose next argument is a value and never a switch.
const VALUE_OPTIONS: [&str; 4] = ["--config", "-c", "--database-dir", "-d"];

/// Accept the Windows-style `/l` switch, and the logging switch in any
/// letter case, as `--logging`.
///
/// The program name and option values pass through untouched, so a
/// directory literally named `/l` stays a directory.
pub fn normalize_legacy_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    let mut args = args.into_iter();
    let mut normalized: Vec<OsString> = args.next().into_iter().collect();
    let mut value_expected = false;

    for arg in args {
        if value_expected {
            value_expected = false;
            normalized.push(arg);
            continue;
        }

        let text = arg.to_string_lossy();
        value_expected = VALUE_OPTIONS.contains(&text.as_ref());
        if is_logging_switch(&text) {
            normalized.push(OsString::from("--logging"));
        } else {
            normalized.push(arg);
        }
    }

    normalized
}

fn is_logging_switch(arg: &str) -> bool {
    ["/l", "-l", "--logging"]
        .iter()
        .any(|switch| arg.eq_ignore_ascii_case(switch))
}
