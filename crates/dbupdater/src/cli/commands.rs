//! CLI command definitions using `clap`

use clap::{Arg, ArgAction, Command as ClapCommand};

pub fn after_help_text(examples: &[&str]) -> String {
    let mut text = String::from("EXAMPLES:\n");
    for example in examples {
        text.push_str("  ");
        text.push_str(example);
        text.push('\n');
    }
    text
}

pub fn cmd_run() -> ClapCommand {
    ClapCommand::new("run")
        .about("Attach the database, run the upgrade procedure, detach and delete the files")
        .long_about(
            "Runs the full lifecycle against the configured engine.

            The database files are deleted only when the upgrade procedure
            succeeded and the database was detached. Any other outcome leaves
            them where they are.",
        )
        .after_help(after_help_text(&[
            "dbupdater run                          Upgrade using the configured directory",
            "dbupdater run --database-dir ./db      Upgrade the files in ./db",
            "dbupdater run -l                       Also write DatabaseUpdaterLog.txt",
            "dbupdater run --json                   Emit status events as JSON lines",
        ]))
}

pub fn cmd_check() -> ClapCommand {
    ClapCommand::new("check")
        .about("Check directory, files and engine connectivity without changing anything")
        .after_help(after_help_text(&[
            "dbupdater check                        Report what a run would find",
            "dbupdater check --json                 Same, as one JSON object",
        ]))
}

pub fn build_cli() -> ClapCommand {
    ClapCommand::new("dbupdater")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Attach, upgrade and detach a file-based SQL Server database")
        .long_about(
            "Attaches the database found in the database directory, runs the upgrade
            procedure inside it, closes every other connection, detaches it and
            deletes the physical files once the upgrade provably completed.

            With no command, 'run' is assumed.",
        )
        .subcommand(cmd_run())
        .subcommand(cmd_check())
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_name("FILE")
                .value_parser(clap::value_parser!(std::path::PathBuf))
                .help("Read settings from this TOML file"),
        )
        .arg(
            Arg::new("database-dir")
                .long("database-dir")
                .short('d')
                .global(true)
                .value_name("DIR")
                .value_parser(clap::value_parser!(std::path::PathBuf))
                .help("Directory holding the data and log files"),
        )
        .arg(
            Arg::new("logging")
                .long("logging")
                .short('l')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Write a trace log next to the database files (also accepted as /l)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Output as JSON"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log debug output to stderr"),
        )
}
