use std::path::PathBuf;

use clap::{Arg, ArgAction, Command};

pub fn root_command() -> Command {
    Command::new("chartfresh")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Track freshness of chart data feeds and orchestrate their refreshes")
        .long_about("chartfresh classifies every configured chart feed as available, stale, error or missing by the age of its data, and refreshes feeds under per-service rate limits and a global concurrency cap. File-backed feeds are watched and picked up as soon as they change.")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("Config file merged over the user and project configs")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
}
