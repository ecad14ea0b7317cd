use clap::{Arg, ArgAction, Command};

pub fn status_command() -> Command {
    Command::new("status")
        .about("Show freshness status of one chart or all charts")
        .arg(
            Arg::new("chart")
                .help("Chart to show (all charts when omitted)")
                .index(1),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Output in JSON format")
                .action(ArgAction::SetTrue),
        )
}

pub fn config_command() -> Command {
    Command::new("config").about("Print the merged configuration as TOML")
}
