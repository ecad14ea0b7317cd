use clap::{Arg, ArgAction, Command};

pub fn refresh_command() -> Command {
    Command::new("refresh")
        .about("Refresh one chart and report the result")
        .arg(
            Arg::new("chart")
                .help("Chart to refresh")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("force")
                .long("force")
                .short('f')
                .help("Queue behind a refresh that is already running instead of rejecting")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("priority")
                .long("priority")
                .help("Queue priority when the engine is saturated")
                .value_parser(["low", "normal", "high"])
                .default_value("normal"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Output in JSON format")
                .action(ArgAction::SetTrue),
        )
}

pub fn watch_command() -> Command {
    Command::new("watch")
        .about("Watch file-backed charts and print every update until Ctrl-C")
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print one JSON object per line")
                .action(ArgAction::SetTrue),
        )
}
