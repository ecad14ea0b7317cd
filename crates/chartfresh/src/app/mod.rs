mod global;
mod query;
mod refresh;

#[cfg(test)]
mod tests;

use clap::Command;

pub fn build_cli() -> Command {
    global::root_command()
        .subcommand(query::status_command())
        .subcommand(refresh::refresh_command())
        .subcommand(refresh::watch_command())
        .subcommand(query::config_command())
}
