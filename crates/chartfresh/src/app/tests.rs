use std::path::PathBuf;

use super::*;

#[test]
fn test_cli_build() {
    let app = build_cli();
    assert_eq!(app.get_name(), "chartfresh");
}

#[test]
fn test_cli_requires_subcommand() {
    let app = build_cli();
    assert!(app.try_get_matches_from(vec!["chartfresh"]).is_err());
}

#[test]
fn test_cli_status_all() {
    let app = build_cli();
    let matches = app.try_get_matches_from(vec!["chartfresh", "status"]);
    assert!(matches.is_ok());

    let matches = matches.unwrap();
    let status_matches = matches.subcommand_matches("status").unwrap();
    assert!(status_matches.get_one::<String>("chart").is_none());
    assert!(!status_matches.get_flag("json"));
}

#[test]
fn test_cli_status_chart_json() {
    let app = build_cli();
    let matches = app
        .try_get_matches_from(vec!["chartfresh", "status", "holdings", "--json"])
        .unwrap();
    let status_matches = matches.subcommand_matches("status").unwrap();
    assert_eq!(
        status_matches.get_one::<String>("chart").unwrap(),
        "holdings"
    );
    assert!(status_matches.get_flag("json"));
}

#[test]
fn test_cli_refresh_requires_chart() {
    let app = build_cli();
    assert!(
        app.try_get_matches_from(vec!["chartfresh", "refresh"])
            .is_err()
    );
}

#[test]
fn test_cli_refresh_defaults() {
    let app = build_cli();
    let matches = app
        .try_get_matches_from(vec!["chartfresh", "refresh", "quotes"])
        .unwrap();
    let refresh_matches = matches.subcommand_matches("refresh").unwrap();
    assert_eq!(refresh_matches.get_one::<String>("chart").unwrap(), "quotes");
    assert!(!refresh_matches.get_flag("force"));
    assert_eq!(
        refresh_matches.get_one::<String>("priority").unwrap(),
        "normal"
    );
}

#[test]
fn test_cli_refresh_force_and_priority() {
    let app = build_cli();
    let matches = app
        .try_get_matches_from(vec![
            "chartfresh",
            "refresh",
            "quotes",
            "--force",
            "--priority",
            "high",
        ])
        .unwrap();
    let refresh_matches = matches.subcommand_matches("refresh").unwrap();
    assert!(refresh_matches.get_flag("force"));
    assert_eq!(refresh_matches.get_one::<String>("priority").unwrap(), "high");
}

#[test]
fn test_cli_refresh_rejects_unknown_priority() {
    let app = build_cli();
    let matches =
        app.try_get_matches_from(vec!["chartfresh", "refresh", "quotes", "--priority", "urgent"]);
    assert!(matches.is_err());
}

#[test]
fn test_cli_global_flags_after_subcommand() {
    let app = build_cli();
    let matches = app
        .try_get_matches_from(vec![
            "chartfresh",
            "watch",
            "--json",
            "-v",
            "--config",
            "/tmp/fresh.toml",
        ])
        .unwrap();
    assert!(matches.get_flag("verbose"));
    let watch_matches = matches.subcommand_matches("watch").unwrap();
    assert!(watch_matches.get_flag("json"));
    assert_eq!(
        watch_matches.get_one::<PathBuf>("config").unwrap(),
        &PathBuf::from("/tmp/fresh.toml")
    );
}

#[test]
fn test_cli_config_command() {
    let app = build_cli();
    let matches = app
        .try_get_matches_from(vec!["chartfresh", "config"])
        .unwrap();
    assert!(matches.subcommand_matches("config").is_some());
}
