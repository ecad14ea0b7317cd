//! Integration tests for CLI output behavior
//!
//! Every run gets its own HOME and working directory so only the config
//! written by the test is loaded. The default behavior is quiet; use
//! -v/--verbose to enable logs.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    config: PathBuf,
}

impl Fixture {
    /// A file-poll holdings feed with two rows, an embedded static chart,
    /// and a manual-file chart whose file does not exist.
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let holdings = dir.path().join("holdings.csv");
        std::fs::write(&holdings, "symbol,qty\nAAPL,10\nMSFT,5\n").unwrap();
        let missing = dir.path().join("missing.csv");

        let config = dir.path().join("fresh.toml");
        std::fs::write(
            &config,
            format!(
                r#"
[engine]
fetch_timeout_secs = 5

[[charts]]
chart_type = "holdings"
[charts.source]
kind = "manual-file"
location = "{holdings}"
refresh_method = "file-poll"
[charts.policy]
warning_age_hours = 24
error_age_hours = 48

[[charts]]
chart_type = "sectors"
[charts.source]
kind = "static"
location = "embedded"
[charts.policy]
warning_age_hours = 24
error_age_hours = 48

[[charts]]
chart_type = "orders"
[charts.source]
kind = "manual-file"
location = "{missing}"
refresh_method = "file-poll"
[charts.policy]
warning_age_hours = 24
error_age_hours = 48
max_retries = 1
"#,
                holdings = holdings.display(),
                missing = missing.display(),
            ),
        )
        .unwrap();

        Self { dir, config }
    }

    fn run(&self, args: &[&str]) -> Output {
        run_in(self.dir.path(), &self.config, args)
    }
}

fn run_in(dir: &Path, config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_chartfresh"))
        .args(args)
        .arg("--config")
        .arg(config)
        .current_dir(dir)
        .env("HOME", dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute chartfresh")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_status_json_lists_every_chart() {
    let fixture = Fixture::new();
    let output = fixture.run(&["status", "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let statuses: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let statuses = statuses.as_array().unwrap();
    assert_eq!(statuses.len(), 3);

    let by_name = |name: &str| {
        statuses
            .iter()
            .find(|s| s["chart_type"] == name)
            .unwrap_or_else(|| panic!("{} missing from output", name))
    };
    assert_eq!(by_name("holdings")["status"], "available");
    assert_eq!(by_name("holdings")["last_update_source"], "manual");
    assert_eq!(by_name("orders")["status"], "missing");
    assert_eq!(by_name("sectors")["capability"]["can_refresh"], false);
    assert_eq!(
        by_name("sectors")["capability"]["reason"],
        "Static data source cannot be refreshed"
    );
}

#[test]
fn test_status_single_chart_json() {
    let fixture = Fixture::new();
    let output = fixture.run(&["status", "holdings", "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let status: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(status["chart_type"], "holdings");
    assert_eq!(status["source_kind"], "manual-file");
}

#[test]
fn test_status_unknown_chart_fails() {
    let fixture = Fixture::new();
    let output = fixture.run(&["status", "nope"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Chart 'nope' is not configured"));
}

#[test]
fn test_status_table_is_pipeable() {
    let fixture = Fixture::new();
    let output = fixture.run(&["status"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let stdout = stdout(&output);
    assert!(stdout.contains("holdings"));
    assert!(stdout.contains("static"));
    for line in stdout.lines() {
        let trimmed = line.trim();
        assert!(
            !trimmed.starts_with('{'),
            "stdout contains JSON line: {}",
            line
        );
    }
}

#[test]
fn test_refresh_file_chart_reports_records() {
    let fixture = Fixture::new();
    let output = fixture.run(&["refresh", "holdings", "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let result: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(result["success"], true);
    assert_eq!(result["records_updated"], 2);
    assert_eq!(result["chart_type"], "holdings");
    assert_eq!(result["progress"].as_array().unwrap().last().unwrap(), "caching");
}

#[test]
fn test_refresh_human_output_prints_progress() {
    let fixture = Fixture::new();
    let output = fixture.run(&["refresh", "holdings", "--priority", "high"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let stdout = stdout(&output);
    assert!(stdout.contains("connecting..."));
    assert!(stdout.contains("Refreshed holdings"));
    assert!(stdout.contains("Records:  2"));
}

#[test]
fn test_refresh_static_chart_exits_nonzero() {
    let fixture = Fixture::new();
    let output = fixture.run(&["refresh", "sectors", "--json"]);
    assert_eq!(output.status.code(), Some(1));

    let result: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(result["success"], false);
    assert_eq!(result["error"]["code"], "REFRESH_NOT_AVAILABLE");
}

#[test]
fn test_refresh_missing_file_exits_nonzero() {
    let fixture = Fixture::new();
    let output = fixture.run(&["refresh", "orders"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Refresh of orders failed"));
}

#[test]
fn test_config_prints_merged_toml() {
    let fixture = Fixture::new();
    let output = fixture.run(&["config"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let parsed: toml::Value = toml::from_str(&stdout(&output)).unwrap();
    assert_eq!(parsed["engine"]["fetch_timeout_secs"].as_integer(), Some(5));
    assert_eq!(parsed["charts"].as_array().unwrap().len(), 3);
}

#[test]
fn test_broken_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("broken.toml");
    std::fs::write(&config, "[[charts]\nchart_type = ").unwrap();

    let output = run_in(dir.path(), &config, &["status"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Could not load config"));
}

#[test]
fn test_quiet_mode_keeps_logs_off_stdout() {
    let fixture = Fixture::new();
    let output = fixture.run(&["status"]);
    assert!(output.status.success());
    assert!(
        !stdout(&output).contains(r#""event":"#),
        "stdout should not contain JSON logs"
    );
    assert!(
        !stderr(&output).contains("cli.status_started"),
        "info events should be suppressed by default"
    );
}

#[test]
fn test_verbose_mode_emits_json_logs_to_stderr() {
    let fixture = Fixture::new();
    let output = fixture.run(&["-v", "status"]);
    assert!(output.status.success());

    let stderr = stderr(&output);
    assert!(stderr.contains(r#""event":"cli.status_started""#));
    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
        assert!(
            serde_json::from_str::<serde_json::Value>(line).is_ok(),
            "verbose stderr line is not JSON: {}",
            line
        );
    }
}
