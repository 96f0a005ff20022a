//! End-to-end tests driving the `sq` binary.
//!
//! Covers the flow: plan → reconcile → admit → list → cancel → history

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn sq_binary() -> String {
    env!("CARGO_BIN_EXE_sq").to_string()
}

/// Writes a config with a Monday clinic and a night session that crosses midnight.
fn write_config(temp: &Path) -> PathBuf {
    let config_path = temp.join("config.toml");
    let db_path = temp.join("sq.db");
    let config = format!(
        r#"
database_path = "{}"

[schedule.weekly.monday]
is_open = true
start_time = "09:00"
end_time = "01:30"

[schedule.lunch_break]
start = "13:00"
end = "14:00"

[[schedule.templates]]
name = "Morning"
short_code = "S1"
start_time = "09:00"
end_time = "12:00"
max_tokens = 2

[[schedule.templates]]
name = "Night"
short_code = "N"
start_time = "20:00"
end_time = "23:00"
max_tokens = 10

[[schedule.templates]]
name = "Late"
short_code = "L"
start_time = "23:30"
end_time = "01:00"
max_tokens = 10

[[schedule.templates]]
name = "Lunch clash"
short_code = "X"
start_time = "12:30"
end_time = "13:30"
max_tokens = 10
"#,
        db_path.display()
    );
    std::fs::write(&config_path, config).unwrap();
    config_path
}

fn sq(temp: &TempDir, config: &Path, args: &[&str]) -> Output {
    Command::new(sq_binary())
        .env("HOME", temp.path())
        .env("XDG_CONFIG_HOME", temp.path().join("xdg"))
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("failed to run sq")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "sq should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn test_plan_reports_lunch_clash() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());

    let output = stdout(&sq(&temp, &config, &["plan", "--date", "2099-03-02"]));
    assert!(output.contains("Business hours: 09:00-01:30"));
    assert!(output.contains("intersects lunch break"));
    assert!(output.contains("L       Late"));

    // Planning never writes sessions.
    let output = stdout(&sq(
        &temp,
        &config,
        &["sessions", "--date", "2099-03-04", "--json"],
    ));
    assert_eq!(output.trim(), "[]");
}

#[test]
fn test_admission_flow() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());

    let admit = |subject: &str| {
        sq(
            &temp,
            &config,
            &[
                "admit", "--subject", subject, "--code", "S1", "--date", "2099-03-02", "--json",
            ],
        )
    };

    let first: serde_json::Value = serde_json::from_str(&stdout(&admit("alice"))).unwrap();
    assert_eq!(first["token_number"], "T-S1001");
    let second: serde_json::Value = serde_json::from_str(&stdout(&admit("bob"))).unwrap();
    assert_eq!(second["token_number"], "T-S1002");

    let full = admit("carol");
    assert!(!full.status.success());
    let stderr = String::from_utf8_lossy(&full.stderr);
    assert!(stderr.contains("SESSION_FULL"), "stderr: {stderr}");

    let listing = stdout(&sq(&temp, &config, &["sessions", "--date", "2099-03-02"]));
    assert!(listing.contains("S1      Morning           09:00-12:00  2/2"));
    assert!(listing.contains("L       Late              23:30-01:00  0/10"));
    assert!(!listing.contains("Lunch clash"));

    let booking_id = first["id"].as_str().unwrap();
    let cancelled = stdout(&sq(
        &temp,
        &config,
        &["booking", "cancel", booking_id, "--note", "no show"],
    ));
    assert!(cancelled.contains("is now cancelled"));

    let history = stdout(&sq(&temp, &config, &["booking", "history", booking_id]));
    assert!(history.contains("- -> active"));
    assert!(history.contains("active -> cancelled  no show"));
}

#[test]
fn test_late_session_carries_into_next_day() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());

    // Tuesday is closed, but Monday's late session runs into it.
    let output = stdout(&sq(
        &temp,
        &config,
        &["sessions", "--date", "2099-03-03", "--json"],
    ));
    let sessions: serde_json::Value = serde_json::from_str(&output).unwrap();
    let sessions = sessions.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["short_code"], "L");
    assert_eq!(sessions[0]["date"], "2099-03-02");
    assert_eq!(sessions[0]["carried_over"], true);
}

#[test]
fn test_resource_blocks_admission() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());

    stdout(&sq(&temp, &config, &["resource", "add", "dr-lee", "Dr Lee"]));
    stdout(&sq(
        &temp,
        &config,
        &[
            "resource", "block", "dr-lee", "--from", "2099-03-01", "--to", "2099-03-05",
        ],
    ));

    let output = sq(
        &temp,
        &config,
        &[
            "admit", "--subject", "alice", "--code", "N", "--date", "2099-03-02", "--resource",
            "dr-lee",
        ],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("RESOURCE_UNAVAILABLE"), "stderr: {stderr}");
}
