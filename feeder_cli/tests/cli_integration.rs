use assert_cmd::Command;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

// Fast handshake against the simulated board on port SIM0
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let state = dir.path().join("schedule.toml");
    let toml = format!(
        r#"
[serial]
port = "SIM0"
baud = 9600
settle_ms = 0
handshake_timeout_ms = 50
handshake_retries = 1

[schedule]
state_file = "{}"
feed_seconds = 5

[timing]
tick_ms = 50
flush_ms = 10
"#,
        state.display().to_string().replace('\\', "/")
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn feeder(cfg: &Path) -> Command {
    let mut cmd = Command::cargo_bin("feeder").unwrap();
    cmd.arg("--config").arg(cfg).arg("--sim");
    cmd.env_remove("FEEDER_SIM_PORTS")
        .env_remove("FEEDER_SIM_SILENT")
        .env_remove("RUST_LOG");
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["ports"], 0, "SIM0", "stdout")]
#[case(&["self-check"], 0, "PONG", "stdout")]
#[case(&["send", "status"], 0, "Board: Status: OK", "stdout")]
#[case(&["send", "bogus"], 2, "unknown command", "stderr")]
#[case(&["dispense", "--seconds", "99"], 0, "DISPENSE_30", "stdout")]
#[case(&["led-test"], 0, "Average LED response time", "stdout")]
#[case(&["stress-test", "--rounds", "1"], 0, "Stress test results: 4/4", "stdout")]
#[case(&["schedule", "set", "--at", "25:61"], 2, "expected HH:MM", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = feeder(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
#[case("FEEDER_SIM_PORTS", "COM4,COM5", 3, "COM4, COM5")]
#[case("FEEDER_SIM_SILENT", "1", 1, "did not answer PING")]
fn connection_failures_map_to_exit_codes(
    #[case] var: &str,
    #[case] value: &str,
    #[case] code: i32,
    #[case] needle: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    feeder(&cfg)
        .env(var, value)
        .arg("self-check")
        .assert()
        .code(code)
        .stderr(predicate::str::contains(needle));
}

#[test]
fn missing_port_is_explained() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    feeder(&cfg)
        .env("FEEDER_SIM_PORTS", "COM4")
        .args(["send", "ping"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("What happened: Serial port SIM0 was not found."))
        .stdout(predicate::str::contains("port SIM0 not found"));
}

#[test]
fn schedule_survives_restart_and_can_be_cleared() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    feeder(&cfg)
        .args(["schedule", "set", "--at", "08:00", "--interval", "twice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Feeding schedule updated"))
        .stdout(predicate::str::contains("Twice a Day"));
    assert!(dir.path().join("schedule.toml").exists());

    feeder(&cfg)
        .args(["schedule", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Twice a Day"));

    feeder(&cfg)
        .args(["schedule", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Feeding schedule cleared"));

    feeder(&cfg)
        .args(["schedule", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No feeding scheduled"));
}

#[test]
fn corrupt_schedule_file_starts_empty() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    fs::write(dir.path().join("schedule.toml"), "next_feeding = [").unwrap();

    feeder(&cfg)
        .args(["schedule", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No feeding scheduled"));
}

#[test]
fn invalid_config_is_rejected_before_connecting() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[serial]\nbaud = 0\n").unwrap();

    feeder(&path)
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration is invalid"));
}

#[test]
fn malformed_config_is_explained() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[serial\nport = 3").unwrap();

    feeder(&path)
        .arg("ports")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not valid TOML"));
}

#[test]
fn run_stops_after_duration_and_disconnects() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    feeder(&cfg)
        .args(["run", "--duration", "1"])
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .success()
        .stdout(predicate::str::contains("Board connected successfully on SIM0 (PONG)"))
        .stdout(predicate::str::contains("Application closing, disconnecting board..."))
        .stdout(predicate::str::contains("Disconnected from SIM0"));
}

#[test]
fn run_without_board_keeps_going() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    feeder(&cfg)
        .env("FEEDER_SIM_PORTS", "")
        .args(["run", "--duration", "1"])
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .success()
        .stdout(predicate::str::contains("available ports: (none)"));
}
