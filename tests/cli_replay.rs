use std::path::PathBuf;
use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rig_cli"))
}

fn fixture_file(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

fn json_lines(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8(stdout.to_vec())
        .expect("stdout UTF-8")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("JSON line"))
        .collect()
}

#[test]
fn replay_center_calibration_succeeds() {
    let output = cli()
        .args(["replay", "--input", "center_burst", "--calibrate", "center"])
        .output()
        .expect("failed to run rig_cli replay");
    assert!(
        output.status.success(),
        "CLI exited with {:?}",
        output.status.code()
    );

    let lines = json_lines(&output.stdout);
    // 7 live batches, 1 calibration payload, 1 summary
    assert_eq!(lines.len(), 9, "unexpected output: {lines:?}");

    let live: Vec<&Value> = lines.iter().filter(|l| l.get("locations").is_some()).collect();
    assert_eq!(live.len(), 7);
    for pair in live.windows(2) {
        let a = pair[0]["locations"][0]["ts"].as_f64().unwrap();
        let b = pair[1]["locations"][0]["ts"].as_f64().unwrap();
        assert!(b - a >= 0.2 - 1e-9, "live fixes {a} and {b} too close");
    }

    // calibration payload precedes the live fix that completed it
    assert!(lines[5].get("centerCalibration").is_some());
    assert_eq!(lines[5]["centerCalibration"]["samples"], 10);
    let lat = lines[5]["centerCalibration"]["lat"].as_f64().unwrap();
    assert!((lat - 47.3769).abs() < 1e-4);

    let summary = &lines[8]["summary"];
    assert_eq!(summary["last_center"]["sample_count"], 10);
    assert_eq!(summary["calibration"]["status"], "completed");
    assert_eq!(summary["counters"]["live_forwarded"], 7);
    assert_eq!(summary["counters"]["deliveries_succeeded"], 8);
}

#[test]
fn replay_without_calibration_only_streams() {
    let output = cli()
        .args(["replay", "--input", &fixture_file("center_burst.jsonl")])
        .output()
        .expect("failed to run replay by path");
    assert!(output.status.success());

    let lines = json_lines(&output.stdout);
    assert_eq!(lines.len(), 8);
    assert!(lines[..7].iter().all(|l| l.get("locations").is_some()));
    assert!(lines[7]["summary"]["last_center"].is_null());
}

#[test]
fn replay_rig_calibration_fails_at_deadline() {
    let output = cli()
        .args(["replay", "--input", "sparse_rig", "--calibrate", "rig"])
        .output()
        .expect("failed to run sparse replay");
    assert_eq!(output.status.code(), Some(2));

    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(
        stderr.contains("RIG calibration did not complete"),
        "expected failure report, got {stderr}"
    );

    let lines = json_lines(&output.stdout);
    assert!(lines.iter().all(|l| l.get("rigCalibration").is_none()));
    let summary = &lines.last().expect("summary line")["summary"];
    assert_eq!(summary["calibration"]["status"], "failed");
    assert!(summary["last_rig"].is_null());
}

#[test]
fn replay_missing_track_is_an_error() {
    let output = cli()
        .args(["replay", "--input", "does_not_exist"])
        .output()
        .expect("failed to run replay");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn config_prints_defaults() {
    let output = cli().arg("config").output().expect("failed to run config");
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).expect("config JSON");
    assert_eq!(json["calibration"]["min_good_samples"], 10);
    assert_eq!(json["calibration"]["max_duration_ms"], 20_000);
    assert_eq!(json["live"]["min_send_interval_ms"], 200);
}

#[test]
fn dump_fixtures_lists_tracks() {
    let output = cli()
        .arg("dump-fixtures")
        .output()
        .expect("failed to run dump-fixtures");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    assert!(stdout.contains("center_burst"), "got {stdout}");
    assert!(stdout.contains("sparse_rig"), "got {stdout}");
}
