// Drives the compiled binary's non-interactive subcommands with an isolated HOME.

use assert_cmd::Command;
use std::fs;

fn tracepad(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("tracepad").unwrap();
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn templates_lists_bundled_letters() {
    let home = tempfile::tempdir().unwrap();
    let out = tracepad(home.path()).arg("templates").assert().success();
    let stdout = String::from_utf8_lossy(&out.get_output().stdout).into_owned();

    for letter in ["A", "B", "C"] {
        assert!(stdout.lines().any(|l| l.starts_with(letter) && l.contains("cells")));
    }
}

#[test]
fn replay_prints_metrics_and_submits() {
    let home = tempfile::tempdir().unwrap();
    let events = home.path().join("events.json");
    // left leg of the bundled A, captured on a canvas shown at half size
    fs::write(
        &events,
        r#"[
            {"kind":"down","x":51.0,"y":161.0,"time":0},
            {"kind":"move","x":56.0,"y":151.0,"time":40},
            {"kind":"move","x":61.0,"y":141.0,"time":80},
            {"kind":"move","x":66.0,"y":131.0,"time":120},
            {"kind":"up","x":66.0,"y":131.0,"time":140}
        ]"#,
    )
    .unwrap();

    let out = tracepad(home.path())
        .args(["replay", "--letter", "A", "--display-width", "200", "--display-height", "200"])
        .arg(&events)
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&out.get_output().stdout).into_owned();
    let metrics: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(metrics["stroke_count"], 1);
    assert_eq!(metrics["alignment_score"], 1.0);

    // free drawing is always submittable
    tracepad(home.path())
        .args(["replay", "--letter", "Z", "--submit"])
        .arg(&events)
        .assert()
        .success();

    let state = home.path().join(".local/state/tracepad");
    assert!(state.join("sessions.db").exists());
    assert!(state.join("local_sessions.json").exists());
    assert_eq!(fs::read_dir(state.join("exports")).unwrap().count(), 1);

    let out = tracepad(home.path()).arg("sessions").assert().success();
    let listing = String::from_utf8_lossy(&out.get_output().stdout).into_owned();
    assert!(listing.starts_with("Z  session_"));
    assert!(listing.lines().any(|l| l == "best Z: 100% over 1 submitted"));

    let out = tracepad(home.path())
        .args(["export", "--output", "-"])
        .assert()
        .success();
    let combined = String::from_utf8_lossy(&out.get_output().stdout).into_owned();
    assert!(combined.starts_with("session_id,letter,timestamp,csv_data"));

    tracepad(home.path())
        .args(["sessions", "--clear"])
        .assert()
        .success();
    let out = tracepad(home.path()).arg("sessions").assert().success();
    assert!(out.get_output().stdout.is_empty());
}

#[test]
fn invalid_override_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    tracepad(home.path())
        .args(["templates", "--threshold", "1.5"])
        .assert()
        .failure();
}
