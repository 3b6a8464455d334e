mod common;

use common::CipherHuntProcess;

// ============================================================================
// version command
// ============================================================================

#[test]
fn version_human() {
    let output = CipherHuntProcess::run(&["version"]);
    assert!(
        output.status.success(),
        "version should exit 0: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.starts_with("cipherhunt "),
        "version output should start with the binary name: {stdout}"
    );
    assert!(
        stdout.contains('.'),
        "version output should contain a version number: {stdout}"
    );
}

#[test]
fn version_json() {
    let output = CipherHuntProcess::run(&["version", "--format", "json"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value =
        serde_json::from_str(&stdout).expect("version JSON should be valid");
    assert_eq!(parsed["name"], "cipherhunt");
    assert!(parsed.get("version").is_some(), "JSON should have 'version': {stdout}");
}

// ============================================================================
// completions command
// ============================================================================

#[test]
fn completions_bash() {
    let output = CipherHuntProcess::run(&["completions", "bash"]);
    assert!(
        output.status.success(),
        "completions bash should exit 0: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("cipherhunt"),
        "bash completions should reference cipherhunt"
    );
}

#[test]
fn completions_fish() {
    let output = CipherHuntProcess::run(&["completions", "fish"]);
    assert!(output.status.success());
    assert!(!output.stdout.is_empty());
}

// ============================================================================
// config command
// ============================================================================

#[test]
fn config_validate_accepts_fixture() {
    let path = CipherHuntProcess::fixture_path("quick_game.yaml");
    let output = CipherHuntProcess::run(&["config", "validate", path.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "valid config should exit 0: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("ok"));
}

#[test]
fn config_validate_rejects_invalid() {
    let path = CipherHuntProcess::fixture_path("invalid_game.yaml");
    let output = CipherHuntProcess::run(&[
        "config",
        "validate",
        "--format",
        "json",
        path.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(2), "config errors exit 2");

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report[0]["valid"], false);
    let errors = report[0]["errors"].as_array().unwrap();
    assert!(errors.len() >= 2, "all issues are reported: {errors:?}");
}

#[test]
fn config_validate_strict_fails_on_warnings() {
    let path = CipherHuntProcess::fixture_path("empty_saboteur_catalog.yaml");
    let path = path.to_str().unwrap();

    let lenient = CipherHuntProcess::run(&["config", "validate", path]);
    assert!(lenient.status.success());

    let strict = CipherHuntProcess::run(&["config", "validate", "--strict", path]);
    assert_eq!(strict.status.code(), Some(2));
}

#[test]
fn config_validate_missing_file() {
    let output = CipherHuntProcess::run(&["config", "validate", "/no/such/game.yaml"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn config_show_defaults_as_json() {
    let output = CipherHuntProcess::run(&["config", "show", "--format", "json"]);
    assert!(output.status.success());
    let config: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["meeting"]["task_threshold"], 3);
    assert_eq!(config["meeting"]["duration"], "1m");
}

// ============================================================================
// simulate command
// ============================================================================

#[test]
fn simulate_streams_events() {
    let output = CipherHuntProcess::run(&["simulate", "--seed", "5", "--players", "5"]);
    assert!(
        output.status.success(),
        "simulate should exit 0: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let events: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is one JSON event"))
        .collect();
    assert_eq!(events[0]["type"], "session.created");
    assert_eq!(events.last().unwrap()["type"], "session.archived");
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event["sequence"], i as u64);
    }
}

/// The JSON summary is the last line on stderr.
fn summary(stderr: &[u8]) -> serde_json::Value {
    let text = String::from_utf8_lossy(stderr);
    let line = text.lines().last().expect("summary line");
    serde_json::from_str(line).expect("summary is JSON")
}

#[test]
fn simulate_is_reproducible() {
    let args = [
        "simulate",
        "--seed",
        "42",
        "--no-events",
        "--format",
        "json",
    ];
    let first = CipherHuntProcess::run(&args);
    let second = CipherHuntProcess::run(&args);
    assert!(first.status.success());

    let a = summary(&first.stderr);
    let b = summary(&second.stderr);
    assert_eq!(a["session_id"], b["session_id"]);
    assert_eq!(a["outcome"], b["outcome"]);
    assert_eq!(a["rounds"], b["rounds"]);
}

#[test]
fn simulate_with_fixture_config() {
    let path = CipherHuntProcess::fixture_path("quick_game.yaml");
    let output = CipherHuntProcess::run(&[
        "simulate",
        "--config",
        path.to_str().unwrap(),
        "--players",
        "4",
        "--quiet",
    ]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty(), "--quiet prints nothing");
}

#[test]
fn simulate_rejects_tiny_lobby() {
    let output = CipherHuntProcess::run(&["simulate", "--players", "1"]);
    assert!(!output.status.success());
}
