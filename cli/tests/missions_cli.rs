use assert_cmd::Command;
use httpmock::prelude::*;
use httpmock::Method::PATCH;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

const ENV_VARS: [&str; 4] = [
    "CLAWDTALK_API_KEY",
    "CLAWDTALK_API_URL",
    "CLAWDTALK_STATE_FILE",
    "CLAWDTALK_CONFIG",
];

/// Runs in `dir` so the default state file lands there; config points into
/// `dir` as well so the user's own config is never read.
fn bare_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("missionsctl").expect("missionsctl binary");
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.current_dir(dir.path())
        .arg("--config")
        .arg(dir.path().join("config.json"));
    cmd
}

fn missionsctl_cmd(server: &MockServer, dir: &TempDir) -> Command {
    let mut cmd = bare_cmd(dir);
    cmd.env("CLAWDTALK_API_KEY", "test-key-0123456789")
        .env("CLAWDTALK_API_URL", server.base_url());
    cmd
}

fn read_state(dir: &TempDir) -> serde_json::Value {
    let raw = fs::read_to_string(dir.path().join(".missions_state.json")).expect("state file");
    serde_json::from_str(&raw).expect("state json")
}

#[test]
fn init_creates_then_resumes_mission() {
    let server = MockServer::start();
    let dir = TempDir::new().expect("tempdir");

    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/missions")
            .header("authorization", "Bearer test-key-0123456789")
            .json_body(json!({"name": "Find Contractors", "instructions": "get quotes"}));
        then.status(201).json_body(json!({"mission": {"id": "mis_1"}}));
    });
    let run = server.mock(|when, then| {
        when.method(POST)
            .path("/missions/mis_1/runs")
            .json_body(json!({"input": {"original_request": "three quotes please"}}));
        then.status(201).json_body(json!({"data": {"run_id": "run_1"}}));
    });
    let plan = server.mock(|when, then| {
        when.method(POST).path("/missions/mis_1/runs/run_1/plan");
        then.status(201).json_body(json!({"data": {}}));
    });
    let running = server.mock(|when, then| {
        when.method(PATCH)
            .path("/missions/mis_1/runs/run_1")
            .json_body(json!({"status": "running"}));
        then.status(200).json_body(json!({"data": {"status": "running"}}));
    });

    missionsctl_cmd(&server, &dir)
        .args([
            "init",
            "Find Contractors",
            "get quotes",
            "three quotes please",
            r#"[{"step_id": "research", "description": "find names"}]"#,
        ])
        .assert()
        .success()
        .stdout(contains("Created mission: mis_1"))
        .stdout(contains("Created run: run_1"))
        .stdout(contains("Created plan with 1 steps"))
        .stdout(contains("Updated run run_1: running"));

    let state = read_state(&dir);
    assert_eq!(state["find-contractors"]["mission_id"], "mis_1");
    assert_eq!(state["find-contractors"]["run_id"], "run_1");
    assert_eq!(state["find-contractors"]["mission_name"], "Find Contractors");

    missionsctl_cmd(&server, &dir)
        .args(["init", "Find Contractors", "get quotes", "three quotes please"])
        .assert()
        .success()
        .stdout(contains("Resuming existing mission: find-contractors"));

    create.assert_hits(1);
    run.assert_hits(1);
    plan.assert_hits(1);
    running.assert_hits(1);
}

#[test]
fn missing_api_key_fails_before_any_request() {
    let server = MockServer::start();
    let dir = TempDir::new().expect("tempdir");
    let any = server.mock(|when, then| {
        when.method(GET).path("/missions");
        then.status(200).json_body(json!({"missions": []}));
    });

    bare_cmd(&dir)
        .arg("--base-url")
        .arg(server.base_url())
        .arg("list-missions")
        .assert()
        .code(1)
        .stderr(contains("CLAWDTALK_API_KEY environment variable not set"));

    any.assert_hits(0);
}

#[test]
fn http_error_prints_json_details() {
    let server = MockServer::start();
    let dir = TempDir::new().expect("tempdir");
    server.mock(|when, then| {
        when.method(GET).path("/missions/nope");
        then.status(422).json_body(json!({"error": "bad id"}));
    });

    missionsctl_cmd(&server, &dir)
        .args(["get-mission", "nope"])
        .assert()
        .code(1)
        .stderr(contains("HTTP Error 422"))
        .stderr(contains("Details:"))
        .stderr(contains("\"error\": \"bad id\""));
}

#[test]
fn http_error_prints_raw_text_details() {
    let server = MockServer::start();
    let dir = TempDir::new().expect("tempdir");
    server.mock(|when, then| {
        when.method(GET).path("/missions/m1/runs");
        then.status(500).body("upstream exploded");
    });

    missionsctl_cmd(&server, &dir)
        .args(["list-runs", "m1"])
        .assert()
        .code(1)
        .stderr(contains("HTTP Error 500"))
        .stderr(contains("Details: upstream exploded"));
}

#[test]
fn no_available_phone_is_not_a_failure() {
    let server = MockServer::start();
    let dir = TempDir::new().expect("tempdir");
    server.mock(|when, then| {
        when.method(GET).path("/numbers/account-phones/available");
        then.status(200).json_body(json!({}));
    });

    missionsctl_cmd(&server, &dir)
        .arg("get-available-phone")
        .assert()
        .success()
        .stderr(contains("ERROR: No available phone numbers found"));
}

#[test]
fn memory_commands_round_trip_through_state_file() {
    let dir = TempDir::new().expect("tempdir");

    bare_cmd(&dir)
        .args(["save-memory", "find-contractors", "budget", "500"])
        .assert()
        .success()
        .stdout(contains("Saved memory 'budget' for mission 'find-contractors'"));

    bare_cmd(&dir)
        .args(["append-memory", "find-contractors", "budget", r#"{"max": 800}"#])
        .assert()
        .success()
        .stdout(contains("(now 2 items)"));

    bare_cmd(&dir)
        .args(["get-memory", "find-contractors", "budget"])
        .assert()
        .success()
        .stdout(contains("\"500\""))
        .stdout(contains("\"max\": 800"));

    bare_cmd(&dir)
        .args(["get-memory", "find-contractors", "missing"])
        .assert()
        .success()
        .stdout(contains("No memory found"));

    bare_cmd(&dir)
        .args(["get-memory", "other-mission"])
        .assert()
        .success()
        .stdout(predicate::str::diff("{}\n"));

    let state = read_state(&dir);
    assert_eq!(state["find-contractors"]["memory"]["budget"], json!(["500", {"max": 800}]));
    assert!(state["find-contractors"]["last_updated"]
        .as_str()
        .expect("timestamp")
        .ends_with('Z'));
}

#[test]
fn state_listing_and_removal() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(
        dir.path().join(".missions_state.json"),
        serde_json::to_string_pretty(&json!({
            "find-contractors": {"mission_name": "Find Contractors", "mission_id": "m1"},
            "book-dinner": {"mission_name": "Book Dinner", "status": "running"}
        }))
        .expect("json"),
    )
    .expect("write state");

    bare_cmd(&dir)
        .arg("list-state")
        .assert()
        .success()
        .stdout(contains("find-contractors: Find Contractors [unknown]"))
        .stdout(contains("book-dinner: Book Dinner [running]"));

    bare_cmd(&dir)
        .args(["remove-state", "find-contractors"])
        .assert()
        .success()
        .stdout(contains("Removed find-contractors from state"));

    let state = read_state(&dir);
    assert!(state.get("find-contractors").is_none());
    assert_eq!(state["book-dinner"]["status"], "running");
}

#[test]
fn log_event_rejects_json_step_id() {
    let server = MockServer::start();
    let dir = TempDir::new().expect("tempdir");
    let events = server.mock(|when, then| {
        when.method(POST).path("/missions/m1/runs/r1/events");
        then.status(201).json_body(json!({"data": {}}));
    });

    missionsctl_cmd(&server, &dir)
        .args(["log-event", "m1", "r1", "custom", "called acme", r#"{"quote": 1}"#])
        .assert()
        .code(1)
        .stderr(contains("step_id appears to be JSON"));

    events.assert_hits(0);
}

#[test]
fn log_event_dash_means_no_step() {
    let server = MockServer::start();
    let dir = TempDir::new().expect("tempdir");
    let events = server.mock(|when, then| {
        when.method(POST)
            .path("/missions/m1/runs/r1/events")
            .json_body(json!({
                "type": "custom",
                "summary": "called acme",
                "agent_id": "claude-code",
                "payload": {"quote": 120}
            }));
        then.status(201).json_body(json!({"data": {"id": "ev1"}}));
    });

    missionsctl_cmd(&server, &dir)
        .args([
            "log-event",
            "m1",
            "r1",
            "custom",
            "called acme",
            "-",
            r#"{"quote": 120}"#,
        ])
        .assert()
        .success()
        .stdout(contains("Logged event: called acme"));

    events.assert();
}

#[test]
fn check_key_masks_the_key() {
    let server = MockServer::start();
    let dir = TempDir::new().expect("tempdir");

    missionsctl_cmd(&server, &dir)
        .arg("check-key")
        .assert()
        .success()
        .stdout(contains("API key configured: test-key...6789"));
}

#[test]
fn complete_clears_state() {
    let server = MockServer::start();
    let dir = TempDir::new().expect("tempdir");
    fs::write(
        dir.path().join(".missions_state.json"),
        json!({"find-contractors": {"mission_id": "m1", "run_id": "r1"}}).to_string(),
    )
    .expect("write state");
    let done = server.mock(|when, then| {
        when.method(PATCH)
            .path("/missions/m1/runs/r1")
            .json_body(json!({
                "status": "succeeded",
                "result_summary": "hired acme",
                "result_payload": {"winner": "acme"}
            }));
        then.status(200).json_body(json!({"data": {}}));
    });

    missionsctl_cmd(&server, &dir)
        .args([
            "complete",
            "find-contractors",
            "m1",
            "r1",
            "hired acme",
            r#"{"winner": "acme"}"#,
        ])
        .assert()
        .success()
        .stdout(contains("Mission 'find-contractors' completed successfully"));

    done.assert();
    assert_eq!(read_state(&dir), json!({}));
}

#[test]
fn unknown_command_exits_one() {
    let dir = TempDir::new().expect("tempdir");
    bare_cmd(&dir)
        .arg("launch-rockets")
        .assert()
        .code(1)
        .stderr(contains("launch-rockets"));
}

#[test]
fn save_auth_persists_config() {
    let dir = TempDir::new().expect("tempdir");
    bare_cmd(&dir)
        .args([
            "--api-key",
            "saved-key-12345678",
            "--base-url",
            "http://localhost:9/v1",
            "--save-auth",
            "list-state",
        ])
        .assert()
        .success();

    let raw = fs::read_to_string(dir.path().join("config.json")).expect("config");
    let cfg: serde_json::Value = serde_json::from_str(&raw).expect("config json");
    assert_eq!(cfg["api_key"], "saved-key-12345678");
    assert_eq!(cfg["base_url"], "http://localhost:9/v1");

    bare_cmd(&dir)
        .arg("check-key")
        .assert()
        .success()
        .stdout(contains("saved-ke...5678"));
}
