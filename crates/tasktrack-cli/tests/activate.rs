use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

fn bin(home: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tasktrack"));
    cmd.env("TASKTRACK_HOME", home.path());
    cmd.env_remove("TASKTRACK_LOG");
    cmd
}

fn run_json(cmd: &mut Command) -> Value {
    let output = cmd.arg("--json").output().expect("run tasktrack");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json")
}

#[test]
fn activate_assigns_id_then_status_lists_nothing() {
    let repo = TempDir::new().expect("repo");
    let home = TempDir::new().expect("home");
    let note = repo.path().join("today.md");
    std::fs::write(&note, "# Today\n- [ ] Draft the release notes\n").expect("note");

    let activated = run_json(
        bin(&home)
            .arg("--root")
            .arg(repo.path())
            .arg("activate")
            .arg("--file")
            .arg(&note)
            .arg("--line")
            .arg("2"),
    );
    let task_id = activated
        .get("task_id")
        .and_then(|v| v.as_u64())
        .expect("task id");
    assert_eq!(
        std::fs::read_to_string(&note).expect("read"),
        format!("# Today\n- [ ] {task_id} Draft the release notes\n")
    );
    assert!(!repo.path().join("data.json").exists());

    // Second activation starts the first session.
    run_json(
        bin(&home)
            .arg("--root")
            .arg(repo.path())
            .arg("activate")
            .arg("--file")
            .arg(&note)
            .arg("--line")
            .arg("2"),
    );
    let status = run_json(bin(&home).arg("--root").arg(repo.path()).arg("status"));
    let tasks = status.get("tasks").and_then(|v| v.as_array()).expect("tasks");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["task_id"].as_u64(), Some(task_id));
    assert_eq!(tasks[0]["status"].as_str(), Some("active"));
    assert_eq!(tasks[0]["sessions"].as_u64(), Some(1));
}

#[test]
fn activate_on_plain_line_returns_null() {
    let repo = TempDir::new().expect("repo");
    let home = TempDir::new().expect("home");
    let note = repo.path().join("today.md");
    std::fs::write(&note, "just a line").expect("note");

    let out = run_json(
        bin(&home)
            .arg("--root")
            .arg(repo.path())
            .arg("activate")
            .arg("--file")
            .arg(&note)
            .arg("--line")
            .arg("1"),
    );
    assert!(out.get("task_id").map(|v| v.is_null()).unwrap_or(false));
    assert_eq!(std::fs::read_to_string(&note).expect("read"), "just a line");
    assert!(!repo.path().join("data.json").exists());
}

#[test]
fn only_one_active_flag_and_config_control_deactivation() {
    let repo = TempDir::new().expect("repo");
    let home = TempDir::new().expect("home");
    let note = repo.path().join("today.md");
    let data = repo.path().join("data.json");
    std::fs::write(&note, "- [ ] 1 write\n- [ ] 2 review\n").expect("note");
    std::fs::write(
        &data,
        r#"{"1":[{"time":"2024-01-01T10:00:00Z","status":"active"}]}"#,
    )
    .expect("data");
    std::fs::write(repo.path().join(".tasktrack.toml"), "only_one_active = false\n")
        .expect("config");

    run_json(
        bin(&home)
            .arg("--root")
            .arg(repo.path())
            .arg("activate")
            .arg("--file")
            .arg(&note)
            .arg("--line")
            .arg("2"),
    );
    let raw: Value =
        serde_json::from_str(&std::fs::read_to_string(&data).expect("read")).expect("json");
    assert_eq!(raw["1"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(raw["2"][0]["status"].as_str(), Some("active"));

    // Flag overrides config: activating 1 again stops 2.
    run_json(
        bin(&home)
            .arg("--root")
            .arg(repo.path())
            .arg("activate")
            .arg("--file")
            .arg(&note)
            .arg("--line")
            .arg("1")
            .arg("--only-one-active")
            .arg("true"),
    );
    let raw: Value =
        serde_json::from_str(&std::fs::read_to_string(&data).expect("read")).expect("json");
    assert_eq!(raw["1"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(raw["2"].as_array().map(|a| a.len()), Some(2));
    assert_eq!(raw["2"][1]["status"].as_str(), Some("inactive"));
}

#[test]
fn complete_stop_all_and_show() {
    let repo = TempDir::new().expect("repo");
    let home = TempDir::new().expect("home");
    let note = repo.path().join("today.md");
    let data = repo.path().join("custom.json");
    std::fs::write(&note, "- [ ] 5 ship\n- [ ] 6 test\n").expect("note");
    std::fs::write(
        &data,
        r#"{"5":[{"time":"2024-01-01T10:00:00Z","status":"active"}],"6":[{"time":"2024-01-01T10:00:00Z","status":"active"}]}"#,
    )
    .expect("data");

    let done = run_json(
        bin(&home)
            .arg("complete")
            .arg("--file")
            .arg(&note)
            .arg("--line")
            .arg("1")
            .arg("--data")
            .arg(&data),
    );
    assert_eq!(done["task_id"].as_u64(), Some(5));

    let stopped = run_json(bin(&home).arg("stop-all").arg("--data").arg(&data));
    assert_eq!(stopped["deactivated"], serde_json::json!([6]));

    let shown = run_json(
        bin(&home)
            .arg("show")
            .arg("--file")
            .arg(&note)
            .arg("--line")
            .arg("2")
            .arg("--data")
            .arg(&data),
    );
    assert_eq!(shown["task"]["task_id"].as_u64(), Some(6));
    assert_eq!(shown["task"]["status"].as_str(), Some("inactive"));
    assert_eq!(shown["task"]["sessions"].as_u64(), Some(2));
    assert_eq!(shown["task"]["description"].as_str(), Some("test"));
}

#[test]
fn corrupt_data_file_fails_loudly() {
    let repo = TempDir::new().expect("repo");
    let home = TempDir::new().expect("home");
    let note = repo.path().join("today.md");
    std::fs::write(&note, "- [ ] 5 ship\n").expect("note");
    std::fs::write(repo.path().join("data.json"), "[not an object").expect("data");

    let output = bin(&home)
        .arg("--root")
        .arg(repo.path())
        .arg("activate")
        .arg("--file")
        .arg(&note)
        .arg("--line")
        .arg("1")
        .output()
        .expect("run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("corrupt"), "stderr: {stderr}");
}

#[test]
fn line_zero_is_rejected() {
    let home = TempDir::new().expect("home");
    let output = bin(&home)
        .arg("activate")
        .arg("--file")
        .arg("x.md")
        .arg("--line")
        .arg("0")
        .output()
        .expect("run");
    assert!(!output.status.success());
}

#[test]
fn mistyped_config_value_stops_activation() {
    let repo = TempDir::new().expect("repo");
    let home = TempDir::new().expect("home");
    let note = repo.path().join("today.md");
    std::fs::write(&note, "- [ ] 5 ship\n").expect("note");
    std::fs::write(
        repo.path().join(".tasktrack.toml"),
        "only_one_active = \"false\"\n",
    )
    .expect("config");

    let output = bin(&home)
        .arg("--root")
        .arg(repo.path())
        .arg("activate")
        .arg("--file")
        .arg(&note)
        .arg("--line")
        .arg("1")
        .output()
        .expect("run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid config"), "stderr: {stderr}");
    assert_eq!(
        std::fs::read_to_string(&note).expect("read"),
        "- [ ] 5 ship\n"
    );
    assert!(!repo.path().join("data.json").exists());
}

#[test]
fn config_set_then_show_reports_sources() {
    let repo = TempDir::new().expect("repo");
    let home = TempDir::new().expect("home");

    let shown = run_json(
        bin(&home)
            .arg("--root")
            .arg(repo.path())
            .arg("config")
            .arg("show"),
    );
    assert_eq!(shown["config"]["only_one_active"]["value"], Value::Bool(true));
    assert_eq!(
        shown["config"]["only_one_active"]["source"].as_str(),
        Some("default")
    );

    let output = bin(&home)
        .arg("--root")
        .arg(repo.path())
        .arg("config")
        .arg("set")
        .arg("--only-one-active")
        .arg("false")
        .arg("--data-file")
        .arg("time.json")
        .output()
        .expect("run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(repo.path().join(".tasktrack.toml").is_file());

    let shown = run_json(
        bin(&home)
            .arg("--root")
            .arg(repo.path())
            .arg("config")
            .arg("show"),
    );
    assert_eq!(shown["config"]["only_one_active"]["value"], Value::Bool(false));
    assert_eq!(
        shown["config"]["only_one_active"]["source"].as_str(),
        Some("project")
    );
    assert_eq!(shown["config"]["data_file"]["source"].as_str(), Some("project"));
    assert!(shown["config"]["data_file"]["value"]
        .as_str()
        .map(|p| p.ends_with("time.json"))
        .unwrap_or(false));
}

#[test]
fn config_set_without_values_fails() {
    let repo = TempDir::new().expect("repo");
    let home = TempDir::new().expect("home");
    let output = bin(&home)
        .arg("--root")
        .arg(repo.path())
        .arg("config")
        .arg("set")
        .output()
        .expect("run");
    assert!(!output.status.success());
    assert!(!repo.path().join(".tasktrack.toml").exists());
}

#[test]
fn status_filters_by_current_status() {
    let repo = TempDir::new().expect("repo");
    let home = TempDir::new().expect("home");
    let data = repo.path().join("data.json");
    std::fs::write(
        &data,
        r#"{"5":[{"time":"2024-01-01T10:00:00Z","status":"active"}],"6":[{"time":"2024-01-01T10:00:00Z","status":"complete"}]}"#,
    )
    .expect("data");

    let status = run_json(
        bin(&home)
            .arg("status")
            .arg("--data")
            .arg(&data)
            .arg("--only")
            .arg("Complete"),
    );
    let tasks = status["tasks"].as_array().expect("tasks");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["task_id"].as_u64(), Some(6));

    let output = bin(&home)
        .arg("status")
        .arg("--data")
        .arg(&data)
        .arg("--only")
        .arg("paused")
        .output()
        .expect("run");
    assert!(!output.status.success());
}
