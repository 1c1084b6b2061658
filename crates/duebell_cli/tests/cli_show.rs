use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(file_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("duebell-{nanos}-{file_name}"))
}

fn write_store(path: &Path, tasks: serde_json::Value) {
    let content = serde_json::json!({ "tasks": tasks });
    std::fs::write(path, serde_json::to_string_pretty(&content).unwrap()).unwrap();
}

fn duebell(store_path: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_duebell"))
        .args(args)
        .env("DUEBELL_STORE_PATH", store_path)
        .env("DUEBELL_CONFIG_PATH", store_path.with_extension("config.json"))
        .env("DUEBELL_DISABLE_NOTIFICATIONS", "1")
        .output()
        .expect("failed to run duebell")
}

fn task(id: &str, datetime: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id, "task": format!("task {id}"), "category": "Study", "priority": "Low",
        "datetime": datetime, "status": status, "last_reminded": null
    })
}

#[test]
fn show_prints_details_and_countdown() {
    let store_path = temp_path("cli-show.json");
    write_store(
        &store_path,
        serde_json::json!([
            task("late", "2024-01-01 09:00:00", "Pending"),
            task("future", "2999-01-01 09:00:00", "Pending"),
            task("done", "2024-01-01 09:00:00", "Completed"),
            task("garbled", "next week", "Pending"),
        ]),
    );

    let late = duebell(&store_path, &["show", "late"]);
    let future = duebell(&store_path, &["show", "future"]);
    let done = duebell(&store_path, &["show", "done"]);
    let garbled = duebell(&store_path, &["show", "garbled"]);
    std::fs::remove_file(&store_path).ok();

    assert!(late.status.success());
    let late = String::from_utf8_lossy(&late.stdout);
    assert!(late.contains("task late (late)"));
    assert!(late.contains("Low Priority | Study | Pending"));
    assert!(late.contains("Due: 2024-01-01 09:00:00"));
    assert!(late.contains("Overdue by: "));
    assert!(String::from_utf8_lossy(&future.stdout).contains("Due in: "));
    assert!(String::from_utf8_lossy(&done.stdout).contains("Task Completed"));
    assert!(String::from_utf8_lossy(&garbled.stdout).contains("Invalid Time Data"));
}

#[test]
fn show_json_carries_countdown() {
    let store_path = temp_path("cli-show-json.json");
    write_store(
        &store_path,
        serde_json::json!([task("done", "2024-01-01 09:00:00", "Completed")]),
    );

    let output = duebell(&store_path, &["show", "done", "--json"]);
    std::fs::remove_file(&store_path).ok();

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["id"], "done");
    assert_eq!(json["status"], "Completed");
    assert_eq!(json["countdown"], "Task Completed");
}

#[test]
fn show_unknown_task_fails() {
    let store_path = temp_path("cli-show-missing.json");

    let output = duebell(&store_path, &["show", "task-404"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("task not found"));
}
