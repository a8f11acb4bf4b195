//! CLI integration tests.
//!
//! These tests exercise the CLI commands end-to-end.

use std::path::Path;
use std::process::{Command, Output};

fn keyloom(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_keyloom"))
        .args(args)
        .current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env_remove("KEYLOOM_CONFIG_CONTENT")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_help_command() {
    let dir = tempfile::tempdir().unwrap();
    let output = keyloom(dir.path(), &["--help"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("--root"));
    assert!(text.contains("history"));
}

#[test]
fn test_set_then_get() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("en.json"), "{\n  \"menu\": {\"open\": \"Open\"}\n}\n").unwrap();

    let output = keyloom(dir.path(), &["set", "en.json", "menu.open=Open file", "menu.count=3"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("Backup: "));

    let output = keyloom(dir.path(), &["get", "en.json", "menu.open"]);
    assert_eq!(stdout(&output), "Open file\n");

    let output = keyloom(dir.path(), &["get", "en.json", "/menu/count"]);
    assert_eq!(stdout(&output), "3\n");

    let text = std::fs::read_to_string(dir.path().join("en.json")).unwrap();
    assert_eq!(
        text,
        "{\n  \"menu\": {\"open\": \"Open file\",\n    \"count\": 3}\n}\n"
    );
}

#[test]
fn test_get_missing_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("en.json"), "{}").unwrap();

    let output = keyloom(dir.path(), &["get", "en.json", "nope"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Key not found"));
}

#[test]
fn test_locate_json_output() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("en.json"), "{\"a\": {\"b\": 1}}").unwrap();

    let output = keyloom(dir.path(), &["locate", "en.json", "a.b", "--json"]);
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["start"], 12);
    assert_eq!(value["end"], 13);
    assert_eq!(value["quoted"], false);
}

#[test]
fn test_history_list_and_restore() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("en.json");
    std::fs::write(&file, "{\"title\": \"first\"}").unwrap();

    let output = keyloom(dir.path(), &["set", "en.json", "title=second", "--json"]);
    assert!(output.status.success());
    let outcome: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let id = outcome["backup"]["id"].as_str().unwrap().to_string();

    let output = keyloom(dir.path(), &["history", "list", "en.json", "--json"]);
    let entries: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(entries[0]["id"], id.as_str());

    let output = keyloom(dir.path(), &["history", "restore", "en.json", &id]);
    assert!(output.status.success());
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "{\"title\": \"first\"}");
}

#[test]
fn test_settings_reports_history_dir() {
    let dir = tempfile::tempdir().unwrap();
    let output = keyloom(dir.path(), &["settings", "locales/en.json"]);
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["settings"]["enabled"], true);
    assert!(report["historyDir"]
        .as_str()
        .unwrap()
        .ends_with("locales%2Fen.json"));
}
