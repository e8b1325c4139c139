//! Integration tests for the non-run commands.

use serde_json::Value;

use crate::helpers::hookbridge;

#[test]
fn test_unknown_scenario_fails() {
    let out = hookbridge(&["run", "no-such-scenario"]).unwrap();
    assert_eq!(out.code, 1);
    assert!(out.stderr.contains("Unknown scenario 'no-such-scenario'"));
}

#[test]
fn test_list_as_json() {
    let out = hookbridge(&["list", "--json"]).unwrap();
    assert_eq!(out.code, 0);

    let rows: Vec<Value> = serde_json::from_str(&out.stdout).unwrap();
    let never = rows
        .iter()
        .find(|row| row["name"] == "never-resolve")
        .expect("never-resolve is listed");
    assert_eq!(never["expected_exit"], 13);
    assert!(rows.iter().any(|row| row["name"] == "throw-symbol"));
}

#[test]
fn test_listed_exit_codes_match_runs() {
    let out = hookbridge(&["list", "--json"]).unwrap();
    let rows: Vec<Value> = serde_json::from_str(&out.stdout).unwrap();
    for row in rows {
        let name = row["name"].as_str().unwrap();
        let run = hookbridge(&["run", name]).unwrap();
        assert_eq!(i64::from(run.code), row["expected_exit"].as_i64().unwrap(), "{name}");
    }
}

#[test]
fn test_config_show_reflects_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hookbridge.toml");
    std::fs::write(&path, "[output]\nbuffer_capacity = 64\n").unwrap();

    let out = hookbridge(&["--config", path.to_str().unwrap(), "config", "show"]).unwrap();
    assert_eq!(out.code, 0, "stderr: {}", out.stderr);
    let config: Value = serde_json::from_str(&out.stdout).unwrap();
    assert_eq!(config["output"]["buffer_capacity"], 64);
    assert_eq!(config["monitor"]["log_pending_on_exit"], true);
}

#[test]
fn test_config_generate_writes_loadable_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("generated.toml");
    let path = path.to_str().unwrap();

    let out = hookbridge(&["config", "generate", "--output", path]).unwrap();
    assert_eq!(out.code, 0);

    let out = hookbridge(&["--config", path, "config", "validate"]).unwrap();
    assert_eq!(out.code, 0, "stderr: {}", out.stderr);
    assert!(out.stdout.contains("is valid"));
}
