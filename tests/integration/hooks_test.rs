//! Integration tests for what hooks receive and return.

use serde_json::Value;

use crate::helpers::run_scenario;

fn bytes_of(value: &Value) -> Vec<u8> {
    assert_eq!(value["type"], "Buffer");
    value["data"]
        .as_array()
        .expect("Buffer data is an array")
        .iter()
        .map(|byte| byte.as_u64().expect("byte") as u8)
        .collect()
}

#[test]
fn test_hook_results_are_traced_in_order() {
    let out = run_scenario("hooks-input");
    assert_eq!(out.code, 0, "stderr: {}", out.stderr);
    assert_eq!(out.stderr, "");

    let lines: Vec<Value> = out
        .stdout_lines()
        .into_iter()
        .map(|line| serde_json::from_str(line).expect("trace line is JSON"))
        .collect();
    assert_eq!(lines.len(), 4);

    let main_url = lines[0]["url"].as_str().unwrap();
    assert!(main_url.starts_with("file://"));
    assert!(main_url.ends_with("/json-modules.mjs"));
    assert_eq!(lines[0]["format"], "test");
    assert_eq!(lines[0]["shortCircuit"], true);

    assert_eq!(lines[1]["format"], "module");
    assert_eq!(lines[1]["shortCircuit"], true);
    assert!(lines[1].get("url").is_none());
    let source = String::from_utf8(bytes_of(&lines[1]["source"])).unwrap();
    assert!(source.contains("./experimental.json"));

    let json_url = lines[2]["url"].as_str().unwrap();
    assert_eq!(
        json_url,
        main_url.replace("json-modules.mjs", "experimental.json")
    );
    assert_eq!(lines[2]["format"], "test");
    assert_eq!(lines[2]["shortCircuit"], true);

    assert_eq!(lines[3]["format"], "json");
    assert_eq!(lines[3]["shortCircuit"], true);
    let json: Value = serde_json::from_slice(&bytes_of(&lines[3]["source"])).unwrap();
    assert_eq!(json["ofLife"], 42);
}
