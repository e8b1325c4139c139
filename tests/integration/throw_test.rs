//! Integration tests for uncaught values thrown by hook modules.

use crate::helpers::run_scenario;

fn assert_reported(scenario: &str, module: &str, rendered: &str) {
    let out = run_scenario(scenario);
    assert_eq!(out.code, 1, "{scenario}");
    assert_eq!(out.stdout, "", "{scenario}");
    assert_eq!(out.stderr, format!("{module}\n\n{rendered}\n"), "{scenario}");
}

#[test]
fn test_throw_error_prints_stack() {
    let module = r#"data:text/javascript,throw new Error("error message")"#;
    assert_reported(
        "throw-error",
        module,
        &format!("Error: error message\n    at {module}:1:7"),
    );
}

#[test]
fn test_throw_null() {
    assert_reported("throw-null", "data:text/javascript,throw null", "null");
}

#[test]
fn test_throw_undefined() {
    assert_reported(
        "throw-undefined",
        "data:text/javascript,throw undefined",
        "undefined",
    );
}

#[test]
fn test_throw_boolean() {
    assert_reported("throw-boolean", "data:text/javascript,throw true", "true");
}

#[test]
fn test_throw_empty_object() {
    assert_reported("throw-empty-object", "data:text/javascript,throw {}", "{}");
}

#[test]
fn test_throw_object() {
    assert_reported(
        "throw-object",
        r#"data:text/javascript,throw { fn() {}, symbol: Symbol("symbol"), u: undefined }"#,
        "{ fn: [Function: fn], symbol: Symbol(symbol), u: undefined }",
    );
}

#[test]
fn test_throw_number() {
    assert_reported("throw-number", "data:text/javascript,throw 1", "1");
}

#[test]
fn test_throw_bigint() {
    assert_reported("throw-bigint", "data:text/javascript,throw 1n", "1");
}

#[test]
fn test_throw_string_is_unquoted() {
    assert_reported(
        "throw-string",
        r#"data:text/javascript,throw "literal string""#,
        "literal string",
    );
}

#[test]
fn test_throw_function() {
    assert_reported(
        "throw-function",
        "data:text/javascript,throw function fnName() {}",
        "[Function: fnName]",
    );
}

#[test]
fn test_throw_symbol_prints_nothing() {
    let out = run_scenario("throw-symbol");
    assert_eq!(out.code, 1);
    assert_eq!(out.stdout, "");
    assert_eq!(out.stderr, "");
}

#[test]
fn test_panicking_hook_prints_only_the_error() {
    let out = run_scenario("throw-sync-hook");
    assert_eq!(out.code, 1);
    assert_eq!(out.stdout, "");
    assert_eq!(out.stderr, "Error: boom\n");
}
