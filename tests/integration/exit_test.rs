//! Integration tests for exits requested from the hook context.

use crate::helpers::run_scenario;

#[test]
fn test_exit_from_async_hook() {
    let out = run_scenario("exit-async-hook");
    assert_eq!(out.code, 42);
    assert_eq!(out.stdout, "");
    assert_eq!(out.stderr, "");
}

#[test]
fn test_exit_from_hook_during_synchronous_resolve() {
    let out = run_scenario("exit-sync-hook");
    assert_eq!(out.code, 42);
    assert_eq!(out.stdout, "");
    assert_eq!(out.stderr, "");
}

#[test]
fn test_exit_from_hook_module_top_level() {
    let out = run_scenario("exit-hook-top-level");
    assert_eq!(out.code, 42);
    assert_eq!(out.stdout, "");
    assert_eq!(out.stderr, "");
}
