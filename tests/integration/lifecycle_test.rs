//! Integration tests for natural exit.

use crate::helpers::run_scenario;

#[test]
fn test_empty_script_exits_cleanly() {
    let out = run_scenario("empty");
    assert_eq!(out.code, 0);
    assert_eq!(out.stdout, "");
    assert_eq!(out.stderr, "");
}

#[test]
fn test_removing_before_exit_observers_does_not_hang() {
    let out = run_scenario("remove-before-exit");
    assert_eq!(out.code, 0);
    assert_eq!(out.stdout, "");
    assert_eq!(out.stderr, "");
}
