//! Integration tests for the never-settling monitor.

use crate::helpers::run_scenario;

#[test]
fn test_awaited_resolve_that_never_settles_exits_13() {
    let out = run_scenario("never-resolve");
    assert_eq!(out.code, 13);
    assert_eq!(out.stdout, "should be output\n");
    assert_eq!(out.stderr, "");
}

#[test]
fn test_awaited_load_that_never_settles_exits_13() {
    let out = run_scenario("never-load");
    assert_eq!(out.code, 13);
    assert_eq!(out.stdout, "should be output\n");
    assert_eq!(out.stderr, "");
}

#[test]
fn test_race_with_one_settling_branch_exits_0() {
    let out = run_scenario("race");
    assert_eq!(out.code, 0);
    assert_eq!(out.stdout, "true\n");
    assert_eq!(out.stderr, "");
}

#[test]
fn test_synchronous_resolve_that_never_settles_exits_13() {
    let out = run_scenario("import-meta-never-resolve");
    assert_eq!(out.code, 13);
    assert_eq!(out.stdout, "should be output\n");
    assert_eq!(out.stderr, "");
}

#[test]
fn test_script_not_awaiting_resolve_exits_0() {
    let out = run_scenario("never-resolve-cjs");
    assert_eq!(out.code, 0);
    assert_eq!(out.stdout, "should be output\n");
}

#[test]
fn test_script_not_awaiting_load_exits_0() {
    let out = run_scenario("never-load-cjs");
    assert_eq!(out.code, 0);
    assert_eq!(out.stdout, "should be output\n");
}

#[test]
fn test_script_race_exits_0() {
    let out = run_scenario("race-cjs");
    assert_eq!(out.code, 0);
    assert_eq!(out.stdout, "true\n");
    assert_eq!(out.stderr, "");
}
