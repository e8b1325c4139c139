//! Hook modules whose top level throws a value of every kind, and a hook
//! that panics mid-invocation.

use hookbridge_core::AppResult;
use hookbridge_core::types::{ResolveArgs, ThrownValue};
use hookbridge_hooks::{ClosureHook, FnFactory, HookError, HookModule, HookResult, Next};
use hookbridge_runtime::Entry;

use super::Fixture;

pub fn error() -> AppResult<Fixture> {
    let id = r#"data:text/javascript,throw new Error("error message")"#;
    throwing(id, ThrownValue::error_at("error message", &format!("{id}:1:7")))
}

pub fn null() -> AppResult<Fixture> {
    throwing("data:text/javascript,throw null", ThrownValue::Null)
}

pub fn undefined() -> AppResult<Fixture> {
    throwing("data:text/javascript,throw undefined", ThrownValue::Undefined)
}

pub fn boolean() -> AppResult<Fixture> {
    throwing("data:text/javascript,throw true", ThrownValue::boolean(true))
}

pub fn empty_object() -> AppResult<Fixture> {
    throwing(
        "data:text/javascript,throw {}",
        ThrownValue::object(Vec::<(String, ThrownValue)>::new()),
    )
}

pub fn object() -> AppResult<Fixture> {
    throwing(
        r#"data:text/javascript,throw { fn() {}, symbol: Symbol("symbol"), u: undefined }"#,
        ThrownValue::object([
            ("fn", ThrownValue::function("fn")),
            ("symbol", ThrownValue::symbol("symbol")),
            ("u", ThrownValue::Undefined),
        ]),
    )
}

pub fn number() -> AppResult<Fixture> {
    throwing("data:text/javascript,throw 1", ThrownValue::number(1.0))
}

pub fn bigint() -> AppResult<Fixture> {
    throwing("data:text/javascript,throw 1n", ThrownValue::bigint(1))
}

pub fn string() -> AppResult<Fixture> {
    throwing(
        r#"data:text/javascript,throw "literal string""#,
        ThrownValue::string("literal string"),
    )
}

pub fn symbol() -> AppResult<Fixture> {
    throwing(
        r#"data:text/javascript,throw Symbol("symbol descriptor")"#,
        ThrownValue::symbol("symbol descriptor"),
    )
}

pub fn function() -> AppResult<Fixture> {
    throwing(
        "data:text/javascript,throw function fnName() {}",
        ThrownValue::function("fnName"),
    )
}

/// A resolve hook that panics while the entry imports through it.
pub fn sync_hook() -> AppResult<Fixture> {
    let hooks = FnFactory::fixed(
        "throw-sync-hook.mjs",
        HookModule::new().with_resolve(ClosureHook::new(
            |_args: ResolveArgs, _next: Next<ResolveArgs>| async move { boom() },
        )),
    );
    let entry = Entry::module("main.mjs", |scope| async move {
        scope.import("./dep.mjs").await?;
        scope.print("unreachable");
        Ok(())
    });
    Ok(Fixture::new(entry).hook(hooks))
}

fn boom() -> HookResult {
    panic!("boom")
}

/// A hook module `id` whose top level throws `value`, and an empty script.
fn throwing(id: &str, value: ThrownValue) -> AppResult<Fixture> {
    let hooks = FnFactory::new(id, move |_scope| {
        let value = value.clone();
        async move { Err(HookError::thrown(value)) }
    });
    let entry = Entry::script("empty.js", |_scope| async { Ok(()) });
    Ok(Fixture::new(entry).hook(hooks))
}
