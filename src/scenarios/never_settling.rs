//! Entries waiting on hooks that never answer.
//!
//! Awaiting such a hook from a module's top level deadlocks the main
//! context and must end with code 13. Work a script merely starts, or a
//! race one branch of which settles, must not.

use hookbridge_core::AppResult;
use hookbridge_runtime::{Entry, MainScope};

use super::Fixture;
use super::loaders::{self, NEVER_LOAD, NEVER_RESOLVE};

pub fn never_resolve() -> AppResult<Fixture> {
    Ok(with_hooks(Entry::module("never-resolve.mjs", |scope| async move {
        scope.print("should be output");
        scope.import(NEVER_RESOLVE).await?;
        scope.print("should not be output");
        Ok(())
    })))
}

pub fn never_load() -> AppResult<Fixture> {
    Ok(with_hooks(Entry::module("never-load.mjs", |scope| async move {
        scope.print("should be output");
        scope.import(NEVER_LOAD).await?;
        scope.print("should not be output");
        Ok(())
    })))
}

pub fn race() -> AppResult<Fixture> {
    Ok(with_hooks(Entry::module("race.mjs", |scope| async move {
        let settled = race_imports(&scope).await;
        scope.print(&settled.to_string());
        Ok(())
    })))
}

pub fn import_meta_never_resolve() -> AppResult<Fixture> {
    Ok(with_hooks(Entry::module(
        "import.meta.never-resolve.mjs",
        |scope| async move {
            scope.print("should be output");
            scope.resolve_sync(NEVER_RESOLVE)?;
            scope.print("should not be output");
            Ok(())
        },
    )))
}

pub fn never_resolve_script() -> AppResult<Fixture> {
    Ok(with_hooks(Entry::script("never-resolve.cjs", |scope| async move {
        let detached = scope.clone();
        let _pending = scope.spawn(async move { detached.import(NEVER_RESOLVE).await });
        scope.print("should be output");
        Ok(())
    })))
}

pub fn never_load_script() -> AppResult<Fixture> {
    Ok(with_hooks(Entry::script("never-load.cjs", |scope| async move {
        let detached = scope.clone();
        let _pending = scope.spawn(async move { detached.import(NEVER_LOAD).await });
        scope.print("should be output");
        Ok(())
    })))
}

pub fn race_script() -> AppResult<Fixture> {
    Ok(with_hooks(Entry::script("race.cjs", |scope| async move {
        let detached = scope.clone();
        let _race = scope.spawn(async move {
            let settled = race_imports(&detached).await;
            detached.print(&settled.to_string());
        });
        Ok(())
    })))
}

/// Races both never-settling imports against a builtin. `true` when the
/// builtin won.
async fn race_imports(scope: &MainScope) -> bool {
    tokio::select! {
        _ = scope.import(NEVER_RESOLVE) => false,
        _ = scope.import(NEVER_LOAD) => false,
        builtin = scope.import("node:process") => builtin.is_ok_and(|record| record.format == "builtin"),
    }
}

fn with_hooks(entry: Entry) -> Fixture {
    Fixture::new(entry).hook(loaders::never_settling())
}
