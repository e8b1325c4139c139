//! Hooks that end the process.

use hookbridge_core::AppResult;
use hookbridge_core::types::{LoadArgs, ResolveArgs};
use hookbridge_hooks::{ClosureHook, FnFactory, HookModule, HookScope, Next};
use hookbridge_runtime::Entry;

use super::Fixture;

const EXIT_CODE: i32 = 42;

pub fn from_async_hook() -> AppResult<Fixture> {
    let hooks = FnFactory::new("exit-on-load.mjs", |scope: HookScope| async move {
        Ok(HookModule::new().with_load(ClosureHook::new(
            move |args: LoadArgs, next: Next<LoadArgs>| {
                let scope = scope.clone();
                async move {
                    if args.url == "data:exit" {
                        return Err(scope.exit(EXIT_CODE));
                    }
                    next.call(args).await
                }
            },
        )))
    });
    let entry = Entry::module("exit-async.mjs", |scope| async move {
        scope.import("data:exit").await?;
        scope.print("should not be output");
        Ok(())
    });
    Ok(Fixture::new(entry).hook(hooks))
}

pub fn from_sync_hook() -> AppResult<Fixture> {
    let hooks = FnFactory::new("exit-on-resolve.mjs", |scope: HookScope| async move {
        Ok(HookModule::new().with_resolve(ClosureHook::new(
            move |args: ResolveArgs, next: Next<ResolveArgs>| {
                let scope = scope.clone();
                async move {
                    if args.specifier == "exit:" {
                        return Err(scope.exit(EXIT_CODE));
                    }
                    next.call(args).await
                }
            },
        )))
    });
    let entry = Entry::module("exit-sync.mjs", |scope| async move {
        // The imported module resolves `exit:` synchronously at its top level.
        let module = scope
            .import("data:text/javascript,import.meta.resolve(%22exit:%22)")
            .await?;
        scope.for_module(&module).resolve_sync("exit:")?;
        scope.print("should not be output");
        Ok(())
    });
    Ok(Fixture::new(entry).hook(hooks))
}

pub fn from_hook_top_level() -> AppResult<Fixture> {
    let hooks = FnFactory::new("exit-top-level.mjs", |scope: HookScope| async move {
        Err(scope.exit(EXIT_CODE))
    });
    let entry = Entry::script("empty.js", |scope| async move {
        scope.print("should not be output");
        Ok(())
    });
    Ok(Fixture::new(entry).hook(hooks))
}
