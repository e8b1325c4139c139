//! Hook modules shared by several scenarios.

use hookbridge_core::types::{InvocationResult, LoadArgs, ResolveArgs};
use hookbridge_hooks::{ClosureHook, FnFactory, HookModule, HookResult, Next};

/// Specifier whose resolve never settles.
pub const NEVER_RESOLVE: &str = "never-settle-resolve";
/// Specifier that resolves but whose load never settles.
pub const NEVER_LOAD: &str = "never-settle-load";

const NEVER_URL: &str = "never:never";

/// Hooks that leave two specifiers pending forever and delegate the rest.
pub fn never_settling() -> FnFactory {
    let module = HookModule::new()
        .with_resolve(ClosureHook::new(
            |args: ResolveArgs, next: Next<ResolveArgs>| async move {
                match args.specifier.as_str() {
                    NEVER_RESOLVE => futures::future::pending::<HookResult>().await,
                    NEVER_LOAD => Ok(InvocationResult::resolved(NEVER_URL).short_circuited()),
                    _ => next.call(args).await,
                }
            },
        ))
        .with_load(ClosureHook::new(
            |args: LoadArgs, next: Next<LoadArgs>| async move {
                if args.url == NEVER_URL {
                    return futures::future::pending::<HookResult>().await;
                }
                next.call(args).await
            },
        ));
    FnFactory::fixed("never-settling.mjs", module)
}

/// Hooks that only delegate.
pub fn passthrough() -> FnFactory {
    let module = HookModule::new()
        .with_resolve(ClosureHook::new(
            |args: ResolveArgs, next: Next<ResolveArgs>| next.call(args),
        ))
        .with_load(ClosureHook::new(
            |args: LoadArgs, next: Next<LoadArgs>| next.call(args),
        ));
    FnFactory::fixed("loader-edge-cases.mjs", module)
}
