//! Natural-exit behavior with no pending hook work left blocked.

use std::time::Duration;

use hookbridge_core::AppResult;
use hookbridge_core::types::LoadArgs;
use hookbridge_hooks::{ClosureHook, FnFactory, HookModule, HookScope, Next};
use hookbridge_runtime::Entry;

use super::Fixture;
use super::loaders;

pub fn empty() -> AppResult<Fixture> {
    let entry = Entry::script("empty.js", |_scope| async { Ok(()) });
    Ok(Fixture::new(entry).hook(loaders::passthrough()))
}

/// A slow load hook while an unref'd interval keeps removing every
/// before-exit observer. The import still completes and the process
/// exits normally.
pub fn remove_before_exit() -> AppResult<Fixture> {
    let hooks = FnFactory::new("slow-loader.mjs", |scope: HookScope| async move {
        Ok(HookModule::new().with_load(ClosureHook::new(
            move |args: LoadArgs, next: Next<LoadArgs>| {
                let scope = scope.clone();
                async move {
                    scope.sleep(Duration::from_millis(99)).await;
                    next.call(args).await
                }
            },
        )))
    });
    let entry = Entry::module("[eval1]", |scope| async move {
        scope.on_before_exit(|| {});
        let observers = scope.clone();
        scope
            .set_interval(Duration::from_millis(1), move || {
                observers.remove_all_before_exit();
            })
            .unref();
        scope.import("data:text/javascript,").await?;
        Ok(())
    });
    Ok(Fixture::new(entry).hook(hooks))
}
