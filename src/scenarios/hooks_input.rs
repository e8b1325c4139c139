//! Hooks rewriting what they receive from the rest of the chain.
//!
//! The resolve hook tags every URL with format `test`; the load hook drops
//! that hint before delegating so the default loader infers the real
//! format. With tracing on, the four completed invocations show exactly
//! what each hook returned.

use std::fs;

use url::Url;

use hookbridge_core::AppResult;
use hookbridge_core::error::AppError;
use hookbridge_core::types::{LoadArgs, ResolveArgs};
use hookbridge_hooks::{ClosureHook, FnFactory, HookModule, Next};
use hookbridge_runtime::Entry;

use super::Fixture;

const MAIN_SOURCE: &str = "import secret from './experimental.json' with { type: 'json' };\n";
const JSON_SOURCE: &str = "{ \"ofLife\": 42 }\n";

pub fn fixture() -> AppResult<Fixture> {
    let dir = tempfile::tempdir()?;
    let main = dir.path().join("json-modules.mjs");
    fs::write(&main, MAIN_SOURCE)?;
    fs::write(dir.path().join("experimental.json"), JSON_SOURCE)?;

    let main_url = Url::from_file_path(&main)
        .map_err(|()| AppError::internal(format!("Not an absolute path: {}", main.display())))?
        .to_string();

    let hooks = HookModule::new()
        .with_resolve(ClosureHook::new(
            |args: ResolveArgs, next: Next<ResolveArgs>| async move {
                let resolved = next.call(args).await?;
                Ok(resolved.with_format("test").short_circuited())
            },
        ))
        .with_load(ClosureHook::new(
            |mut args: LoadArgs, next: Next<LoadArgs>| async move {
                args.context.format = None;
                let loaded = next.call(args).await?;
                Ok(loaded.short_circuited())
            },
        ));

    let entry = Entry::module("hooks-input.mjs", move |scope| async move {
        let main = scope.import(&main_url).await?;
        // Evaluating the main module imports its JSON dependency.
        scope.for_module(&main).import("./experimental.json").await?;
        Ok(())
    });

    Ok(Fixture::new(entry)
        .hook(FnFactory::fixed("hooks-input.mjs", hooks))
        .in_workspace(dir))
}
