//! Runtime assembly: wires the bridge, the hook context, the monitor and
//! the exit path together and drives the main context to its exit.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info};

use hookbridge_bridge::channel::channel;
use hookbridge_bridge::{HookHost, HostOptions, InvocationBridge};
use hookbridge_core::config::EngineConfig;
use hookbridge_core::{Activity, AppError, AppResult, Watchlist, parked};
use hookbridge_hooks::HookModuleFactory;

use crate::entry::{Entry, EntryKind};
use crate::exit::{ExitCoordinator, ExitRequest, ProcessTerminator, Terminator};
use crate::formatter::Formatter;
use crate::lifecycle::{self, Lifecycle};
use crate::monitor::Monitor;
use crate::output::OutputSink;
use crate::scope::MainScope;
use crate::shared::{self, InitStatus, Shared};

/// Builder for [`Runtime`].
pub struct RuntimeBuilder {
    config: EngineConfig,
    hooks: Vec<Arc<dyn HookModuleFactory>>,
    entry: Option<Entry>,
    terminator: Arc<dyn Terminator>,
    output: Option<OutputSink>,
    trace: Option<bool>,
}

impl RuntimeBuilder {
    /// Adds a hook module. Modules are installed in the order added.
    pub fn hook(mut self, factory: impl HookModuleFactory + 'static) -> Self {
        self.hooks.push(Arc::new(factory));
        self
    }

    /// Adds several hook modules.
    pub fn hooks(mut self, factories: impl IntoIterator<Item = Arc<dyn HookModuleFactory>>) -> Self {
        self.hooks.extend(factories);
        self
    }

    /// Sets the entry point.
    pub fn entry(mut self, entry: Entry) -> Self {
        self.entry = Some(entry);
        self
    }

    /// Replaces the terminator; the default ends the OS process.
    pub fn terminator(mut self, terminator: Arc<dyn Terminator>) -> Self {
        self.terminator = terminator;
        self
    }

    /// Replaces the output sink; the default writes to stdout/stderr.
    pub fn output(mut self, output: OutputSink) -> Self {
        self.output = Some(output);
        self
    }

    /// Overrides `trace.invocations` from the configuration.
    pub fn trace(mut self, enabled: bool) -> Self {
        self.trace = Some(enabled);
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> Runtime {
        Runtime { builder: self }
    }
}

/// The two-context engine.
///
/// ```ignore
/// let request = Runtime::builder(config)
///     .hook(FnFactory::fixed("loader.mjs", hooks))
///     .entry(Entry::module("main.mjs", |scope| async move {
///         scope.import("./dep.mjs").await?;
///         Ok(())
///     }))
///     .build()
///     .run()?;
/// ```
pub struct Runtime {
    builder: RuntimeBuilder,
}

impl Runtime {
    /// Starts a builder over `config`.
    pub fn builder(config: EngineConfig) -> RuntimeBuilder {
        RuntimeBuilder {
            config,
            hooks: Vec::new(),
            entry: None,
            terminator: Arc::new(ProcessTerminator),
            output: None,
            trace: None,
        }
    }

    /// Runs until an exit is claimed and returns the winning request.
    ///
    /// With the default terminator the process ends inside this call.
    pub fn run(self) -> AppResult<ExitRequest> {
        let RuntimeBuilder {
            config,
            hooks,
            entry,
            terminator,
            output,
            trace,
        } = self.builder;

        let activity = Activity::new();
        let output =
            output.unwrap_or_else(|| OutputSink::process(config.output.buffer_capacity));
        let exit = Arc::new(ExitCoordinator::new(output.clone(), terminator));
        let (host_end, hook_end) = channel();
        let (init_tx, init_rx) = oneshot::channel();

        let shared = Arc::new(Shared {
            bridge: InvocationBridge::new(host_end, activity.clone()),
            monitor: Monitor::new(config.monitor.clone(), Arc::clone(&exit)),
            formatter: Formatter::new(Arc::clone(&exit), output.clone()),
            lifecycle: Lifecycle::new(),
            trace: trace.unwrap_or(config.trace.invocations),
            modules: Mutex::new(HashMap::new()),
            preload: Mutex::new(Vec::new()),
            init: Mutex::new(Some(init_tx)),
            tasks: Watchlist::new(),
            activity,
            exit,
            output,
        });

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .on_thread_park({
                let shared = Arc::clone(&shared);
                move || {
                    if shared.is_quiescent() {
                        shared.lifecycle.notify_idle();
                    }
                }
            })
            .build()?;

        info!(hooks = hooks.len(), "Starting hook context");
        let host = HookHost::spawn(HostOptions::from(&config.bridge), hooks, hook_end)?;

        let mut shutdown = shared.exit.subscribe();
        let request = runtime.block_on({
            let shared = Arc::clone(&shared);
            async move {
                tokio::spawn(shared::pump(Arc::clone(&shared)));
                tokio::spawn(lifecycle::watch(Arc::clone(&shared)));
                tokio::spawn(shared.tasks.watch(start(Arc::clone(&shared), init_rx, entry)));
                shutdown
                    .wait_for(Option::is_some)
                    .await
                    .ok()
                    .and_then(|winner| *winner)
            }
        });
        drop(runtime);

        shared.bridge.shutdown();
        host.join();

        let request = request
            .or_else(|| shared.exit.winner())
            .ok_or_else(|| AppError::internal("Main context stopped without an exit request"))?;
        info!(code = request.code, origin = %request.origin, "Engine finished");
        Ok(request)
    }
}

/// Waits for the hooks, then evaluates the entry.
async fn start(shared: Arc<Shared>, init: oneshot::Receiver<InitStatus>, entry: Option<Entry>) {
    let hooks_ready = shared.monitor.open_blocking_point("hook initialization");
    let tracked = shared.monitor.track_initialization(&hooks_ready);
    let status = parked(init).await.unwrap_or(InitStatus::Lost);
    drop(tracked);
    drop(hooks_ready);

    debug!(status = ?status, "Hook initialization finished");
    if status != InitStatus::Ready || shared.exit.is_claimed() {
        return;
    }
    let Some(entry) = entry else {
        return;
    };

    let (name, kind, url, body) = entry.into_parts();
    let blocker = match kind {
        EntryKind::Module => Some(Arc::new(
            shared.monitor.open_blocking_point("entry evaluation"),
        )),
        EntryKind::Script => None,
    };
    let scope = MainScope::new(Arc::clone(&shared), blocker.clone(), url);

    let outcome = body(scope).await;
    // Evaluation is over even if spawned work still holds a scope clone.
    if let Some(blocker) = &blocker {
        blocker.close();
    }

    if let Err(value) = outcome {
        shared.formatter.report(&value, Some(&name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use hookbridge_core::types::{InvocationResult, LoadArgs, ResolveArgs, ThrownValue};
    use hookbridge_hooks::{
        ClosureHook, FnFactory, HookError, HookModule, HookResult, HookScope, Next,
    };

    use crate::exit::{ExitOrigin, ReturnTerminator};
    use crate::output::Captured;

    fn never_settling() -> FnFactory {
        let module = HookModule::new()
            .with_resolve(ClosureHook::new(
                |args: ResolveArgs, next: Next<ResolveArgs>| async move {
                    match args.specifier.as_str() {
                        "never-settle-resolve" => futures::future::pending::<HookResult>().await,
                        "never-settle-load" => {
                            Ok(InvocationResult::resolved("never:never").short_circuited())
                        }
                        _ => next.call(args).await,
                    }
                },
            ))
            .with_load(ClosureHook::new(
                |args: LoadArgs, next: Next<LoadArgs>| async move {
                    if args.url == "never:never" {
                        return futures::future::pending::<HookResult>().await;
                    }
                    next.call(args).await
                },
            ));
        FnFactory::fixed("loader.mjs", module)
    }

    fn explode() -> HookResult {
        panic!("boom")
    }

    fn run(builder: RuntimeBuilder) -> (ExitRequest, Captured) {
        let (output, captured) = OutputSink::capture(1024);
        let request = builder
            .terminator(Arc::new(ReturnTerminator))
            .output(output)
            .build()
            .run()
            .unwrap();
        let captured = captured.lock().clone();
        (request, captured)
    }

    #[test]
    fn test_awaited_never_settling_resolve_exits_13() {
        let entry = Entry::module("never-resolve.mjs", |scope| async move {
            scope.print("should be output");
            scope.import("never-settle-resolve").await?;
            scope.print("should not be output");
            Ok(())
        });
        let (request, out) = run(Runtime::builder(EngineConfig::default())
            .hook(never_settling())
            .entry(entry));

        assert_eq!(request.code, 13);
        assert_eq!(request.origin, ExitOrigin::Monitor);
        assert_eq!(out.stdout_text(), "should be output\n");
        assert!(out.stderr.is_empty());
    }

    #[test]
    fn test_race_with_settling_branch_exits_0() {
        let entry = Entry::module("race.mjs", |scope| async move {
            let stuck = scope.import("never-settle-resolve");
            let settles = scope.import("node:fs");
            let winner = tokio::select! {
                _ = stuck => false,
                record = settles => record.is_ok(),
            };
            scope.print(&winner.to_string());
            Ok(())
        });
        let (request, out) = run(Runtime::builder(EngineConfig::default())
            .hook(never_settling())
            .entry(entry));

        assert_eq!(request.code, 0);
        assert_eq!(out.stdout_text(), "true\n");
    }

    #[test]
    fn test_script_does_not_block_on_unawaited_import() {
        let entry = Entry::script("never-load.cjs", |scope| async move {
            let pending = scope.clone();
            let _detached = scope.spawn(async move { pending.import("never-settle-load").await });
            scope.print("should be output");
            Ok(())
        });
        let (request, out) = run(Runtime::builder(EngineConfig::default())
            .hook(never_settling())
            .entry(entry));

        assert_eq!(request.code, 0);
        assert_eq!(out.stdout_text(), "should be output\n");
    }

    #[test]
    fn test_hook_exit_wins_with_its_code() {
        let factory = FnFactory::new("exit-loader", |scope: HookScope| async move {
            Ok(HookModule::new().with_resolve(ClosureHook::new(
                move |args: ResolveArgs, next: Next<ResolveArgs>| {
                    let scope = scope.clone();
                    async move {
                        if args.specifier == "exit:" {
                            return Err(scope.exit(42));
                        }
                        next.call(args).await
                    }
                },
            )))
        });
        let entry = Entry::module("main.mjs", |scope| async move {
            scope.resolve_sync("exit:")?;
            scope.print("unreachable");
            Ok(())
        });
        let (request, out) = run(Runtime::builder(EngineConfig::default())
            .hook(factory)
            .entry(entry));

        assert_eq!(request.code, 42);
        assert_eq!(request.origin, ExitOrigin::HookContext);
        assert!(out.stdout.is_empty());
        assert!(out.stderr.is_empty());
    }

    #[test]
    fn test_blocking_resolve_that_never_settles_exits_13() {
        let entry = Entry::module("import.meta.never-resolve.mjs", |scope| async move {
            scope.print("should be output");
            scope.resolve_sync("never-settle-resolve")?;
            Ok(())
        });
        let (request, out) = run(Runtime::builder(EngineConfig::default())
            .hook(never_settling())
            .entry(entry));

        assert_eq!(request.code, 13);
        assert_eq!(out.stdout_text(), "should be output\n");
        assert!(out.stderr.is_empty());
    }

    #[test]
    fn test_hook_top_level_throw_is_reported() {
        let factory = FnFactory::new("data:text/javascript,throw null", |_scope| async {
            Err(HookError::thrown(ThrownValue::Null))
        });
        let entry = Entry::module("empty.js", |scope| async move {
            scope.print("entry must not run");
            Ok(())
        });
        let (request, out) = run(Runtime::builder(EngineConfig::default())
            .hook(factory)
            .entry(entry));

        assert_eq!(request.code, 1);
        assert_eq!(request.origin, ExitOrigin::Formatter);
        assert!(out.stdout.is_empty());
        assert_eq!(out.stderr_text(), "data:text/javascript,throw null\n\nnull\n");
    }

    #[test]
    fn test_entry_throw_is_reported() {
        let entry = Entry::module("main.mjs", |_scope| async move {
            Err(ThrownValue::string("literal string"))
        });
        let (request, out) = run(Runtime::builder(EngineConfig::default()).entry(entry));

        assert_eq!(request.code, 1);
        assert_eq!(out.stderr_text(), "main.mjs\n\nliteral string\n");
    }

    #[test]
    fn test_natural_exit_uses_exit_code() {
        let entry = Entry::script("main.cjs", |scope| async move {
            scope.set_exit_code(3);
            Ok(())
        });
        let (request, _) = run(Runtime::builder(EngineConfig::default()).entry(entry));
        assert_eq!(request.code, 3);
        assert_eq!(request.origin, ExitOrigin::Natural);
    }

    #[test]
    fn test_application_exit() {
        let entry = Entry::module("main.mjs", |scope| async move {
            scope.print("bye");
            scope.exit::<()>(7).await;
            scope.print("unreachable");
            Ok(())
        });
        let (request, out) = run(Runtime::builder(EngineConfig::default()).entry(entry));
        assert_eq!(request.code, 7);
        assert_eq!(request.origin, ExitOrigin::Application);
        assert_eq!(out.stdout_text(), "bye\n");
    }

    #[test]
    fn test_removing_before_exit_observers_does_not_hang() {
        let factory = FnFactory::new("slow-loader", |scope: HookScope| async move {
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
        let (request, out) = run(Runtime::builder(EngineConfig::default())
            .hook(factory)
            .entry(entry));

        assert_eq!(request.code, 0);
        assert!(out.stdout.is_empty());
        assert!(out.stderr.is_empty());
    }

    #[test]
    fn test_plain_timer_in_entry_keeps_context_alive() {
        let entry = Entry::module("main.mjs", |scope| async move {
            scope.print("before");
            tokio::time::sleep(Duration::from_millis(20)).await;
            scope.print("after");
            Ok(())
        });
        let (request, out) = run(Runtime::builder(EngineConfig::default()).entry(entry));

        assert_eq!(request.code, 0);
        assert_eq!(request.origin, ExitOrigin::Natural);
        assert_eq!(out.stdout_text(), "before\nafter\n");
    }

    #[test]
    fn test_plain_timer_in_spawned_task_keeps_context_alive() {
        let entry = Entry::script("main.cjs", |scope| async move {
            let late = scope.clone();
            let _task = scope.spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                late.print("late");
            });
            scope.print("early");
            Ok(())
        });
        let (request, out) = run(Runtime::builder(EngineConfig::default()).entry(entry));

        assert_eq!(request.code, 0);
        assert_eq!(out.stdout_text(), "early\nlate\n");
    }

    #[test]
    fn test_plain_timer_in_hook_is_not_a_stall() {
        let factory = FnFactory::fixed(
            "slow-loader",
            HookModule::new().with_load(ClosureHook::new(
                |args: LoadArgs, next: Next<LoadArgs>| async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    next.call(args).await
                },
            )),
        );
        let entry = Entry::module("main.mjs", |scope| async move {
            scope.import("data:text/javascript,").await?;
            scope.print("loaded");
            Ok(())
        });
        let (request, out) = run(Runtime::builder(EngineConfig::default())
            .hook(factory)
            .entry(entry));

        assert_eq!(request.code, 0);
        assert_eq!(out.stdout_text(), "loaded\n");
    }

    #[test]
    fn test_repeated_file_imports_exit_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dep.mjs");
        std::fs::write(&path, "export {};").unwrap();
        let url = format!("file://{}", path.display());

        for _ in 0..25 {
            let target = url.clone();
            let entry = Entry::module("main.mjs", move |scope| async move {
                let module = scope.import(&target).await?;
                scope.print(&module.format);
                Ok(())
            });
            let (request, out) = run(Runtime::builder(EngineConfig::default())
                .hook(never_settling())
                .entry(entry));

            assert_eq!(request.code, 0);
            assert_eq!(request.origin, ExitOrigin::Natural);
            assert_eq!(out.stdout_text(), "module\n");
        }
    }

    #[test]
    fn test_hook_panic_is_reported_as_thrown_error() {
        let factory = FnFactory::fixed(
            "panicking-loader",
            HookModule::new().with_resolve(ClosureHook::new(
                |_args: ResolveArgs, _next: Next<ResolveArgs>| async move { explode() },
            )),
        );
        let entry = Entry::module("main.mjs", |scope| async move {
            scope.import("./dep.mjs").await?;
            scope.print("unreachable");
            Ok(())
        });
        let (request, out) = run(Runtime::builder(EngineConfig::default())
            .hook(factory)
            .entry(entry));

        assert_eq!(request.code, 1);
        assert_eq!(request.origin, ExitOrigin::Formatter);
        assert!(out.stdout.is_empty());
        assert_eq!(out.stderr_text(), "Error: boom\n");
    }

    #[test]
    fn test_trace_lines_for_completed_invocations() {
        let entry = Entry::module("main.mjs", |scope| async move {
            scope.import("node:fs").await?;
            Ok(())
        });
        let (request, out) = run(Runtime::builder(EngineConfig::default())
            .trace(true)
            .entry(entry));

        assert_eq!(request.code, 0);
        assert_eq!(
            out.stdout_text(),
            "{\"url\":\"node:fs\",\"format\":\"builtin\",\"shortCircuit\":false}\n\
             {\"format\":\"builtin\",\"shortCircuit\":false}\n"
        );
    }
}
