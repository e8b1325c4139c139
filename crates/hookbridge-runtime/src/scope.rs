//! The surface application code in the main context runs against.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use hookbridge_bridge::{BridgeError, BridgeEvent};
use hookbridge_core::{KeepAlive, Parked, parked};
use hookbridge_core::types::{
    InvocationArgs, InvocationKind, InvocationResult, LoadArgs, LoadContext, ResolveArgs,
    ResolveContext, SourceBytes,
};
use hookbridge_hooks::HookError;

use crate::error::LoadError;
use crate::exit::ExitOrigin;
use crate::monitor::BlockingPoint;
use crate::shared::Shared;
use crate::timer::{self, TimerHandle};

/// A loaded module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    /// Resolved URL.
    pub url: String,
    /// Module format.
    pub format: String,
    /// Source bytes, absent for builtins.
    pub source: Option<SourceBytes>,
}

impl ModuleRecord {
    /// The source as UTF-8 text, if present and valid.
    pub fn source_text(&self) -> Option<&str> {
        self.source
            .as_ref()
            .and_then(|source| std::str::from_utf8(source.as_bytes()).ok())
    }
}

/// Handle application code uses to reach the engine.
///
/// A scope belongs to one module: relative specifiers resolve against its
/// URL, and imports made through it count against its evaluation's
/// blocking point when there is one.
#[derive(Clone)]
pub struct MainScope {
    shared: Arc<Shared>,
    blocker: Option<Arc<BlockingPoint>>,
    parent_url: Option<String>,
}

impl MainScope {
    pub(crate) fn new(
        shared: Arc<Shared>,
        blocker: Option<Arc<BlockingPoint>>,
        parent_url: Option<String>,
    ) -> Self {
        Self {
            shared,
            blocker,
            parent_url,
        }
    }

    /// A scope for code evaluated as part of `module`.
    pub fn for_module(&self, module: &ModuleRecord) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            blocker: self.blocker.clone(),
            parent_url: Some(module.url.clone()),
        }
    }

    /// URL relative specifiers resolve against.
    pub fn parent_url(&self) -> Option<&str> {
        self.parent_url.as_deref()
    }

    /// Resolves `specifier` through the hook chain.
    pub async fn resolve(&self, specifier: &str) -> Result<InvocationResult, LoadError> {
        let context = ResolveContext {
            parent_url: self.parent_url.clone(),
            ..ResolveContext::default()
        };
        self.invoke(InvocationArgs::Resolve(ResolveArgs::new(specifier, context)))
            .await
    }

    /// Loads `url` through the hook chain, passing `format` as the hint.
    pub async fn load(
        &self,
        url: &str,
        format: Option<String>,
    ) -> Result<InvocationResult, LoadError> {
        let context = LoadContext {
            format,
            ..LoadContext::default()
        };
        self.invoke(InvocationArgs::Load(LoadArgs::new(url, context)))
            .await
    }

    /// Resolves and loads `specifier`, reusing an earlier load of the same URL.
    pub async fn import(&self, specifier: &str) -> Result<ModuleRecord, LoadError> {
        let resolved = self.resolve(specifier).await?;
        let url = resolved.url.ok_or_else(|| LoadError::Hook {
            target: specifier.to_string(),
            source: HookError::NotFound {
                specifier: specifier.to_string(),
            },
        })?;

        let cached = self.shared.modules.lock().get(&url).cloned();
        if let Some(record) = cached {
            debug!(url = %url, "Module already loaded");
            return Ok(record);
        }

        let loaded = self.load(&url, resolved.format).await?;
        let record = ModuleRecord {
            url: url.clone(),
            format: loaded.format.unwrap_or_default(),
            source: loaded.source,
        };
        self.shared
            .modules
            .lock()
            .entry(url)
            .or_insert_with(|| record.clone());
        Ok(record)
    }

    /// Resolves `specifier` while blocking the whole main context.
    ///
    /// Nothing else in the main context runs until the hook chain answers.
    /// If it never does, the monitor ends the process.
    pub fn resolve_sync(&self, specifier: &str) -> Result<InvocationResult, LoadError> {
        let shared = &self.shared;
        let point = shared.monitor.open_blocking_point("synchronous resolve");
        let context = ResolveContext {
            parent_url: self.parent_url.clone(),
            ..ResolveContext::default()
        };
        let args = InvocationArgs::Resolve(ResolveArgs::new(specifier, context));

        let mut handle = shared
            .bridge
            .send(args)
            .map_err(|e| LoadError::from_bridge(specifier, e))?;
        let _tracked = shared.monitor.track(
            handle.id(),
            InvocationKind::Resolve,
            specifier,
            Some(&point),
        );

        loop {
            if shared.exit.is_claimed() {
                return Err(LoadError::Terminated);
            }
            if let Some(outcome) = handle.try_take() {
                let result = outcome.map_err(|e| LoadError::from_bridge(specifier, e))?;
                shared.trace_result(&result);
                return Ok(result);
            }
            match shared.bridge.recv_blocking() {
                Some(BridgeEvent::Stalled { current: true, .. }) => {
                    // The hook context cannot make progress and this thread
                    // is blocked on it.
                    shared.monitor.check();
                }
                Some(event) => shared.handle_event(event),
                None => return Err(LoadError::from_bridge(specifier, BridgeError::ContextLost)),
            }
        }
    }

    async fn invoke(&self, args: InvocationArgs) -> Result<InvocationResult, LoadError> {
        let shared = &self.shared;
        let target = args.target().to_string();
        let kind = args.kind();

        let handle = shared
            .bridge
            .send(args)
            .map_err(|e| LoadError::from_bridge(&target, e))?;
        let _tracked = shared
            .monitor
            .track(handle.id(), kind, target.as_str(), self.blocker.as_deref());

        let result = handle
            .await
            .map_err(|e| LoadError::from_bridge(&target, e))?;
        shared.trace_result(&result);
        Ok(result)
    }

    /// Runs `future` as a separate task of the main context.
    ///
    /// The task keeps the context alive while a timer, channel or blocking
    /// job can still wake it. Awaiting the handle does not, so a task
    /// joining a stuck task is stuck too.
    pub fn spawn<F>(&self, future: F) -> Parked<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        parked(tokio::spawn(self.shared.tasks.watch(future)))
    }

    /// Writes `line` to stdout.
    pub fn print(&self, line: &str) {
        self.shared.output.print(line);
    }

    /// Writes `line` to stderr.
    pub fn eprint(&self, line: &str) {
        self.shared.output.eprint(line);
    }

    /// Requests process exit with `code`. Never returns.
    pub async fn exit<T>(&self, code: i32) -> T {
        self.shared.exit.request_exit(code, ExitOrigin::Application);
        std::future::pending().await
    }

    /// Sets the code used when the process exits naturally.
    pub fn set_exit_code(&self, code: i32) {
        self.shared.lifecycle.set_exit_code(code);
    }

    /// Sleeps while keeping the main context alive.
    pub async fn sleep(&self, duration: Duration) {
        let _timer = self.shared.activity.keep_alive("sleep");
        tokio::time::sleep(duration).await;
    }

    /// Runs `callback` once after `delay`.
    pub fn set_timeout<F>(&self, delay: Duration, callback: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        timer::timeout(&self.shared.activity, delay, callback)
    }

    /// Runs `callback` every `period` until cancelled.
    pub fn set_interval<F>(&self, period: Duration, callback: F) -> TimerHandle
    where
        F: FnMut() + Send + 'static,
    {
        timer::interval(&self.shared.activity, period, callback)
    }

    /// Keeps the main context alive until the guard is dropped.
    pub fn keep_alive(&self, reason: &'static str) -> KeepAlive {
        self.shared.activity.keep_alive(reason)
    }

    /// Registers a before-exit observer.
    pub fn on_before_exit(&self, observer: impl Fn() + Send + Sync + 'static) {
        self.shared.lifecycle.on_before_exit(observer);
    }

    /// Removes every before-exit observer.
    pub fn remove_all_before_exit(&self) -> usize {
        self.shared.lifecycle.remove_all_before_exit()
    }

    /// Preload sources provided by the hook modules.
    pub fn global_preload(&self) -> Vec<String> {
        self.shared.preload.lock().clone()
    }
}

impl std::fmt::Debug for MainScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainScope")
            .field("parent_url", &self.parent_url)
            .field("blocking", &self.blocker.is_some())
            .finish()
    }
}
