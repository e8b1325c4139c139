//! Traits and helpers for writing hook modules.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use hookbridge_core::types::{LoadArgs, ResolveArgs};

use crate::hooks::chain::{Hook, Next};
use crate::hooks::definitions::{HookError, HookImpl, HookResult};
use crate::scope::HookScope;

/// Provider of code the main context runs before the entry point.
pub trait GlobalPreload: Send + Sync + fmt::Debug {
    /// The preload source text.
    fn source(&self) -> String;
}

/// The hooks one module exposes. Every hook is optional.
#[derive(Debug, Default, Clone)]
pub struct HookModule {
    resolve: Option<Arc<dyn Hook<ResolveArgs>>>,
    load: Option<Arc<dyn Hook<LoadArgs>>>,
    global_preload: Option<Arc<dyn GlobalPreload>>,
}

impl HookModule {
    /// A module exposing no hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `resolve` hook.
    pub fn with_resolve(mut self, hook: impl Hook<ResolveArgs> + 'static) -> Self {
        self.resolve = Some(Arc::new(hook));
        self
    }

    /// Sets the `load` hook.
    pub fn with_load(mut self, hook: impl Hook<LoadArgs> + 'static) -> Self {
        self.load = Some(Arc::new(hook));
        self
    }

    /// Sets the `globalPreload` hook.
    pub fn with_global_preload(mut self, preload: impl GlobalPreload + 'static) -> Self {
        self.global_preload = Some(Arc::new(preload));
        self
    }

    /// Whether the module exposes nothing.
    pub fn is_empty(&self) -> bool {
        self.resolve.is_none() && self.load.is_none() && self.global_preload.is_none()
    }

    /// The implementations, in `resolve`, `load`, `globalPreload` order.
    pub(crate) fn into_impls(self) -> Vec<HookImpl> {
        let mut impls = Vec::new();
        if let Some(hook) = self.resolve {
            impls.push(HookImpl::Resolve(hook));
        }
        if let Some(hook) = self.load {
            impls.push(HookImpl::Load(hook));
        }
        if let Some(preload) = self.global_preload {
            impls.push(HookImpl::GlobalPreload(preload));
        }
        impls
    }
}

/// A hook backed by a closure.
pub struct ClosureHook<A: Send + 'static> {
    handler: Arc<dyn Fn(A, Next<A>) -> Pin<Box<dyn Future<Output = HookResult> + Send>> + Send + Sync>,
}

impl<A: Send + 'static> ClosureHook<A> {
    /// Wraps `handler` as a hook.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(A, Next<A>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        Self {
            handler: Arc::new(move |args, next| Box::pin(handler(args, next))),
        }
    }
}

impl<A: Send + 'static> fmt::Debug for ClosureHook<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureHook")
            .field("handler", &"<closure>")
            .finish()
    }
}

#[async_trait]
impl<A: Send + 'static> Hook<A> for ClosureHook<A> {
    async fn call(&self, args: A, next: Next<A>) -> HookResult {
        (self.handler)(args, next).await
    }
}

/// Evaluates a hook module inside the hook context.
///
/// `instantiate` is the module's top-level body: it may await, throw (an
/// `Err(HookError::Thrown)`), or exit the process through the scope.
#[async_trait]
pub trait HookModuleFactory: Send + Sync {
    /// Identifier the module is registered under.
    fn id(&self) -> &str;

    /// Runs the module body and returns its hooks.
    async fn instantiate(&self, scope: HookScope) -> Result<HookModule, HookError>;
}

type FactoryFn =
    dyn Fn(HookScope) -> Pin<Box<dyn Future<Output = Result<HookModule, HookError>> + Send>>
        + Send
        + Sync;

/// A [`HookModuleFactory`] backed by a closure.
pub struct FnFactory {
    id: String,
    body: Box<FactoryFn>,
}

impl FnFactory {
    /// Creates a factory named `id` whose body is `body`.
    pub fn new<F, Fut>(id: impl Into<String>, body: F) -> Self
    where
        F: Fn(HookScope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookModule, HookError>> + Send + 'static,
    {
        Self {
            id: id.into(),
            body: Box::new(move |scope| Box::pin(body(scope))),
        }
    }

    /// A factory returning a fixed module.
    pub fn fixed(id: impl Into<String>, module: HookModule) -> Self {
        Self::new(id, move |_scope| {
            let module = module.clone();
            async move { Ok(module) }
        })
    }
}

impl fmt::Debug for FnFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFactory").field("id", &self.id).finish()
    }
}

#[async_trait]
impl HookModuleFactory for FnFactory {
    fn id(&self) -> &str {
        &self.id
    }

    async fn instantiate(&self, scope: HookScope) -> Result<HookModule, HookError> {
        (self.body)(scope).await
    }
}
