//! Hook registry: modules install hooks in order; chains are built per kind.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use hookbridge_core::types::{InvocationArgs, InvocationResult, LoadArgs, ResolveArgs};

use super::chain::{Chain, Hook};
use super::definitions::{HookDefinition, HookImpl, HookKind, HookResult};
use crate::defaults::{DefaultLoad, DefaultResolve};
use crate::traits::HookModule;

/// Registry of installed hooks, in install order.
///
/// Chains are rebuilt lazily after each registration and shared by every
/// invocation until the next one.
#[derive(Debug)]
pub struct HookRegistry {
    /// All definitions; `registration_order` equals the index.
    definitions: RwLock<Vec<HookDefinition>>,
    /// Terminal resolve hook.
    default_resolve: Arc<dyn Hook<ResolveArgs>>,
    /// Terminal load hook.
    default_load: Arc<dyn Hook<LoadArgs>>,
    /// Cached resolve chain.
    resolve_chain: RwLock<Option<Arc<Chain<ResolveArgs>>>>,
    /// Cached load chain.
    load_chain: RwLock<Option<Arc<Chain<LoadArgs>>>>,
}

impl HookRegistry {
    /// Creates an empty registry ending in the default resolve/load hooks.
    pub fn new() -> Self {
        Self::with_defaults(Arc::new(DefaultResolve::new()), Arc::new(DefaultLoad::new()))
    }

    /// Creates an empty registry with custom terminal hooks.
    pub fn with_defaults(
        default_resolve: Arc<dyn Hook<ResolveArgs>>,
        default_load: Arc<dyn Hook<LoadArgs>>,
    ) -> Self {
        Self {
            definitions: RwLock::new(Vec::new()),
            default_resolve,
            default_load,
            resolve_chain: RwLock::new(None),
            load_chain: RwLock::new(None),
        }
    }

    /// Installs every hook `module` provides, after all earlier ones.
    pub async fn register(&self, module_id: &str, module: HookModule) {
        let mut definitions = self.definitions.write().await;
        let mut installed = Vec::new();

        for implementation in module.into_impls() {
            let kind = match &implementation {
                HookImpl::Resolve(_) => HookKind::Resolve,
                HookImpl::Load(_) => HookKind::Load,
                HookImpl::GlobalPreload(_) => HookKind::GlobalPreload,
            };
            let registration_order = definitions.len();
            definitions.push(HookDefinition {
                kind,
                module: module_id.to_string(),
                registration_order,
                implementation,
            });
            installed.push(kind.as_str());
        }
        drop(definitions);

        *self.resolve_chain.write().await = None;
        *self.load_chain.write().await = None;

        info!(
            module = %module_id,
            hooks = ?installed,
            "Hook module registered"
        );
    }

    /// Runs the chain matching the invocation kind from its first hook.
    pub async fn invoke(&self, args: InvocationArgs) -> HookResult {
        debug!(kind = %args.kind(), target = %args.target(), "Dispatching invocation");
        match args {
            InvocationArgs::Resolve(args) => self.resolve_chain().await.run(args).await,
            InvocationArgs::Load(args) => self.load_chain().await.run(args).await,
        }
    }

    /// Preload sources of every module, in registration order.
    pub async fn global_preload(&self) -> Vec<String> {
        let definitions = self.definitions.read().await;
        definitions
            .iter()
            .filter_map(|d| match &d.implementation {
                HookImpl::GlobalPreload(preload) => Some(preload.source()),
                _ => None,
            })
            .collect()
    }

    /// Returns the number of hooks installed for `kind`.
    pub async fn handler_count(&self, kind: HookKind) -> usize {
        let definitions = self.definitions.read().await;
        definitions.iter().filter(|d| d.kind == kind).count()
    }

    /// Returns the distinct module ids, in registration order.
    pub async fn registered_modules(&self) -> Vec<String> {
        let definitions = self.definitions.read().await;
        let mut modules: Vec<String> = Vec::new();
        for definition in definitions.iter() {
            if !modules.contains(&definition.module) {
                modules.push(definition.module.clone());
            }
        }
        modules
    }

    async fn resolve_chain(&self) -> Arc<Chain<ResolveArgs>> {
        if let Some(chain) = self.resolve_chain.read().await.as_ref() {
            return Arc::clone(chain);
        }
        let hooks = self
            .definitions
            .read()
            .await
            .iter()
            .filter_map(|d| match &d.implementation {
                HookImpl::Resolve(hook) => Some((d.module.clone(), Arc::clone(hook))),
                _ => None,
            })
            .collect();
        let chain = Arc::new(Chain::new(
            HookKind::Resolve,
            hooks,
            Arc::clone(&self.default_resolve),
            validate_resolve,
        ));
        *self.resolve_chain.write().await = Some(Arc::clone(&chain));
        chain
    }

    async fn load_chain(&self) -> Arc<Chain<LoadArgs>> {
        if let Some(chain) = self.load_chain.read().await.as_ref() {
            return Arc::clone(chain);
        }
        let hooks = self
            .definitions
            .read()
            .await
            .iter()
            .filter_map(|d| match &d.implementation {
                HookImpl::Load(hook) => Some((d.module.clone(), Arc::clone(hook))),
                _ => None,
            })
            .collect();
        let chain = Arc::new(Chain::new(
            HookKind::Load,
            hooks,
            Arc::clone(&self.default_load),
            validate_load,
        ));
        *self.load_chain.write().await = Some(Arc::clone(&chain));
        chain
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_resolve(result: &InvocationResult) -> Result<(), String> {
    match result.url.as_deref() {
        Some(url) if !url.is_empty() => Ok(()),
        _ => Err("a resolve result must carry a url".to_string()),
    }
}

fn validate_load(result: &InvocationResult) -> Result<(), String> {
    match result.format.as_deref() {
        None => Err("a load result must carry a format".to_string()),
        Some("builtin") => Ok(()),
        Some(_) if result.source.is_none() => {
            Err("a load result must carry a source unless its format is builtin".to_string())
        }
        Some(_) => Ok(()),
    }
}
