//! Delegation chains.
//!
//! A chain is the ordered list of installed hooks of one kind plus a
//! terminal default. Running it starts at cursor 0; every hook receives a
//! [`Next`] bound to the position after it, so concurrent invocations of
//! the same chain never share traversal state.
//!
//! - A hook that returns with `short_circuit` set ends traversal and its
//!   result is returned verbatim.
//! - A hook that calls `next` gets the downstream result and may return it
//!   as is or adjusted.
//! - A hook that does neither fails the invocation with
//!   [`HookError::ChainIncomplete`].
//!
//! The last rule is stricter than a plain "hooks may return anything"
//! contract: a result that neither came from downstream nor was explicitly
//! marked final is treated as a bug in the hook, so a forgotten `next`
//! call surfaces as an error instead of silently skipping later hooks.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use hookbridge_core::types::InvocationResult;

use super::definitions::{HookError, HookKind, HookResult};

/// The capability every resolve or load hook implements.
///
/// `A` is [`ResolveArgs`](hookbridge_core::types::ResolveArgs) or
/// [`LoadArgs`](hookbridge_core::types::LoadArgs).
#[async_trait]
pub trait Hook<A: Send + 'static>: Send + Sync + fmt::Debug {
    /// Handles one invocation, optionally delegating through `next`.
    async fn call(&self, args: A, next: Next<A>) -> HookResult;
}

/// Checks a link's result; returns the reason it is invalid.
pub type Validator = fn(&InvocationResult) -> Result<(), String>;

/// One position in a chain.
#[derive(Debug)]
struct ChainLink<A: Send + 'static> {
    module: String,
    hook: Arc<dyn Hook<A>>,
}

/// Ordered hooks of one kind followed by the terminal default.
pub struct Chain<A: Send + 'static> {
    kind: HookKind,
    links: Vec<ChainLink<A>>,
    terminal: Arc<dyn Hook<A>>,
    validate: Validator,
}

impl<A: Send + 'static> Chain<A> {
    /// Builds a chain from `(module, hook)` pairs in execution order.
    pub fn new(
        kind: HookKind,
        hooks: Vec<(String, Arc<dyn Hook<A>>)>,
        terminal: Arc<dyn Hook<A>>,
        validate: Validator,
    ) -> Self {
        Self {
            kind,
            links: hooks
                .into_iter()
                .map(|(module, hook)| ChainLink { module, hook })
                .collect(),
            terminal,
            validate,
        }
    }

    /// Number of installed hooks, excluding the terminal default.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether only the terminal default is present.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// The hook kind this chain serves.
    pub fn kind(&self) -> HookKind {
        self.kind
    }

    /// Runs the chain from the first hook.
    pub fn run(self: &Arc<Self>, args: A) -> BoxFuture<'static, HookResult> {
        Self::run_from(Arc::clone(self), 0, args)
    }

    fn run_from(chain: Arc<Self>, cursor: usize, args: A) -> BoxFuture<'static, HookResult> {
        async move {
            let Some(link) = chain.links.get(cursor) else {
                debug!(kind = %chain.kind, "Running default hook");
                let terminal = Arc::clone(&chain.terminal);
                let result = terminal.call(args, Next::exhausted(chain)).await?;
                return Ok(result);
            };

            let module = link.module.clone();
            let hook = Arc::clone(&link.hook);
            let delegated = Arc::new(AtomicBool::new(false));
            let next = Next {
                chain: Arc::clone(&chain),
                cursor: cursor + 1,
                delegated: Arc::clone(&delegated),
            };

            debug!(kind = %chain.kind, module = %module, cursor, "Running hook");
            let result = hook.call(args, next).await?;

            if !result.short_circuit && !delegated.load(Ordering::SeqCst) {
                return Err(HookError::ChainIncomplete {
                    module,
                    kind: chain.kind,
                });
            }

            (chain.validate)(&result).map_err(|reason| HookError::InvalidReturn {
                module: module.clone(),
                kind: chain.kind,
                reason,
            })?;

            if result.short_circuit {
                debug!(kind = %chain.kind, module = %module, "Hook short-circuited");
            }

            Ok(result)
        }
        .boxed()
    }
}

impl<A: Send + 'static> fmt::Debug for Chain<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("kind", &self.kind)
            .field(
                "modules",
                &self.links.iter().map(|l| l.module.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Continuation handed to a hook: the remaining suffix of its chain.
///
/// Consumed by [`call`](Next::call), so a hook can delegate at most once.
pub struct Next<A: Send + 'static> {
    chain: Arc<Chain<A>>,
    cursor: usize,
    delegated: Arc<AtomicBool>,
}

impl<A: Send + 'static> Next<A> {
    fn exhausted(chain: Arc<Chain<A>>) -> Self {
        let cursor = chain.links.len() + 1;
        Self {
            chain,
            cursor,
            delegated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Delegates to the rest of the chain with (possibly modified) arguments.
    pub async fn call(self, args: A) -> HookResult {
        if self.cursor > self.chain.links.len() {
            return Err(HookError::ChainExhausted {
                kind: self.chain.kind,
            });
        }
        self.delegated.store(true, Ordering::SeqCst);
        Chain::run_from(self.chain, self.cursor, args).await
    }

    /// Position this continuation resumes at.
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl<A: Send + 'static> fmt::Debug for Next<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("kind", &self.chain.kind)
            .field("cursor", &self.cursor)
            .finish()
    }
}
