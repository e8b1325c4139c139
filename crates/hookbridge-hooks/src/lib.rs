//! # hookbridge-hooks
//!
//! Hook chain builder for hookbridge. Provides:
//!
//! - Hook modules exposing any of `resolve`, `load`, `globalPreload`
//! - A registry keeping definitions in install order
//! - Per-kind chains where each hook delegates to the rest through a
//!   cursor-bound, single-use continuation
//! - Terminal default resolve/load implementations
//! - The [`HookScope`] surface hook code uses to reach its host

pub mod defaults;
pub mod hooks;
pub mod scope;
pub mod traits;

pub use defaults::{DefaultLoad, DefaultResolve};
pub use hooks::chain::{Chain, Hook, Next};
pub use hooks::definitions::{HookDefinition, HookError, HookImpl, HookKind, HookResult};
pub use hooks::registry::HookRegistry;
pub use scope::{HookScope, ProcessControl};
pub use traits::{ClosureHook, FnFactory, GlobalPreload, HookModule, HookModuleFactory};
