//! Hook system: definitions, chains, and the registry.

pub mod chain;
pub mod definitions;
pub mod registry;

pub use chain::{Chain, Hook, Next};
pub use definitions::{HookDefinition, HookError, HookImpl, HookKind, HookResult};
pub use registry::HookRegistry;
