//! Shared domain types: identifiers, invocation payloads, thrown values.

pub mod id;
pub mod invocation;
pub mod value;

pub use id::{IdAllocator, InvocationId};
pub use invocation::{
    InvocationArgs, InvocationKind, InvocationResult, LoadArgs, LoadContext, ResolveArgs,
    ResolveContext, SourceBytes,
};
pub use value::ThrownValue;
