//! # hookbridge-bridge
//!
//! Invocation bridge for hookbridge. Provides:
//!
//! - Typed JSON frames exchanged between the main and hook contexts
//! - A paired channel whose hook → main half can be drained both by an
//!   async pump and by a thread blocked in a synchronous resolve
//! - A pending table correlating each request id with exactly one
//!   settlement
//! - The hook context host: a dedicated thread running the hook chains
//!   and reporting when it has stalled

pub mod bridge;
pub mod channel;
pub mod error;
pub mod host;
pub mod message;

pub use bridge::{BridgeEvent, InvocationBridge, PendingHandle};
pub use channel::{HookEndpoint, HookSender, HostEndpoint};
pub use error::BridgeError;
pub use host::{HookHost, HostOptions};
pub use message::types::{HookMessage, HostMessage};
