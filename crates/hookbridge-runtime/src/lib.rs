//! # hookbridge-runtime
//!
//! The main execution context of hookbridge. Provides:
//!
//! - [`Runtime`], which starts the hook context, waits for its modules and
//!   evaluates the [`Entry`] against a [`MainScope`]
//! - The never-settling [`Monitor`], run at every natural exit point
//! - The first-claim-wins [`ExitCoordinator`] and the buffered
//!   [`OutputSink`] it flushes
//! - The [`Formatter`] rendering uncaught thrown values

pub mod entry;
pub mod error;
pub mod exit;
pub mod formatter;
pub mod lifecycle;
pub mod monitor;
pub mod output;
pub mod runtime;
pub mod scope;
pub mod timer;

mod shared;

pub use entry::{Entry, EntryKind};
pub use error::LoadError;
pub use exit::{
    ExitClaim, ExitCoordinator, ExitOrigin, ExitRequest, PROTOCOL_EXIT_CODE, ProcessTerminator,
    ReturnTerminator, Terminator, UNCAUGHT_EXIT_CODE, UNSETTLED_EXIT_CODE,
};
pub use formatter::{CompactInspector, Formatter, Inspect};
pub use lifecycle::Lifecycle;
pub use monitor::{BlockedInvocation, BlockingPoint, Monitor, TrackedInvocation};
pub use output::{Captured, OutputSink, Stream};
pub use runtime::{Runtime, RuntimeBuilder};
pub use scope::{MainScope, ModuleRecord};
pub use timer::TimerHandle;
