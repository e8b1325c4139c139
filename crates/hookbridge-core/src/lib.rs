//! # hookbridge-core
//!
//! Core crate for hookbridge. Contains configuration schemas, the
//! invocation and thrown-value data model shared by both execution
//! contexts, typed identifiers, keep-alive and waker-liveness accounting,
//! and the unified error system.
//!
//! This crate has **no** internal dependencies on other hookbridge crates.

pub mod activity;
pub mod config;
pub mod error;
pub mod liveness;
pub mod result;
pub mod types;

pub use activity::{Activity, KeepAlive};
pub use error::AppError;
pub use liveness::{Liveness, Parked, Watched, Watchlist, parked};
pub use result::AppResult;
