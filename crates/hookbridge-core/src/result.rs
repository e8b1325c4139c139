//! Convenience result type alias for hookbridge.

use crate::error::AppError;

/// A specialized `Result` type for hookbridge operations.
pub type AppResult<T> = Result<T, AppError>;
