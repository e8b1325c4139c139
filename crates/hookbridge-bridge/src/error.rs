//! Bridge error types.

use hookbridge_core::error::{AppError, ErrorKind};
use hookbridge_core::types::ThrownValue;
use hookbridge_hooks::HookError;

/// Failure of a bridged invocation or of the bridge itself.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    /// The hook context broke the one-response-per-id rule or sent an
    /// undecodable frame. Fatal.
    #[error("protocol violation: {reason}")]
    ProtocolViolation {
        /// What was observed.
        reason: String,
    },
    /// The hook context went away before settling.
    #[error("hook context is gone")]
    ContextLost,
    /// The hook chain rejected.
    #[error(transparent)]
    Hook(#[from] HookError),
    /// A hook panicked while handling the invocation.
    #[error("hook faulted with a {} value", .error.kind_name())]
    Fault {
        /// The panic, as a thrown error.
        error: ThrownValue,
    },
    /// A request could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(String),
}

impl BridgeError {
    /// A protocol violation described by `reason`.
    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            reason: reason.into(),
        }
    }

    /// Whether this error must terminate the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ProtocolViolation { .. })
    }
}

impl From<BridgeError> for AppError {
    fn from(err: BridgeError) -> Self {
        let kind = match &err {
            BridgeError::ProtocolViolation { .. } => ErrorKind::Protocol,
            BridgeError::ContextLost => ErrorKind::ContextLost,
            BridgeError::Hook(_) | BridgeError::Fault { .. } => ErrorKind::Hook,
            BridgeError::Encode(_) => ErrorKind::Serialization,
        };
        AppError::with_source(kind, "Bridged invocation failed", err)
    }
}
