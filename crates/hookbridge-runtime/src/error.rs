//! Module loading errors seen by application code.

use hookbridge_bridge::BridgeError;
use hookbridge_core::error::{AppError, ErrorKind};
use hookbridge_core::types::ThrownValue;
use hookbridge_hooks::HookError;

/// Failure of one `resolve`, `load` or `import` step.
///
/// Each failure is scoped to the module that caused it; the rest of the
/// module graph is unaffected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadError {
    /// The hook chain rejected.
    #[error("failed to load '{target}': {source}")]
    Hook {
        /// Specifier or URL.
        target: String,
        /// Chain failure.
        source: HookError,
    },
    /// The hook context went away before answering.
    #[error("hook context lost while loading '{target}'")]
    ContextLost {
        /// Specifier or URL.
        target: String,
    },
    /// A hook panicked while handling the request.
    #[error("hook faulted while loading '{target}'")]
    Fault {
        /// Specifier or URL.
        target: String,
        /// The panic, as a thrown error.
        error: ThrownValue,
    },
    /// The process is exiting; no result will arrive.
    #[error("process is exiting")]
    Terminated,
    /// The request could not be sent.
    #[error("failed to encode request: {0}")]
    Encode(String),
}

impl LoadError {
    pub(crate) fn from_bridge(target: &str, err: BridgeError) -> Self {
        let target = target.to_string();
        match err {
            BridgeError::Hook(source) => Self::Hook { target, source },
            BridgeError::ContextLost => Self::ContextLost { target },
            BridgeError::Fault { error } => Self::Fault { target, error },
            BridgeError::ProtocolViolation { .. } => Self::Terminated,
            BridgeError::Encode(reason) => Self::Encode(reason),
        }
    }

    /// The value application code observes as the rejection.
    pub fn thrown_value(&self) -> ThrownValue {
        match self {
            Self::Hook {
                source: HookError::Thrown { value },
                ..
            } => value.clone(),
            Self::Fault { error, .. } => error.clone(),
            Self::Hook { source, .. } => ThrownValue::error("Error", source.to_string()),
            other => ThrownValue::error("Error", other.to_string()),
        }
    }
}

impl From<LoadError> for ThrownValue {
    fn from(err: LoadError) -> Self {
        err.thrown_value()
    }
}

impl From<LoadError> for AppError {
    fn from(err: LoadError) -> Self {
        let kind = match &err {
            LoadError::Hook { .. } | LoadError::Fault { .. } => ErrorKind::Hook,
            LoadError::ContextLost { .. } => ErrorKind::ContextLost,
            LoadError::Terminated => ErrorKind::Internal,
            LoadError::Encode(_) => ErrorKind::Serialization,
        };
        AppError::with_source(kind, "Module loading failed", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thrown_rejection_passes_value_through() {
        let err = LoadError::from_bridge(
            "x",
            BridgeError::Hook(HookError::thrown(ThrownValue::string("nope"))),
        );
        assert_eq!(err.thrown_value(), ThrownValue::string("nope"));
    }

    #[test]
    fn test_context_lost_is_scoped_to_target() {
        let err = LoadError::from_bridge("./a.mjs", BridgeError::ContextLost);
        assert_eq!(
            err,
            LoadError::ContextLost {
                target: "./a.mjs".to_string()
            }
        );
        assert_eq!(
            err.thrown_value(),
            ThrownValue::error("Error", "hook context lost while loading './a.mjs'")
        );
    }
}
