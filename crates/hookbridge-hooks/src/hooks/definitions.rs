//! Hook kinds, installed definitions, and the hook error taxonomy.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use hookbridge_core::error::{AppError, ErrorKind};
use hookbridge_core::types::{InvocationKind, InvocationResult, LoadArgs, ResolveArgs, ThrownValue};

use super::chain::Hook;
use crate::traits::GlobalPreload;

/// Enumeration of every hook a module can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookKind {
    /// `resolve(specifier, context, next)`.
    Resolve,
    /// `load(url, context, next)`.
    Load,
    /// `globalPreload()`.
    GlobalPreload,
}

impl HookKind {
    /// Returns the string name of this hook kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Load => "load",
            Self::GlobalPreload => "globalPreload",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<InvocationKind> for HookKind {
    fn from(kind: InvocationKind) -> Self {
        match kind {
            InvocationKind::Resolve => Self::Resolve,
            InvocationKind::Load => Self::Load,
        }
    }
}

/// The implementation behind a [`HookDefinition`].
#[derive(Clone)]
pub enum HookImpl {
    /// A resolve hook.
    Resolve(Arc<dyn Hook<ResolveArgs>>),
    /// A load hook.
    Load(Arc<dyn Hook<LoadArgs>>),
    /// A global preload provider.
    GlobalPreload(Arc<dyn GlobalPreload>),
}

impl fmt::Debug for HookImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve(hook) => f.debug_tuple("Resolve").field(hook).finish(),
            Self::Load(hook) => f.debug_tuple("Load").field(hook).finish(),
            Self::GlobalPreload(_) => f.debug_tuple("GlobalPreload").finish(),
        }
    }
}

/// One installed hook. Immutable once registered.
#[derive(Debug, Clone)]
pub struct HookDefinition {
    /// Which hook this is.
    pub kind: HookKind,
    /// Identifier of the module that provided it.
    pub module: String,
    /// Global install position; chains run in ascending order.
    pub registration_order: usize,
    /// The implementation.
    pub implementation: HookImpl,
}

/// Result of a hook or of a whole chain.
pub type HookResult = Result<InvocationResult, HookError>;

/// Failure of a hook invocation.
///
/// Everything except [`HookError::ExitRequested`] is carried back across
/// the bridge as the error of that one invocation.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HookError {
    /// Hook code rejected with a thrown value.
    #[error("hook threw a {} value", .value.kind_name())]
    Thrown {
        /// The thrown value.
        value: ThrownValue,
    },
    /// A hook returned without delegating and without `shortCircuit`.
    #[error("'{module}' {kind} hook returned without calling next or setting shortCircuit")]
    ChainIncomplete {
        /// Offending module.
        module: String,
        /// Hook kind.
        kind: HookKind,
    },
    /// A hook returned a result missing required fields.
    #[error("'{module}' {kind} hook returned an invalid result: {reason}")]
    InvalidReturn {
        /// Offending module.
        module: String,
        /// Hook kind.
        kind: HookKind,
        /// What was wrong.
        reason: String,
    },
    /// The terminal resolver could not resolve the specifier.
    #[error("cannot find module '{specifier}'")]
    NotFound {
        /// Specifier that failed.
        specifier: String,
    },
    /// The terminal loader could not load the URL.
    #[error("cannot load '{url}': {reason}")]
    LoadFailed {
        /// URL that failed.
        url: String,
        /// Cause.
        reason: String,
    },
    /// `next` was called on the terminal link.
    #[error("the default {kind} hook has no next hook")]
    ChainExhausted {
        /// Hook kind.
        kind: HookKind,
    },
    /// Hook code asked the process to exit; no response follows.
    #[error("process exit requested by hook code")]
    ExitRequested,
}

impl HookError {
    /// A rejection carrying `value`.
    pub fn thrown(value: ThrownValue) -> Self {
        Self::Thrown { value }
    }
}

impl From<HookError> for AppError {
    fn from(err: HookError) -> Self {
        AppError::with_source(ErrorKind::Hook, "Hook invocation failed", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serializes_with_code_tag() {
        let err = HookError::NotFound {
            specifier: "missing".to_string(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        let back: HookError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(HookKind::GlobalPreload.to_string(), "globalPreload");
        assert_eq!(HookKind::from(InvocationKind::Load), HookKind::Load);
    }
}
