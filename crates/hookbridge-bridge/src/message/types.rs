//! Messages exchanged across the bridge.
//!
//! Main → hook frames are [`HostMessage`]s; hook → main frames are
//! [`HookMessage`]s. Both are internally tagged with `type`.

use serde::{Deserialize, Serialize};

use hookbridge_core::types::{
    InvocationArgs, InvocationId, InvocationResult, LoadArgs, ResolveArgs, ThrownValue,
};
use hookbridge_hooks::HookError;

/// Messages sent by the main context to the hook context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    /// Run the resolve chain.
    Resolve {
        /// Correlation id.
        id: InvocationId,
        /// Invocation arguments.
        args: ResolveArgs,
    },
    /// Run the load chain.
    Load {
        /// Correlation id.
        id: InvocationId,
        /// Invocation arguments.
        args: LoadArgs,
    },
    /// Stop the hook context.
    Shutdown,
}

impl HostMessage {
    /// Wraps `args` in the request matching its kind.
    pub fn invoke(id: InvocationId, args: InvocationArgs) -> Self {
        match args {
            InvocationArgs::Resolve(args) => Self::Resolve { id, args },
            InvocationArgs::Load(args) => Self::Load { id, args },
        }
    }
}

/// Messages sent by the hook context to the main context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HookMessage {
    /// Every hook module evaluated successfully.
    Ready {
        /// Global preload sources in registration order.
        #[serde(default)]
        preload: Vec<String>,
    },
    /// A hook module's top-level body threw.
    InitFailed {
        /// Module that threw.
        module: String,
        /// The thrown value.
        error: ThrownValue,
    },
    /// Settlement of one invocation. Exactly one of `result` and `error`
    /// is present.
    Response {
        /// Correlation id.
        id: InvocationId,
        /// Fulfilled value.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<InvocationResult>,
        /// Rejection.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<HookError>,
    },
    /// A hook panicked while handling an invocation.
    Fault {
        /// Correlation id.
        id: InvocationId,
        /// The panic, as a thrown error.
        error: ThrownValue,
    },
    /// Hook code requested process exit.
    Exit {
        /// Requested exit code.
        code: i32,
    },
    /// The hook context is idle with invocations still unsettled.
    Stalled {
        /// Id of the last request the hook context had received.
        generation: InvocationId,
    },
}

impl HookMessage {
    /// A fulfilled response.
    pub fn fulfilled(id: InvocationId, result: InvocationResult) -> Self {
        Self::Response {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// A rejected response.
    pub fn rejected(id: InvocationId, error: HookError) -> Self {
        Self::Response {
            id,
            result: None,
            error: Some(error),
        }
    }
}
