//! The opaque value an uncaught throw carries across the bridge.

use std::any::Any;

use serde::{Deserialize, Serialize};

/// A thrown value of any runtime type.
///
/// Hook code and application code may throw anything, not only errors;
/// this enum captures enough of each kind for the formatter to render it
/// exactly. Object properties keep insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThrownValue {
    /// An error object.
    Error {
        /// Standard name, e.g. `Error`, `TypeError`.
        name: String,
        /// Error message.
        message: String,
        /// Stack text, which starts with `name: message` when present.
        #[serde(default)]
        stack: Option<String>,
    },
    /// `null`.
    Null,
    /// `undefined`.
    Undefined,
    /// A boolean.
    Boolean {
        /// The value.
        value: bool,
    },
    /// A double-precision number.
    Number {
        /// The value, carried as raw bits so NaN and infinities survive.
        #[serde(with = "number_bits")]
        value: f64,
    },
    /// An arbitrary-precision integer, as decimal digits.
    BigInt {
        /// Decimal digits with an optional leading `-`.
        digits: String,
    },
    /// A string.
    String {
        /// The value.
        value: String,
    },
    /// A plain object.
    Object {
        /// Own enumerable properties in insertion order.
        properties: Vec<(String, ThrownValue)>,
    },
    /// A function.
    Function {
        /// Function name, absent for anonymous functions.
        name: Option<String>,
    },
    /// A symbol.
    Symbol {
        /// Symbol description.
        description: Option<String>,
    },
}

impl ThrownValue {
    /// An error with the given name and message and no stack.
    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    /// A plain `Error` carrying `message`, with a single-frame stack at `location`.
    pub fn error_at(message: impl Into<String>, location: &str) -> Self {
        let message = message.into();
        Self::Error {
            stack: Some(format!("Error: {message}\n    at {location}")),
            name: "Error".to_string(),
            message,
        }
    }

    /// A boolean.
    pub fn boolean(value: bool) -> Self {
        Self::Boolean { value }
    }

    /// A number.
    pub fn number(value: f64) -> Self {
        Self::Number { value }
    }

    /// A bigint.
    pub fn bigint(value: i128) -> Self {
        Self::BigInt {
            digits: value.to_string(),
        }
    }

    /// A string.
    pub fn string(value: impl Into<String>) -> Self {
        Self::String {
            value: value.into(),
        }
    }

    /// A plain object from `(key, value)` pairs in insertion order.
    pub fn object<K: Into<String>>(properties: impl IntoIterator<Item = (K, ThrownValue)>) -> Self {
        Self::Object {
            properties: properties
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        }
    }

    /// A named function.
    pub fn function(name: impl Into<String>) -> Self {
        Self::Function {
            name: Some(name.into()),
        }
    }

    /// An anonymous function.
    pub fn anonymous_function() -> Self {
        Self::Function { name: None }
    }

    /// A symbol with a description.
    pub fn symbol(description: impl Into<String>) -> Self {
        Self::Symbol {
            description: Some(description.into()),
        }
    }

    /// Converts a panic payload into an `Error` value.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "panic with a non-string payload".to_string()
        };
        Self::error("Error", message)
    }

    /// Short name of the value's kind, for logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Error { .. } => "error",
            Self::Null => "null",
            Self::Undefined => "undefined",
            Self::Boolean { .. } => "boolean",
            Self::Number { .. } => "number",
            Self::BigInt { .. } => "bigint",
            Self::String { .. } => "string",
            Self::Object { .. } => "object",
            Self::Function { .. } => "function",
            Self::Symbol { .. } => "symbol",
        }
    }
}

mod number_bits {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.to_bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        u64::deserialize(deserializer).map(f64::from_bits)
    }
}
