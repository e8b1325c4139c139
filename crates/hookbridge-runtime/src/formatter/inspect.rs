//! Inspected forms of values.

use hookbridge_core::types::ThrownValue;

/// Depth past which nested objects collapse to `[Object]`.
pub const DEFAULT_DEPTH: usize = 2;

/// Renders a value the way a developer console shows it.
pub trait Inspect: Send + Sync {
    /// The inspected form of `value`.
    fn inspect(&self, value: &ThrownValue) -> String;
}

/// Single-line inspector.
#[derive(Debug, Clone)]
pub struct CompactInspector {
    depth: usize,
}

impl CompactInspector {
    /// An inspector expanding objects up to `depth` levels below the root.
    pub fn new(depth: usize) -> Self {
        Self { depth }
    }

    fn write(&self, value: &ThrownValue, level: usize, out: &mut String) {
        match value {
            ThrownValue::Null => out.push_str("null"),
            ThrownValue::Undefined => out.push_str("undefined"),
            ThrownValue::Boolean { value } => out.push_str(if *value { "true" } else { "false" }),
            ThrownValue::Number { value } => {
                if *value == 0.0 && value.is_sign_negative() {
                    out.push_str("-0");
                } else {
                    out.push_str(&js_number(*value));
                }
            }
            ThrownValue::BigInt { digits } => {
                out.push_str(digits);
                out.push('n');
            }
            ThrownValue::String { value } => out.push_str(&quote(value)),
            ThrownValue::Function { name } => out.push_str(&function_tag(name.as_deref())),
            ThrownValue::Symbol { description } => {
                out.push_str("Symbol(");
                out.push_str(description.as_deref().unwrap_or_default());
                out.push(')');
            }
            ThrownValue::Error { name, message, .. } => {
                out.push('[');
                out.push_str(name);
                if !message.is_empty() {
                    out.push_str(": ");
                    out.push_str(message);
                }
                out.push(']');
            }
            ThrownValue::Object { properties } => {
                if properties.is_empty() {
                    out.push_str("{}");
                } else if level > self.depth {
                    out.push_str("[Object]");
                } else {
                    out.push_str("{ ");
                    for (i, (key, value)) in properties.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        out.push_str(&property_key(key));
                        out.push_str(": ");
                        self.write(value, level + 1, out);
                    }
                    out.push_str(" }");
                }
            }
        }
    }
}

impl Default for CompactInspector {
    fn default() -> Self {
        Self::new(DEFAULT_DEPTH)
    }
}

impl Inspect for CompactInspector {
    fn inspect(&self, value: &ThrownValue) -> String {
        let mut out = String::new();
        self.write(value, 0, &mut out);
        out
    }
}

/// `[Function: name]`, or `[Function (anonymous)]` without a name.
pub fn function_tag(name: Option<&str>) -> String {
    match name {
        Some(name) if !name.is_empty() => format!("[Function: {name}]"),
        _ => "[Function (anonymous)]".to_string(),
    }
}

/// The canonical text of a number.
///
/// Integers print without a fraction, magnitudes of `1e21` and above or
/// below `1e-6` switch to exponent form, and both zeros print as `0`.
pub fn js_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let sign = if value < 0.0 { "-" } else { "" };
    // Shortest round-trip digits, e.g. "1.2345e-7".
    let scientific = format!("{:e}", value.abs());
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let exponent: i32 = exponent.parse().unwrap_or(0);

    let k = digits.len() as i32;
    let n = exponent + 1;

    let body = if k <= n && n <= 21 {
        format!("{digits}{}", "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        let (int, frac) = digits.split_at(n as usize);
        format!("{int}.{frac}")
    } else if -6 < n && n <= 0 {
        format!("0.{}{digits}", "0".repeat((-n) as usize))
    } else {
        let exp_sign = if n - 1 < 0 { '-' } else { '+' };
        let exp = (n - 1).abs();
        if k == 1 {
            format!("{digits}e{exp_sign}{exp}")
        } else {
            let (first, rest) = digits.split_at(1);
            format!("{first}.{rest}e{exp_sign}{exp}")
        }
    };
    format!("{sign}{body}")
}

fn quote(value: &str) -> String {
    let delimiter = if !value.contains('\'') {
        '\''
    } else if !value.contains('"') {
        '"'
    } else if !value.contains('`') {
        '`'
    } else {
        '\''
    };

    let mut out = String::with_capacity(value.len() + 2);
    out.push(delimiter);
    for c in value.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}

fn property_key(key: &str) -> String {
    let mut chars = key.chars();
    let identifier = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if identifier {
        key.to_string()
    } else {
        quote(key)
    }
}
