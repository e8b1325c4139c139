//! Invocation payloads exchanged between the main and hook contexts.
//!
//! Every type here is plain data: it is serialized into a frame on one
//! side of the bridge and rebuilt on the other, never shared.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The kind of a bridged invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationKind {
    /// Specifier → URL resolution.
    Resolve,
    /// URL → format + source loading.
    Load,
}

impl InvocationKind {
    /// Returns the string name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Load => "load",
        }
    }
}

impl fmt::Display for InvocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Context passed to resolve hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveContext {
    /// Export conditions in effect for this resolution.
    #[serde(default)]
    pub conditions: Vec<String>,
    /// Import attributes attached to the import statement.
    #[serde(default)]
    pub import_attributes: BTreeMap<String, String>,
    /// URL of the importing module, absent for the entry point.
    #[serde(default)]
    pub parent_url: Option<String>,
}

impl ResolveContext {
    /// Context for a specifier imported by `parent_url`.
    pub fn with_parent(parent_url: impl Into<String>) -> Self {
        Self {
            parent_url: Some(parent_url.into()),
            ..Self::default()
        }
    }
}

/// Context passed to load hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadContext {
    /// Export conditions in effect for this load.
    #[serde(default)]
    pub conditions: Vec<String>,
    /// Format hint produced by the resolve step.
    #[serde(default)]
    pub format: Option<String>,
    /// Import attributes attached to the import statement.
    #[serde(default)]
    pub import_attributes: BTreeMap<String, String>,
}

/// Arguments of a resolve invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveArgs {
    /// The specifier as written by the importer.
    pub specifier: String,
    /// Resolution context.
    pub context: ResolveContext,
}

impl ResolveArgs {
    /// Creates resolve arguments.
    pub fn new(specifier: impl Into<String>, context: ResolveContext) -> Self {
        Self {
            specifier: specifier.into(),
            context,
        }
    }
}

/// Arguments of a load invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadArgs {
    /// The resolved module URL.
    pub url: String,
    /// Load context.
    pub context: LoadContext,
}

impl LoadArgs {
    /// Creates load arguments.
    pub fn new(url: impl Into<String>, context: LoadContext) -> Self {
        Self {
            url: url.into(),
            context,
        }
    }
}

/// Arguments of either invocation kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationArgs {
    /// A resolve call.
    Resolve(ResolveArgs),
    /// A load call.
    Load(LoadArgs),
}

impl InvocationArgs {
    /// The invocation kind of these arguments.
    pub fn kind(&self) -> InvocationKind {
        match self {
            Self::Resolve(_) => InvocationKind::Resolve,
            Self::Load(_) => InvocationKind::Load,
        }
    }

    /// The specifier (resolve) or URL (load) being processed.
    pub fn target(&self) -> &str {
        match self {
            Self::Resolve(args) => &args.specifier,
            Self::Load(args) => &args.url,
        }
    }
}

/// Module source bytes, transported byte-exact.
///
/// Serializes as `{"type":"Buffer","data":[..]}` so the receiving side (and
/// any trace line) sees the literal byte array rather than decoded text.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SourceBytes(pub Vec<u8>);

impl SourceBytes {
    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the source is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume into the raw bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for SourceBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceBytes({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for SourceBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for SourceBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for SourceBytes {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

#[derive(Serialize, Deserialize)]
enum BufferTag {
    Buffer,
}

#[derive(Serialize)]
struct BufferRef<'a> {
    #[serde(rename = "type")]
    tag: BufferTag,
    data: &'a [u8],
}

#[derive(Deserialize)]
struct BufferOwned {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    tag: BufferTag,
    data: Vec<u8>,
}

impl Serialize for SourceBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        BufferRef {
            tag: BufferTag::Buffer,
            data: &self.0,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SourceBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        BufferOwned::deserialize(deserializer).map(|buffer| Self(buffer.data))
    }
}

/// Result of a resolve or load invocation.
///
/// Field order is the trace line order: `url`, `source`, `format`,
/// `shortCircuit`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    /// Resolved URL (resolve results).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Module source (load results).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceBytes>,
    /// Module format such as `module`, `commonjs`, `json`, `builtin`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Marks the result as final, halting further delegation.
    #[serde(default)]
    pub short_circuit: bool,
}

impl InvocationResult {
    /// A resolve result for `url`.
    pub fn resolved(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// A load result with `format` and optional `source`.
    pub fn loaded(format: impl Into<String>, source: Option<SourceBytes>) -> Self {
        Self {
            format: Some(format.into()),
            source,
            ..Self::default()
        }
    }

    /// Sets the format.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Marks the result as short-circuiting.
    pub fn short_circuited(mut self) -> Self {
        self.short_circuit = true;
        self
    }

    /// The single-line JSON form used by diagnostic tracing.
    pub fn trace_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
