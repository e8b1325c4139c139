//! Terminal default hooks.
//!
//! These are the last link of every chain. They implement a minimal
//! resolution and loading scheme: `node:` builtins, absolute URLs,
//! relative specifiers joined against the parent URL, `data:` URLs, and
//! `file:` URLs read from disk. Package lookup is not supported.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::percent_decode_str;
use tracing::debug;
use url::Url;

use hookbridge_core::types::{InvocationResult, LoadArgs, ResolveArgs, SourceBytes};

use crate::hooks::chain::{Hook, Next};
use crate::hooks::definitions::{HookError, HookResult};

/// Builtin module names resolvable without the `node:` prefix.
const BUILTINS: &[&str] = &[
    "assert", "buffer", "child_process", "crypto", "events", "fs", "fs/promises", "module",
    "os", "path", "process", "stream", "timers", "url", "util", "worker_threads",
];

/// Default `resolve`.
#[derive(Debug, Default)]
pub struct DefaultResolve;

impl DefaultResolve {
    /// Creates the default resolver.
    pub fn new() -> Self {
        Self
    }

    fn resolve(&self, args: &ResolveArgs) -> HookResult {
        let specifier = args.specifier.as_str();

        if specifier.starts_with("node:") {
            return Ok(InvocationResult::resolved(specifier).with_format("builtin"));
        }
        if BUILTINS.contains(&specifier) {
            return Ok(InvocationResult::resolved(format!("node:{specifier}")).with_format("builtin"));
        }

        let url = if is_relative(specifier) {
            let parent = args
                .context
                .parent_url
                .as_deref()
                .and_then(|parent| Url::parse(parent).ok())
                .ok_or_else(|| not_found(specifier))?;
            parent.join(specifier).map_err(|_| not_found(specifier))?
        } else {
            Url::parse(specifier).map_err(|_| not_found(specifier))?
        };

        let mut result = InvocationResult::resolved(url.as_str());
        result.format = format_of_url(&url);
        debug!(specifier, url = %url, "Resolved by default hook");
        Ok(result)
    }
}

#[async_trait]
impl Hook<ResolveArgs> for DefaultResolve {
    async fn call(&self, args: ResolveArgs, _next: Next<ResolveArgs>) -> HookResult {
        self.resolve(&args)
    }
}

/// Default `load`.
#[derive(Debug, Default)]
pub struct DefaultLoad;

impl DefaultLoad {
    /// Creates the default loader.
    pub fn new() -> Self {
        Self
    }

    async fn load(&self, args: &LoadArgs) -> HookResult {
        let url = Url::parse(&args.url).map_err(|e| load_failed(&args.url, e))?;

        let (source, inferred) = match url.scheme() {
            "node" => return Ok(InvocationResult::loaded("builtin", None)),
            "data" => {
                let (mime, bytes) = decode_data_url(&args.url)?;
                (bytes, format_of_mime(&mime))
            }
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| load_failed(&args.url, "not a local path"))?;
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| load_failed(&args.url, e))?;
                (bytes, format_of_url(&url))
            }
            scheme => {
                return Err(load_failed(
                    &args.url,
                    format!("unsupported URL scheme '{scheme}'"),
                ));
            }
        };

        let format = args
            .context
            .format
            .clone()
            .or(inferred)
            .ok_or_else(|| load_failed(&args.url, "unknown module format"))?;

        debug!(url = %args.url, format = %format, bytes = source.len(), "Loaded by default hook");
        Ok(InvocationResult::loaded(format, Some(SourceBytes(source))))
    }
}

#[async_trait]
impl Hook<LoadArgs> for DefaultLoad {
    async fn call(&self, args: LoadArgs, _next: Next<LoadArgs>) -> HookResult {
        self.load(&args).await
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
}

fn not_found(specifier: &str) -> HookError {
    HookError::NotFound {
        specifier: specifier.to_string(),
    }
}

fn load_failed(url: &str, reason: impl ToString) -> HookError {
    HookError::LoadFailed {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

/// Splits `data:[<mime>][;base64],<payload>` into its MIME type and bytes.
fn decode_data_url(raw: &str) -> Result<(String, Vec<u8>), HookError> {
    let body = raw
        .strip_prefix("data:")
        .ok_or_else(|| load_failed(raw, "not a data URL"))?;
    let (meta, payload) = body
        .split_once(',')
        .ok_or_else(|| load_failed(raw, "missing ',' in data URL"))?;

    let (mime, base64) = match meta.strip_suffix(";base64") {
        Some(mime) => (mime, true),
        None => (meta, false),
    };
    let mime = mime.split(';').next().unwrap_or_default().to_ascii_lowercase();

    let decoded: Vec<u8> = percent_decode_str(payload).collect();
    let bytes = if base64 {
        STANDARD
            .decode(&decoded)
            .map_err(|e| load_failed(raw, e))?
    } else {
        decoded
    };
    Ok((mime, bytes))
}

fn format_of_mime(mime: &str) -> Option<String> {
    let format = match mime {
        "text/javascript" | "application/javascript" => "module",
        "application/json" => "json",
        "application/wasm" => "wasm",
        _ => return None,
    };
    Some(format.to_string())
}

fn format_of_url(url: &Url) -> Option<String> {
    if url.scheme() == "data" {
        let mime = url.path().split([',', ';']).next().unwrap_or_default();
        return format_of_mime(&mime.to_ascii_lowercase());
    }
    let extension = url.path().rsplit_once('.').map(|(_, ext)| ext)?;
    let format = match extension {
        "mjs" => "module",
        "cjs" | "js" => "commonjs",
        "json" => "json",
        "wasm" => "wasm",
        _ => return None,
    };
    Some(format.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use hookbridge_core::types::{LoadContext, ResolveContext};

    use crate::hooks::chain::Chain;
    use crate::hooks::definitions::HookKind;

    fn accept(_: &InvocationResult) -> Result<(), String> {
        Ok(())
    }

    async fn resolve(specifier: &str, parent: Option<&str>) -> HookResult {
        let context = match parent {
            Some(parent) => ResolveContext::with_parent(parent),
            None => ResolveContext::default(),
        };
        let chain = Arc::new(Chain::new(
            HookKind::Resolve,
            Vec::new(),
            Arc::new(DefaultResolve::new()),
            accept,
        ));
        chain.run(ResolveArgs::new(specifier, context)).await
    }

    async fn load(url: &str) -> HookResult {
        let chain = Arc::new(Chain::new(
            HookKind::Load,
            Vec::new(),
            Arc::new(DefaultLoad::new()),
            accept,
        ));
        chain.run(LoadArgs::new(url, LoadContext::default())).await
    }

    #[tokio::test]
    async fn test_resolve_builtins() {
        let result = resolve("fs", None).await.unwrap();
        assert_eq!(result.url.as_deref(), Some("node:fs"));
        assert_eq!(result.format.as_deref(), Some("builtin"));

        let result = resolve("node:path", None).await.unwrap();
        assert_eq!(result.url.as_deref(), Some("node:path"));
    }

    #[tokio::test]
    async fn test_resolve_relative_against_parent() {
        let result = resolve("./experimental.json", Some("file:///app/json-modules.mjs"))
            .await
            .unwrap();
        assert_eq!(result.url.as_deref(), Some("file:///app/experimental.json"));
        assert_eq!(result.format.as_deref(), Some("json"));
    }

    #[tokio::test]
    async fn test_resolve_relative_without_parent_fails() {
        let err = resolve("./x.mjs", None).await.unwrap_err();
        assert_eq!(
            err,
            HookError::NotFound {
                specifier: "./x.mjs".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_resolve_bare_package_is_not_found() {
        assert!(matches!(
            resolve("left-pad", None).await,
            Err(HookError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_data_url_infers_format() {
        let result = resolve("data:text/javascript,export default 1", None)
            .await
            .unwrap();
        assert_eq!(result.format.as_deref(), Some("module"));
    }

    #[tokio::test]
    async fn test_load_percent_encoded_data_url() {
        let result = load("data:text/javascript,import.meta.resolve(%22exit:%22)")
            .await
            .unwrap();
        assert_eq!(result.format.as_deref(), Some("module"));
        assert_eq!(
            result.source.unwrap().as_bytes(),
            br#"import.meta.resolve("exit:")"#
        );
    }

    #[tokio::test]
    async fn test_load_base64_data_url() {
        let result = load("data:application/json;base64,eyJhIjoxfQ==").await.unwrap();
        assert_eq!(result.format.as_deref(), Some("json"));
        assert_eq!(result.source.unwrap().as_bytes(), br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_load_empty_data_url() {
        let result = load("data:text/javascript,").await.unwrap();
        assert!(result.source.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_builtin_has_no_source() {
        let result = load("node:fs").await.unwrap();
        assert_eq!(result.format.as_deref(), Some("builtin"));
        assert!(result.source.is_none());
    }

    #[tokio::test]
    async fn test_load_file_url() {
        let mut file = tempfile::Builder::new().suffix(".mjs").tempfile().unwrap();
        file.write_all(b"export {};\n").unwrap();
        let url = Url::from_file_path(file.path()).unwrap();

        let result = load(url.as_str()).await.unwrap();
        assert_eq!(result.format.as_deref(), Some("module"));
        assert_eq!(result.source.unwrap().as_bytes(), b"export {};\n");
    }

    #[tokio::test]
    async fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::from_file_path(dir.path().join("absent.mjs")).unwrap();
        assert!(matches!(
            load(url.as_str()).await,
            Err(HookError::LoadFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_unknown_scheme_fails() {
        assert!(matches!(
            load("exit:").await,
            Err(HookError::LoadFailed { .. })
        ));
    }
}
