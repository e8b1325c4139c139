//! The entry point evaluated in the main context.

use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;

use hookbridge_core::types::ThrownValue;

use crate::scope::MainScope;

/// How the entry is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A module with top-level await: its evaluation is a blocking point,
    /// so a hook that never answers it ends the process with code 13.
    Module,
    /// A script: work it starts without awaiting does not block exit.
    Script,
}

type EntryBody = Box<dyn FnOnce(MainScope) -> BoxFuture<'static, Result<(), ThrownValue>> + Send>;

/// Application code run once the hooks are installed.
pub struct Entry {
    name: String,
    kind: EntryKind,
    url: Option<String>,
    body: EntryBody,
}

impl Entry {
    /// An entry evaluated as a module.
    pub fn module<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(MainScope) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ThrownValue>> + Send + 'static,
    {
        Self::new(name, EntryKind::Module, body)
    }

    /// An entry evaluated as a script.
    pub fn script<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(MainScope) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ThrownValue>> + Send + 'static,
    {
        Self::new(name, EntryKind::Script, body)
    }

    fn new<F, Fut>(name: impl Into<String>, kind: EntryKind, body: F) -> Self
    where
        F: FnOnce(MainScope) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ThrownValue>> + Send + 'static,
    {
        Self {
            name: name.into(),
            kind,
            url: None,
            body: Box::new(move |scope| Box::pin(body(scope))),
        }
    }

    /// Sets the URL relative imports of the entry resolve against.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Name printed above an uncaught value.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluation kind.
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub(crate) fn into_parts(self) -> (String, EntryKind, Option<String>, EntryBody) {
        (self.name, self.kind, self.url, self.body)
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("url", &self.url)
            .finish()
    }
}
