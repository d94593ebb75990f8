//! Per-run execution context
//!
//! An `ExecutionContext` is created for every run and handed to each
//! executor. It carries the run's cancellation signal, the selected
//! generation backend and a typed extension map through which hosts inject
//! runtime services (HTTP clients, backend pools) that cannot be serialized.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Typed map of non-serializable services made available to executors.
///
/// Values are stored under string keys and retrieved by type; a lookup
/// with the wrong type yields `None`.
#[derive(Default)]
pub struct ExecutorExtensions {
    inner: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl ExecutorExtensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value under `key`, replacing any previous value
    pub fn set<T: Send + Sync + 'static>(&mut self, key: &str, value: T) {
        self.inner.insert(key.to_string(), Box::new(value));
    }

    /// Look up a value by key and type
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<&T> {
        self.inner.get(key).and_then(|v| v.downcast_ref())
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }
}

impl std::fmt::Debug for ExecutorExtensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorExtensions")
            .field("keys", &self.inner.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Well-known extension keys.
pub mod extension_keys {
    /// Key for the generation backend pool used by image nodes.
    pub const GENERATION_BACKENDS: &str = "generation_backends";
}

/// Run-scoped context passed to every executor
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    run_id: String,
    cancellation: CancellationToken,
    backend: Option<String>,
    extensions: Arc<ExecutorExtensions>,
}

impl ExecutionContext {
    /// Create a context with a fresh run id and cancellation token
    pub fn new() -> Self {
        Self {
            run_id: format!("run-{}", uuid::Uuid::new_v4()),
            cancellation: CancellationToken::new(),
            backend: None,
            extensions: Arc::new(ExecutorExtensions::new()),
        }
    }

    /// Select which generation backend executors should use
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    /// Attach the host's extension map
    pub fn with_extensions(mut self, extensions: Arc<ExecutorExtensions>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Use an externally created cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The run's cancellation signal
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Cancel the run this context belongs to
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Name of the selected generation backend, if any
    pub fn backend(&self) -> Option<&str> {
        self.backend.as_deref()
    }

    pub fn extensions(&self) -> &ExecutorExtensions {
        &self.extensions
    }

    /// Context handed to a single executor: same run, child token.
    pub(crate) fn for_node(&self) -> Self {
        Self {
            run_id: self.run_id.clone(),
            cancellation: self.cancellation.child_token(),
            backend: self.backend.clone(),
            extensions: self.extensions.clone(),
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}
