//! Extensions setup for host applications.
//!
//! Hosts call [`setup_extensions`] at startup to put the generation backends
//! into the shared `ExecutorExtensions`, without depending on `reqwest`
//! themselves.

use std::sync::Arc;

use flow_engine::{extension_keys, ExecutorExtensions};

use crate::backend::{BackendError, BackendSet, HttpGenerationBackend};
use crate::config::BackendConfig;

/// Register an HTTP generation backend built from `config`.
///
/// The backend joins any set already present; the first backend registered
/// stays the default.
///
/// # Example
///
/// ```ignore
/// let mut extensions = flow_engine::ExecutorExtensions::new();
/// flow_nodes::setup_extensions(&mut extensions, BackendConfig::from_env())?;
/// let ctx = ExecutionContext::new().with_extensions(Arc::new(extensions));
/// ```
pub fn setup_extensions(
    extensions: &mut ExecutorExtensions,
    config: BackendConfig,
) -> Result<(), BackendError> {
    let backend = HttpGenerationBackend::new(&config)?;
    log::info!(
        "Generation backend '{}' at {} (timeout {}s)",
        config.name,
        backend.base_url(),
        config.timeout_secs
    );

    let mut set = extensions
        .get::<BackendSet>(extension_keys::GENERATION_BACKENDS)
        .cloned()
        .unwrap_or_default();
    set.insert(Arc::new(backend));
    extensions.set(extension_keys::GENERATION_BACKENDS, set);
    Ok(())
}

/// [`setup_extensions`] with the backend configured from the environment
pub fn setup_extensions_from_env(extensions: &mut ExecutorExtensions) -> Result<(), BackendError> {
    setup_extensions(extensions, BackendConfig::from_env())
}
