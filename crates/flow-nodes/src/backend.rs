//! Generation backend client
//!
//! Image nodes talk to a remote generation service through the
//! [`GenerationBackend`] trait. The service is opaque: it takes a prompt and
//! a few settings and answers with either a list of image references or an
//! error payload.
//!
//! Hosts register one or more backends in a [`BackendSet`] stored in the
//! run's `ExecutorExtensions` under
//! [`extension_keys::GENERATION_BACKENDS`]; executors pick one by the
//! context's backend selector.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flow_engine::{extension_keys, ExecutionContext, NodeError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::BackendConfig;

/// Errors from talking to a generation backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Failed to reach generation backend: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid response from generation backend: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("Generation backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The service answered with an error payload
    #[error("Generation backend rejected the request: {0}")]
    Rejected(String),

    #[error("Generation backend returned no images")]
    NoImages,

    #[error("No generation backend named '{0}'")]
    UnknownBackend(String),

    #[error("No generation backend configured")]
    NotConfigured,

    #[error("Generation request cancelled")]
    Cancelled,
}

impl From<BackendError> for NodeError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Cancelled => NodeError::Cancelled,
            other => NodeError::Backend(other.to_string()),
        }
    }
}

/// What image nodes send to the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    /// Image the service should start from (URL or data URI)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Number of images to produce
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: None,
            reference_image: None,
            width: 1024,
            height: 1024,
            count: 1,
            seed: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

impl GenerationResponse {
    fn rejection(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.trim().is_empty())
    }
}

/// A service that turns a [`GenerationRequest`] into image references
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Name the backend is selected by
    fn name(&self) -> &str;

    /// Run one generation request.
    ///
    /// Implementations must stop and return [`BackendError::Cancelled`] once
    /// `cancel` fires, dropping any request they have in flight.
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, BackendError>;
}

/// Generation backend reached over HTTP
///
/// Sends `POST {base_url}/generate` with the request as JSON and expects
/// `{"images": [...]}` or `{"error": "..."}` back.
#[derive(Debug, Clone)]
pub struct HttpGenerationBackend {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpGenerationBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            name: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: &GenerationRequest) -> Result<Vec<String>, BackendError> {
        let url = format!("{}/generate", self.base_url);
        log::debug!("Backend '{}': POST {}", self.name, url);

        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Error payloads are reported as-is, anything else by status
            let parsed: GenerationResponse = serde_json::from_str(&body).unwrap_or_default();
            return Err(match parsed.rejection() {
                Some(message) => BackendError::Rejected(message.to_string()),
                None => BackendError::Status {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        let parsed: GenerationResponse = serde_json::from_str(&body)?;
        if let Some(message) = parsed.rejection() {
            return Err(BackendError::Rejected(message.to_string()));
        }
        if parsed.images.is_empty() {
            return Err(BackendError::NoImages);
        }
        Ok(parsed.images)
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, BackendError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::info!("Backend '{}': request cancelled", self.name);
                Err(BackendError::Cancelled)
            }
            result = self.send(request) => result,
        }
    }
}

/// Named generation backends with one default
#[derive(Clone, Default)]
pub struct BackendSet {
    backends: HashMap<String, Arc<dyn GenerationBackend>>,
    default: Option<String>,
}

impl BackendSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a backend under its own name. The first one added becomes the
    /// default.
    pub fn insert(&mut self, backend: Arc<dyn GenerationBackend>) {
        let name = backend.name().to_string();
        if self.backends.insert(name.clone(), backend).is_some() {
            log::warn!("Replacing generation backend '{}'", name);
        }
        if self.default.is_none() {
            self.default = Some(name);
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.insert(backend);
        self
    }

    pub fn set_default(&mut self, name: &str) -> Result<(), BackendError> {
        if !self.backends.contains_key(name) {
            return Err(BackendError::UnknownBackend(name.to_string()));
        }
        self.default = Some(name.to_string());
        Ok(())
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Registered backend names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.backends.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn GenerationBackend>> {
        self.backends.get(name).cloned()
    }

    /// Backend named by `selector`, or the default when there is none
    pub fn select(&self, selector: Option<&str>) -> Result<Arc<dyn GenerationBackend>, BackendError> {
        match selector {
            Some(name) => self
                .get(name)
                .ok_or_else(|| BackendError::UnknownBackend(name.to_string())),
            None => self
                .default
                .as_deref()
                .and_then(|name| self.get(name))
                .ok_or(BackendError::NotConfigured),
        }
    }

    /// Backend chosen by the context's selector from the set in its
    /// extensions
    pub fn from_context(ctx: &ExecutionContext) -> Result<Arc<dyn GenerationBackend>, BackendError> {
        ctx.extensions()
            .get::<BackendSet>(extension_keys::GENERATION_BACKENDS)
            .ok_or(BackendError::NotConfigured)?
            .select(ctx.backend())
    }
}

impl std::fmt::Debug for BackendSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSet")
            .field("backends", &self.names())
            .field("default", &self.default)
            .finish()
    }
}
