//! Node definition registry
//!
//! Maps node type names to their definition: the serializable descriptor
//! plus the executor implementing the node's behavior. The registry is
//! filled once at startup (usually from the definitions collected with
//! `inventory`), validated while filling, and then shared read-only.
//!
//! # Usage
//!
//! ```ignore
//! use flow_engine::{NodeRegistry, install_global};
//!
//! let registry = NodeRegistry::with_builtins()?;
//! let registry = install_global(registry);
//! let graph = WorkflowGraph::new("wf", "My Workflow", registry);
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::OnceCell;

use crate::context::ExecutionContext;
use crate::descriptor::NodeDescriptor;
use crate::error::{FlowError, NodeError, Result};
use crate::types::{NodeCategory, NodeConfig, NodeInputs, NodeOutputs, SocketDefinition, SocketDirection};

/// Behavior of one node type
///
/// Executors receive owned inputs and config so they can run on any task;
/// they never see the graph. They must return `NodeError::Cancelled` (or
/// simply stop) once `ctx.cancellation()` fires, aborting any request they
/// own.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn execute(
        &self,
        inputs: NodeInputs,
        config: NodeConfig,
        ctx: &ExecutionContext,
    ) -> std::result::Result<NodeOutputs, NodeError>;
}

type BoxedExecution =
    Pin<Box<dyn Future<Output = std::result::Result<NodeOutputs, NodeError>> + Send>>;

/// Async callback-based executor
///
/// Wraps a plain function or closure so simple node types do not need a
/// dedicated struct.
pub struct CallbackExecutor {
    callback: Box<dyn Fn(NodeInputs, NodeConfig, ExecutionContext) -> BoxedExecution + Send + Sync>,
}

impl CallbackExecutor {
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn(NodeInputs, NodeConfig, ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<NodeOutputs, NodeError>> + Send + 'static,
    {
        Self {
            callback: Box::new(move |inputs, config, ctx| Box::pin(callback(inputs, config, ctx))),
        }
    }
}

#[async_trait]
impl NodeExecutor for CallbackExecutor {
    async fn execute(
        &self,
        inputs: NodeInputs,
        config: NodeConfig,
        ctx: &ExecutionContext,
    ) -> std::result::Result<NodeOutputs, NodeError> {
        (self.callback)(inputs, config, ctx.clone()).await
    }
}

/// Synchronous callback-based executor for pure node types
pub struct SyncCallbackExecutor {
    callback: Box<
        dyn Fn(&NodeInputs, &NodeConfig) -> std::result::Result<NodeOutputs, NodeError> + Send + Sync,
    >,
}

impl SyncCallbackExecutor {
    pub fn new(
        callback: impl Fn(&NodeInputs, &NodeConfig) -> std::result::Result<NodeOutputs, NodeError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }
}

#[async_trait]
impl NodeExecutor for SyncCallbackExecutor {
    async fn execute(
        &self,
        inputs: NodeInputs,
        config: NodeConfig,
        _ctx: &ExecutionContext,
    ) -> std::result::Result<NodeOutputs, NodeError> {
        (self.callback)(&inputs, &config)
    }
}

/// A registered node type: metadata plus behavior
#[derive(Clone)]
pub struct NodeDefinition {
    descriptor: NodeDescriptor,
    executor: Arc<dyn NodeExecutor>,
}

impl NodeDefinition {
    pub fn new(descriptor: NodeDescriptor, executor: Arc<dyn NodeExecutor>) -> Self {
        Self {
            descriptor,
            executor,
        }
    }

    /// Definition whose executor is an async closure
    pub fn from_fn<F, Fut>(descriptor: NodeDescriptor, callback: F) -> Self
    where
        F: Fn(NodeInputs, NodeConfig, ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<NodeOutputs, NodeError>> + Send + 'static,
    {
        Self::new(descriptor, Arc::new(CallbackExecutor::new(callback)))
    }

    pub fn node_type(&self) -> &str {
        &self.descriptor.node_type
    }

    pub fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    pub fn inputs(&self) -> &[SocketDefinition] {
        &self.descriptor.inputs
    }

    pub fn outputs(&self) -> &[SocketDefinition] {
        &self.descriptor.outputs
    }

    pub fn socket(&self, direction: SocketDirection, id: &str) -> Option<&SocketDefinition> {
        self.descriptor.socket(direction, id)
    }

    pub fn default_config(&self) -> &NodeConfig {
        &self.descriptor.default_config
    }

    pub fn executor(&self) -> &Arc<dyn NodeExecutor> {
        &self.executor
    }
}

impl std::fmt::Debug for NodeDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDefinition")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Constructor for a built-in definition, submitted with `inventory::submit!`
pub struct DefinitionFn(pub fn() -> NodeDefinition);

inventory::collect!(DefinitionFn);

/// Registry of node types keyed by type name
#[derive(Debug, Default)]
pub struct NodeRegistry {
    entries: HashMap<String, NodeDefinition>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every definition submitted through `inventory`
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();
        for DefinitionFn(build) in inventory::iter::<DefinitionFn> {
            registry.register(build())?;
        }
        log::info!("Registered {} built-in node types", registry.len());
        Ok(registry)
    }

    /// Register a definition under its type name.
    ///
    /// Duplicate type names and repeated socket ids are startup invariant
    /// violations and are rejected.
    pub fn register(&mut self, definition: NodeDefinition) -> Result<()> {
        let node_type = definition.node_type().to_string();
        if self.entries.contains_key(&node_type) {
            return Err(FlowError::DuplicateNodeType(node_type));
        }
        for direction in [SocketDirection::Input, SocketDirection::Output] {
            if let Some(socket_id) = definition.descriptor().duplicate_socket(direction) {
                return Err(FlowError::DuplicateSocket {
                    node_type,
                    direction,
                    socket_id: socket_id.to_string(),
                });
            }
        }
        log::debug!("Registered node type '{}'", node_type);
        self.entries.insert(node_type, definition);
        Ok(())
    }

    /// Get the definition for a node type
    pub fn get(&self, node_type: &str) -> Option<&NodeDefinition> {
        self.entries.get(node_type)
    }

    /// Check if a node type is registered
    pub fn has_node_type(&self, node_type: &str) -> bool {
        self.entries.contains_key(node_type)
    }

    /// List all registered node type strings, sorted
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.entries.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }

    /// Get definitions grouped by category
    pub fn definitions_by_category(&self) -> HashMap<NodeCategory, Vec<&NodeDefinition>> {
        let mut grouped: HashMap<NodeCategory, Vec<&NodeDefinition>> = HashMap::new();
        for definition in self.entries.values() {
            grouped
                .entry(definition.descriptor().category)
                .or_default()
                .push(definition);
        }
        grouped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

static GLOBAL_REGISTRY: OnceCell<Arc<NodeRegistry>> = OnceCell::new();

/// Install the process-wide registry.
///
/// The first installed registry wins; later calls log a warning and return
/// the registry already in place.
pub fn install_global(registry: NodeRegistry) -> Arc<NodeRegistry> {
    let mut installed = false;
    let global = GLOBAL_REGISTRY.get_or_init(|| {
        installed = true;
        Arc::new(registry)
    });
    if !installed {
        log::warn!("Global node registry already installed; ignoring replacement");
    }
    global.clone()
}

/// The process-wide registry, if one has been installed
pub fn global() -> Option<Arc<NodeRegistry>> {
    GLOBAL_REGISTRY.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SocketType;

    fn echo_definition(node_type: &str) -> NodeDefinition {
        NodeDefinition::from_fn(
            NodeDescriptor::new(node_type, NodeCategory::Processing, format!("Test {}", node_type))
                .input(SocketDefinition::optional("value", "Value", SocketType::Any))
                .output(SocketDefinition::optional("value", "Value", SocketType::Any)),
            |inputs, _config, _ctx| async move { Ok::<_, NodeError>(inputs) },
        )
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = NodeRegistry::new();
        registry.register(echo_definition("echo")).unwrap();

        assert!(registry.has_node_type("echo"));
        assert!(!registry.has_node_type("unknown"));
        assert_eq!(registry.get("echo").unwrap().descriptor().label, "Test echo");
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let mut registry = NodeRegistry::new();
        registry.register(echo_definition("echo")).unwrap();

        let err = registry.register(echo_definition("echo")).unwrap_err();
        assert!(matches!(err, FlowError::DuplicateNodeType(ref t) if t == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_socket_rejected() {
        let descriptor = NodeDescriptor::new("bad", NodeCategory::Processing, "Bad")
            .output(SocketDefinition::optional("out", "Out", SocketType::Text))
            .output(SocketDefinition::optional("out", "Out", SocketType::Image));
        let definition = NodeDefinition::new(
            descriptor,
            Arc::new(SyncCallbackExecutor::new(|_, _| Ok(NodeOutputs::new()))),
        );

        let mut registry = NodeRegistry::new();
        let err = registry.register(definition).unwrap_err();
        assert!(matches!(
            err,
            FlowError::DuplicateSocket {
                direction: SocketDirection::Output,
                ..
            }
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_node_types_sorted() {
        let mut registry = NodeRegistry::new();
        registry.register(echo_definition("b")).unwrap();
        registry.register(echo_definition("a")).unwrap();
        assert_eq!(registry.node_types(), vec!["a", "b"]);

        let grouped = registry.definitions_by_category();
        assert_eq!(grouped.get(&NodeCategory::Processing).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_callback_executor() {
        let definition = echo_definition("echo");
        let mut inputs = NodeInputs::new();
        inputs.insert("value".to_string(), serde_json::json!("hello"));

        let outputs = definition
            .executor()
            .execute(inputs, NodeConfig::new(), &ExecutionContext::new())
            .await
            .unwrap();
        assert_eq!(outputs.get("value").unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_sync_callback_executor_reads_config() {
        let executor = SyncCallbackExecutor::new(|_inputs, config| {
            let mut outputs = NodeOutputs::new();
            outputs.insert("text".to_string(), config.get("text").cloned().unwrap_or_default());
            Ok(outputs)
        });

        let mut config = NodeConfig::new();
        config.insert("text".to_string(), serde_json::json!("from config"));
        let outputs = executor
            .execute(NodeInputs::new(), config, &ExecutionContext::new())
            .await
            .unwrap();
        assert_eq!(outputs.get("text").unwrap(), "from config");
    }
}
