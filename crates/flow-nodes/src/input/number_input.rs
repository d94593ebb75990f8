//! Number Input Node

use std::sync::Arc;

use async_trait::async_trait;
use flow_engine::{
    Describe, ExecutionContext, NodeCategory, NodeConfig, NodeDefinition, NodeDescriptor,
    NodeError, NodeExecutor, NodeInputs, NodeOutputs, SocketDefinition, SocketType, SocketValue,
};
use serde_json::json;

/// Provides a configured number, typically a seed or a strength.
///
/// Config `value` must be numeric; optional `min`/`max` clamp it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberInputNode;

impl NumberInputNode {
    pub const SOCKET_VALUE: &'static str = "value";
    pub const CONFIG_VALUE: &'static str = "value";
    pub const CONFIG_MIN: &'static str = "min";
    pub const CONFIG_MAX: &'static str = "max";

    pub fn definition() -> NodeDefinition {
        NodeDefinition::new(Self::descriptor(), Arc::new(Self))
    }

    fn bound(config: &NodeConfig, key: &str) -> Result<Option<f64>, NodeError> {
        match config.get(key) {
            None | Some(SocketValue::Null) => Ok(None),
            Some(value) => value.as_f64().map(Some).ok_or_else(|| NodeError::InvalidConfig {
                key: key.to_string(),
                message: format!("expected a number, got {}", value),
            }),
        }
    }
}

impl Describe for NumberInputNode {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new("number-input", NodeCategory::Input, "Number Input")
            .description("Provides a numeric value to the workflow")
            .output(SocketDefinition::required(Self::SOCKET_VALUE, "Value", SocketType::Number))
            .default_value(Self::CONFIG_VALUE, json!(0))
    }
}

inventory::submit!(flow_engine::DefinitionFn(NumberInputNode::definition));

#[async_trait]
impl NodeExecutor for NumberInputNode {
    async fn execute(
        &self,
        _inputs: NodeInputs,
        config: NodeConfig,
        _ctx: &ExecutionContext,
    ) -> Result<NodeOutputs, NodeError> {
        let raw = config
            .get(Self::CONFIG_VALUE)
            .cloned()
            .unwrap_or_else(|| json!(0));
        let mut value = raw.as_f64().ok_or_else(|| NodeError::InvalidConfig {
            key: Self::CONFIG_VALUE.to_string(),
            message: format!("expected a number, got {}", raw),
        })?;

        if let Some(min) = Self::bound(&config, Self::CONFIG_MIN)? {
            value = value.max(min);
        }
        if let Some(max) = Self::bound(&config, Self::CONFIG_MAX)? {
            value = value.min(max);
        }

        // Integers stay integers on the wire
        let output = if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            json!(value as i64)
        } else {
            json!(value)
        };

        let mut outputs = NodeOutputs::new();
        outputs.insert(Self::SOCKET_VALUE.to_string(), output);
        Ok(outputs)
    }
}
