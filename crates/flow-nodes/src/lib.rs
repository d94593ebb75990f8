//! Flow Nodes
//!
//! Built-in node types for the Easel canvas, plus the client for the
//! remote image-generation service they call. Every node type submits its
//! definition through `inventory`, so `NodeRegistry::with_builtins()` picks
//! all of them up once this crate is linked.
//!
//! # Categories
//!
//! - **Input**: text, numbers and images provided by the user
//! - **Processing**: prompt assembly and image generation
//! - **Output**: image previews on the canvas

pub mod backend;
pub mod config;
pub mod input;
pub mod output;
pub mod processing;
pub mod setup;

pub use backend::{
    BackendError, BackendSet, GenerationBackend, GenerationRequest, HttpGenerationBackend,
};
pub use config::BackendConfig;
pub use input::*;
pub use output::*;
pub use processing::*;
pub use setup::{setup_extensions, setup_extensions_from_env};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use flow_engine::{
        extension_keys, ExecutionContext, ExecutorExtensions, NodeCategory, NodeOutcome,
        NodeRegistry, NodeStatus, RunStatus, RunTarget, WorkflowBuilder, WorkflowEngine,
    };
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::*;

    #[test]
    fn test_inventory_collects_all_builtins() {
        let registry = NodeRegistry::with_builtins().unwrap();
        assert_eq!(registry.len(), 6, "Expected 6 built-in nodes");

        for node_type in [
            "text-input",
            "number-input",
            "image-input",
            "prompt-combine",
            "image-generation",
            "image-output",
        ] {
            assert!(registry.has_node_type(node_type), "missing {}", node_type);
        }

        let by_category = registry.definitions_by_category();
        assert_eq!(by_category[&NodeCategory::Input].len(), 3);
        assert_eq!(by_category[&NodeCategory::Processing].len(), 2);
        assert_eq!(by_category[&NodeCategory::Output].len(), 1);
    }

    /// Echoes the prompt back as the image name
    struct EchoBackend;

    #[async_trait]
    impl GenerationBackend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(
            &self,
            request: &GenerationRequest,
            _cancel: &CancellationToken,
        ) -> Result<Vec<String>, BackendError> {
            if request.prompt.contains("forbidden") {
                return Err(BackendError::Rejected("prompt flagged".into()));
            }
            Ok(vec![format!(
                "https://cdn.example.com/{}.png",
                request.prompt.replace(", ", "_")
            )])
        }
    }

    fn echo_context() -> ExecutionContext {
        let mut extensions = ExecutorExtensions::new();
        extensions.set(
            extension_keys::GENERATION_BACKENDS,
            BackendSet::new().with_backend(Arc::new(EchoBackend)),
        );
        ExecutionContext::new().with_extensions(Arc::new(extensions))
    }

    fn pipeline(subject: &str) -> flow_engine::WorkflowGraph {
        let _ = env_logger::builder().is_test(true).try_init();
        let registry = Arc::new(NodeRegistry::with_builtins().unwrap());
        WorkflowBuilder::new("wf", "Portrait")
            .add_node("subject", "text-input", (0.0, 0.0))
            .with_config("text", json!(subject))
            .add_node("style", "text-input", (0.0, 150.0))
            .with_config("text", json!("ink"))
            .add_node("combine", "prompt-combine", (300.0, 0.0))
            .add_node("generate", "image-generation", (600.0, 0.0))
            .add_node("preview", "image-output", (900.0, 0.0))
            .add_node("caption", "text-input", (0.0, 300.0))
            .add_edge("subject", "text", "combine", "subject")
            .add_edge("style", "text", "combine", "style")
            .add_edge("combine", "prompt", "generate", "prompt")
            .add_edge("generate", "image", "preview", "image")
            .build(registry)
            .unwrap()
    }

    #[tokio::test]
    async fn test_prompt_to_preview_pipeline() {
        let mut graph = pipeline("fox");
        let summary = WorkflowEngine::default()
            .run(&mut graph, RunTarget::node("preview"), echo_context())
            .await
            .unwrap();

        assert_eq!(summary.status, RunStatus::Completed);
        assert!(summary.outcome("caption").is_none());

        let preview = graph.node("preview").unwrap();
        assert_eq!(preview.status, NodeStatus::Success);
        assert_eq!(
            preview.output_values["image"],
            json!("https://cdn.example.com/fox_ink.png")
        );
    }

    #[tokio::test]
    async fn test_backend_rejection_fails_branch() {
        let mut graph = pipeline("forbidden");
        let summary = WorkflowEngine::default()
            .run(&mut graph, RunTarget::All, echo_context())
            .await
            .unwrap();

        assert_eq!(summary.status, RunStatus::PartiallyFailed);
        assert!(matches!(
            summary.outcome("generate"),
            Some(NodeOutcome::Failed { error }) if error.contains("prompt flagged")
        ));
        assert!(matches!(
            summary.outcome("preview"),
            Some(NodeOutcome::Skipped { failed_dependency }) if failed_dependency == "generate"
        ));
        // The unrelated input still ran
        assert_eq!(summary.outcome("caption"), Some(&NodeOutcome::Succeeded));
        assert_eq!(graph.node("generate").unwrap().status, NodeStatus::Error);
    }
}
