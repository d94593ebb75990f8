//! Dependency-driven workflow execution
//!
//! A run brings a set of target nodes up to date:
//!
//! 1. Walk edges backward from the targets to find everything they need.
//! 2. Order that set topologically; a cycle aborts the run before any node
//!    changes status.
//! 3. Start every node whose producers have all succeeded, as a tokio task
//!    on a `JoinSet`, bounded by `EngineConfig::max_concurrent_nodes`.
//! 4. Write each result back as it arrives. A failure marks the node as
//!    `error` and skips everything downstream of it, while independent
//!    branches keep going.
//!
//! Cancellation goes through the context's `CancellationToken`: nothing new
//! is started, in-flight tasks are aborted and their nodes return to
//! `idle`. Executor failures never surface as `Err`; they are reported in
//! the returned [`RunSummary`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use tokio::task::{Id as TaskId, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::error::{NodeError, Result};
use crate::events::{EventSink, NullEventSink, RunEvent};
use crate::graph::WorkflowGraph;
use crate::plan::{ExecutionPlan, RunTarget};
use crate::summary::{NodeOutcome, RunStatus, RunSummary};
use crate::types::{NodeId, NodeOutputs, NodeStatus};

type ExecutorResult = std::result::Result<NodeOutputs, NodeError>;

/// Handle for cancelling a run from another task
#[derive(Debug, Clone)]
pub struct RunHandle {
    run_id: String,
    token: CancellationToken,
}

impl RunHandle {
    /// Handle controlling the run that will use `ctx`
    pub fn new(ctx: &ExecutionContext) -> Self {
        Self {
            run_id: ctx.run_id().to_string(),
            token: ctx.cancellation().clone(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Request cancellation of the run
    pub fn cancel(&self) {
        log::info!("Cancellation requested for run '{}'", self.run_id);
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Runs workflow graphs
pub struct WorkflowEngine {
    config: EngineConfig,
    events: Arc<dyn EventSink>,
}

impl WorkflowEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            events: Arc::new(NullEventSink),
        }
    }

    /// Report progress to `sink`
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a single node and everything it depends on
    pub async fn run_node(
        &self,
        graph: &mut WorkflowGraph,
        node_id: &str,
        ctx: ExecutionContext,
    ) -> Result<RunSummary> {
        self.run(graph, RunTarget::node(node_id), ctx).await
    }

    /// Execute `target` against `graph`.
    ///
    /// Returns `Err` only for structural problems found while planning
    /// (unknown target, cycle); the graph is untouched in that case.
    pub async fn run(
        &self,
        graph: &mut WorkflowGraph,
        target: RunTarget,
        ctx: ExecutionContext,
    ) -> Result<RunSummary> {
        let plan = ExecutionPlan::build(graph, &target)?;
        let run_id = ctx.run_id().to_string();
        log::info!(
            "Starting run '{}' on graph '{}' with {} node(s)",
            run_id,
            graph.id(),
            plan.order.len()
        );

        let mut run = Run {
            engine: self,
            graph,
            plan: &plan,
            ctx: &ctx,
            run_id: run_id.clone(),
            started_at: Utc::now(),
            remaining: plan
                .order
                .iter()
                .map(|id| (id.clone(), plan.dependencies[id].len()))
                .collect(),
            ready: VecDeque::new(),
            outcomes: HashMap::new(),
            execution_order: Vec::new(),
            tasks: JoinSet::new(),
            running: HashMap::new(),
        };
        self.emit(RunEvent::RunStarted {
            run_id,
            nodes: plan.order.clone(),
        });
        run.execute().await;
        Ok(run.finish())
    }

    fn emit(&self, event: RunEvent) {
        if let Err(e) = self.events.send(event) {
            log::warn!("Failed to deliver run event: {}", e);
        }
    }
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// What woke the scheduler up
enum Wake {
    Cancelled,
    Joined(std::result::Result<(TaskId, ExecutorResult), JoinError>),
}

/// State of one run in progress
struct Run<'a> {
    engine: &'a WorkflowEngine,
    graph: &'a mut WorkflowGraph,
    plan: &'a ExecutionPlan,
    ctx: &'a ExecutionContext,
    run_id: String,
    started_at: chrono::DateTime<Utc>,
    /// Producers each node still waits on
    remaining: HashMap<NodeId, usize>,
    ready: VecDeque<NodeId>,
    outcomes: HashMap<NodeId, NodeOutcome>,
    execution_order: Vec<NodeId>,
    tasks: JoinSet<ExecutorResult>,
    running: HashMap<TaskId, NodeId>,
}

impl Run<'_> {
    async fn execute(&mut self) {
        for node_id in &self.plan.order {
            if self.remaining[node_id] == 0 {
                self.ready.push_back(node_id.clone());
            }
        }

        let token = self.ctx.cancellation().clone();
        let limit = self.engine.config.concurrency_limit();
        let mut aborted = false;

        loop {
            if !token.is_cancelled() {
                while limit.map_or(true, |max| self.tasks.len() < max) {
                    let Some(node_id) = self.ready.pop_front() else {
                        break;
                    };
                    self.start(node_id);
                }
            }

            if self.tasks.is_empty() {
                break;
            }

            let wake = tokio::select! {
                biased;
                _ = token.cancelled(), if !aborted => Wake::Cancelled,
                joined = self.tasks.join_next_with_id() => match joined {
                    Some(joined) => Wake::Joined(joined),
                    None => break,
                },
            };

            match wake {
                Wake::Cancelled => {
                    log::info!(
                        "Run '{}' cancelled with {} node(s) in flight",
                        self.run_id,
                        self.tasks.len()
                    );
                    aborted = true;
                    self.tasks.abort_all();
                }
                Wake::Joined(Ok((task_id, result))) => {
                    let Some(node_id) = self.running.remove(&task_id) else {
                        continue;
                    };
                    if token.is_cancelled() {
                        // Late results of a cancelled run are dropped
                        self.cancel_node(node_id);
                    } else {
                        self.complete(node_id, result);
                    }
                }
                Wake::Joined(Err(join_error)) => {
                    let Some(node_id) = self.running.remove(&join_error.id()) else {
                        continue;
                    };
                    if join_error.is_cancelled() || token.is_cancelled() {
                        self.cancel_node(node_id);
                    } else {
                        let message = panic_message(join_error);
                        log::error!("Executor for node '{}' panicked: {}", node_id, message);
                        self.fail(node_id, format!("Executor panicked: {}", message));
                    }
                }
            }
        }
    }

    /// Mark a node running and spawn its executor
    fn start(&mut self, node_id: NodeId) {
        let definition = match self.graph.definition_of(&node_id) {
            Ok(definition) => definition.clone(),
            Err(e) => {
                self.fail(node_id, e.to_string());
                return;
            }
        };
        let inputs = self.graph.resolve_inputs(&node_id);
        let Some(node) = self.graph.node_mut(&node_id) else {
            return;
        };
        node.status = NodeStatus::Running;
        node.error = None;
        let config = node.config.clone();

        log::debug!("Starting node '{}' ({})", node_id, definition.node_type());
        let executor = definition.executor().clone();
        let node_ctx = self.ctx.for_node();
        let handle = self
            .tasks
            .spawn(async move { executor.execute(inputs, config, &node_ctx).await });

        self.running.insert(handle.id(), node_id.clone());
        self.execution_order.push(node_id.clone());
        self.engine.emit(RunEvent::NodeStarted {
            run_id: self.run_id.clone(),
            node_id,
        });
    }

    fn complete(&mut self, node_id: NodeId, result: ExecutorResult) {
        match result {
            Ok(outputs) => self.succeed(node_id, outputs),
            Err(error) if error.is_cancellation() => self.cancel_node(node_id),
            Err(error) => self.fail(node_id, error.to_string()),
        }
    }

    fn succeed(&mut self, node_id: NodeId, outputs: NodeOutputs) {
        if let Some(node) = self.graph.node_mut(&node_id) {
            node.output_values.extend(outputs.clone());
            node.status = NodeStatus::Success;
            node.error = None;
        }
        log::debug!("Node '{}' succeeded", node_id);

        for dependent in self.plan.dependents.get(&node_id).into_iter().flatten() {
            if let Some(count) = self.remaining.get_mut(dependent) {
                *count = count.saturating_sub(1);
                if *count == 0 && !self.outcomes.contains_key(dependent) {
                    self.ready.push_back(dependent.clone());
                }
            }
        }

        self.outcomes.insert(node_id.clone(), NodeOutcome::Succeeded);
        self.engine.emit(RunEvent::NodeCompleted {
            run_id: self.run_id.clone(),
            node_id,
            outputs,
        });
    }

    /// Record a failure and skip everything downstream of it
    fn fail(&mut self, node_id: NodeId, error: String) {
        log::warn!("Node '{}' failed: {}", node_id, error);
        if let Some(node) = self.graph.node_mut(&node_id) {
            node.status = NodeStatus::Error;
            node.error = Some(error.clone());
        }

        for dependent in self.plan.downstream_of(&node_id) {
            if self.outcomes.contains_key(&dependent) {
                continue;
            }
            self.ready.retain(|id| id != &dependent);
            // Results from an earlier run no longer follow from its inputs
            if let Some(node) = self.graph.node_mut(&dependent) {
                node.status = NodeStatus::Idle;
                node.output_values.clear();
                node.error = None;
            }
            self.outcomes.insert(
                dependent.clone(),
                NodeOutcome::Skipped {
                    failed_dependency: node_id.clone(),
                },
            );
            self.engine.emit(RunEvent::NodeSkipped {
                run_id: self.run_id.clone(),
                node_id: dependent,
                failed_dependency: node_id.clone(),
            });
        }

        self.outcomes
            .insert(node_id.clone(), NodeOutcome::Failed { error: error.clone() });
        self.engine.emit(RunEvent::NodeFailed {
            run_id: self.run_id.clone(),
            node_id,
            error,
        });
    }

    /// A running node stopped by cancellation goes back to idle
    fn cancel_node(&mut self, node_id: NodeId) {
        log::debug!("Node '{}' cancelled", node_id);
        if let Some(node) = self.graph.node_mut(&node_id) {
            node.status = NodeStatus::Idle;
        }
        self.outcomes.insert(node_id.clone(), NodeOutcome::Cancelled);
        self.engine.emit(RunEvent::NodeCancelled {
            run_id: self.run_id.clone(),
            node_id,
        });
    }

    fn finish(mut self) -> RunSummary {
        for node_id in &self.plan.order {
            self.outcomes
                .entry(node_id.clone())
                .or_insert(NodeOutcome::NotStarted);
        }

        let status = if self.ctx.is_cancelled() {
            RunStatus::Cancelled
        } else if self.outcomes.values().all(NodeOutcome::is_success) {
            RunStatus::Completed
        } else if self
            .outcomes
            .values()
            .any(|o| matches!(o, NodeOutcome::Failed { .. } | NodeOutcome::Skipped { .. }))
        {
            RunStatus::PartiallyFailed
        } else {
            // An executor gave up with `Cancelled` on its own
            RunStatus::Cancelled
        };

        log::info!("Run '{}' finished: {:?}", self.run_id, status);
        self.engine.emit(RunEvent::RunFinished {
            run_id: self.run_id.clone(),
            status,
        });

        RunSummary {
            run_id: self.run_id,
            status,
            started_at: self.started_at,
            finished_at: Utc::now(),
            outcomes: self.outcomes,
            execution_order: self.execution_order,
        }
    }
}

fn panic_message(error: JoinError) -> String {
    match error.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string()),
        Err(error) => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;

    use crate::descriptor::NodeDescriptor;
    use crate::error::FlowError;
    use crate::events::VecEventSink;
    use crate::geometry::Point;
    use crate::registry::{NodeDefinition, NodeRegistry};
    use crate::types::{NodeCategory, NodeConfig, SocketDefinition, SocketType, ValueMapExt};

    /// Shared counters and the registry of test node types:
    ///
    /// - `source`: emits its `value` config on `out`
    /// - `concat`: joins `left` and `right` with its `sep` config
    /// - `fail`: always errors
    /// - `panic`: panics
    /// - `slow`: waits on the cancellation token
    /// - `gate`: records the max number of concurrently running gates
    struct Fixture {
        registry: Arc<NodeRegistry>,
        source_runs: Arc<AtomicUsize>,
        max_gates: Arc<AtomicUsize>,
    }

    fn fixture() -> Fixture {
        let _ = env_logger::builder().is_test(true).try_init();
        let source_runs = Arc::new(AtomicUsize::new(0));
        let active_gates = Arc::new(AtomicUsize::new(0));
        let max_gates = Arc::new(AtomicUsize::new(0));
        let mut registry = NodeRegistry::new();

        let runs = source_runs.clone();
        registry
            .register(NodeDefinition::from_fn(
                NodeDescriptor::new("source", NodeCategory::Input, "Source")
                    .output(SocketDefinition::required("out", "Out", SocketType::Text))
                    .default_value("value", json!("a")),
                move |_inputs, config, _ctx| {
                    runs.fetch_add(1, Ordering::SeqCst);
                    async move {
                        let value = config.get_string("value")?.to_string();
                        Ok::<_, NodeError>(NodeOutputs::from([("out".to_string(), json!(value))]))
                    }
                },
            ))
            .unwrap();

        registry
            .register(NodeDefinition::from_fn(
                NodeDescriptor::new("concat", NodeCategory::Processing, "Concat")
                    .input(SocketDefinition::required("left", "Left", SocketType::Text))
                    .input(SocketDefinition::optional("right", "Right", SocketType::Text))
                    .output(SocketDefinition::required("out", "Out", SocketType::Text))
                    .default_value("sep", json!("+")),
                |inputs, config, _ctx| async move {
                    let left = inputs.get_string("left")?;
                    let sep = config.get_string_opt("sep").unwrap_or_default();
                    let joined = match inputs.get_string_opt("right") {
                        Some(right) => format!("{left}{sep}{right}"),
                        None => left.to_string(),
                    };
                    Ok::<_, NodeError>(NodeOutputs::from([("out".to_string(), json!(joined))]))
                },
            ))
            .unwrap();

        registry
            .register(NodeDefinition::from_fn(
                NodeDescriptor::new("fail", NodeCategory::Processing, "Fail")
                    .input(SocketDefinition::optional("in", "In", SocketType::Any))
                    .output(SocketDefinition::optional("out", "Out", SocketType::Text)),
                |_, _, _| async { Err::<NodeOutputs, _>(NodeError::failed("boom")) },
            ))
            .unwrap();

        registry
            .register(NodeDefinition::from_fn(
                NodeDescriptor::new("panic", NodeCategory::Processing, "Panic")
                    .output(SocketDefinition::optional("out", "Out", SocketType::Text)),
                |_, _, _| async {
                    if true {
                        panic!("executor exploded");
                    }
                    Ok::<_, NodeError>(NodeOutputs::new())
                },
            ))
            .unwrap();

        registry
            .register(NodeDefinition::from_fn(
                NodeDescriptor::new("slow", NodeCategory::Processing, "Slow")
                    .input(SocketDefinition::optional("in", "In", SocketType::Any))
                    .output(SocketDefinition::optional("out", "Out", SocketType::Text)),
                |_, _, ctx| async move {
                    tokio::select! {
                        _ = ctx.cancellation().cancelled() => Err(NodeError::Cancelled),
                        _ = tokio::time::sleep(Duration::from_secs(30)) => {
                            Ok(NodeOutputs::from([("out".to_string(), json!("late"))]))
                        }
                    }
                },
            ))
            .unwrap();

        let (active, max) = (active_gates.clone(), max_gates.clone());
        registry
            .register(NodeDefinition::from_fn(
                NodeDescriptor::new("gate", NodeCategory::Processing, "Gate")
                    .output(SocketDefinition::optional("out", "Out", SocketType::Text)),
                move |_, _, _| {
                    let (active, max) = (active.clone(), max.clone());
                    async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        max.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, NodeError>(NodeOutputs::new())
                    }
                },
            ))
            .unwrap();

        Fixture {
            registry: Arc::new(registry),
            source_runs,
            max_gates,
        }
    }

    fn add(graph: &mut WorkflowGraph, id: &str, node_type: &str) {
        graph
            .add_node_with_id(id, node_type, Point::default())
            .unwrap();
    }

    fn statuses(graph: &WorkflowGraph) -> Vec<NodeStatus> {
        graph.nodes().iter().map(|n| n.status).collect()
    }

    #[tokio::test]
    async fn test_diamond_runs_shared_dependency_once() {
        let fx = fixture();
        let mut graph = WorkflowGraph::new("wf", "Diamond", fx.registry.clone());
        add(&mut graph, "a", "source");
        add(&mut graph, "b", "concat");
        add(&mut graph, "c", "concat");
        add(&mut graph, "d", "concat");
        graph.add_edge("a", "out", "b", "left").unwrap();
        graph.add_edge("a", "out", "c", "left").unwrap();
        graph.add_edge("b", "out", "d", "left").unwrap();
        graph.add_edge("c", "out", "d", "right").unwrap();
        graph
            .update_config("d", NodeConfig::from([("sep".to_string(), json!("-"))]))
            .unwrap();

        let sink = Arc::new(VecEventSink::new());
        let engine = WorkflowEngine::default().with_event_sink(sink.clone());
        let summary = engine
            .run_node(&mut graph, "d", ExecutionContext::new())
            .await
            .unwrap();

        assert_eq!(fx.source_runs.load(Ordering::SeqCst), 1);
        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(summary.execution_order.first().map(String::as_str), Some("a"));
        assert_eq!(summary.execution_order.last().map(String::as_str), Some("d"));

        // b and c both saw a's output
        let d = graph.node("d").unwrap();
        assert_eq!(d.status, NodeStatus::Success);
        assert_eq!(d.output_values["out"], json!("a-a"));
        assert!(graph
            .nodes()
            .iter()
            .all(|n| n.status == NodeStatus::Success));

        let events = sink.events();
        assert!(matches!(events.first(), Some(RunEvent::RunStarted { .. })));
        assert!(matches!(
            events.last(),
            Some(RunEvent::RunFinished {
                status: RunStatus::Completed,
                ..
            })
        ));
        // Every node started only after its producers completed
        let index = |pred: &dyn Fn(&RunEvent) -> bool| events.iter().position(pred).unwrap();
        let a_done = index(&|e| matches!(e, RunEvent::NodeCompleted { node_id, .. } if node_id == "a"));
        let b_start = index(&|e| matches!(e, RunEvent::NodeStarted { node_id, .. } if node_id == "b"));
        let c_start = index(&|e| matches!(e, RunEvent::NodeStarted { node_id, .. } if node_id == "c"));
        assert!(a_done < b_start && a_done < c_start);
    }

    #[tokio::test]
    async fn test_run_target_excludes_unrelated_nodes() {
        let fx = fixture();
        let mut graph = WorkflowGraph::new("wf", "Test", fx.registry.clone());
        add(&mut graph, "a", "source");
        add(&mut graph, "b", "concat");
        add(&mut graph, "other", "source");
        graph.add_edge("a", "out", "b", "left").unwrap();

        let summary = WorkflowEngine::default()
            .run_node(&mut graph, "b", ExecutionContext::new())
            .await
            .unwrap();

        assert_eq!(summary.outcomes.len(), 2);
        assert!(summary.outcome("other").is_none());
        assert_eq!(graph.node("other").unwrap().status, NodeStatus::Idle);
    }

    #[tokio::test]
    async fn test_cycle_aborts_before_any_status_change() {
        let fx = fixture();
        let mut graph = WorkflowGraph::new("wf", "Cycle", fx.registry.clone());
        add(&mut graph, "a", "concat");
        add(&mut graph, "b", "concat");
        graph.add_edge("a", "out", "b", "left").unwrap();
        graph.add_edge("b", "out", "a", "left").unwrap();

        let sink = Arc::new(VecEventSink::new());
        let engine = WorkflowEngine::default().with_event_sink(sink.clone());
        let err = engine
            .run_node(&mut graph, "a", ExecutionContext::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::GraphCycle { .. }));
        assert_eq!(statuses(&graph), vec![NodeStatus::Idle, NodeStatus::Idle]);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_branch_isolated() {
        let fx = fixture();
        let mut graph = WorkflowGraph::new("wf", "Branches", fx.registry.clone());
        add(&mut graph, "a", "source");
        add(&mut graph, "b", "fail");
        add(&mut graph, "b2", "concat");
        add(&mut graph, "c", "concat");
        graph.add_edge("a", "out", "b", "in").unwrap();
        graph.add_edge("b", "out", "b2", "left").unwrap();
        graph.add_edge("a", "out", "c", "left").unwrap();

        let summary = WorkflowEngine::default()
            .run(
                &mut graph,
                RunTarget::Nodes(vec!["b2".into(), "c".into()]),
                ExecutionContext::new(),
            )
            .await
            .unwrap();

        assert_eq!(summary.status, RunStatus::PartiallyFailed);
        assert_eq!(summary.outcome("c"), Some(&NodeOutcome::Succeeded));
        assert_eq!(graph.node("c").unwrap().status, NodeStatus::Success);

        let b = graph.node("b").unwrap();
        assert_eq!(b.status, NodeStatus::Error);
        assert_eq!(b.error.as_deref(), Some("Execution failed: boom"));

        assert_eq!(
            summary.outcome("b2"),
            Some(&NodeOutcome::Skipped {
                failed_dependency: "b".into()
            })
        );
        assert_eq!(graph.node("b2").unwrap().status, NodeStatus::Idle);
        assert!(!summary.execution_order.contains(&"b2".to_string()));
    }

    #[tokio::test]
    async fn test_panic_is_a_node_failure() {
        let fx = fixture();
        let mut graph = WorkflowGraph::new("wf", "Panic", fx.registry.clone());
        add(&mut graph, "p", "panic");
        add(&mut graph, "ok", "source");

        let summary = WorkflowEngine::default()
            .run(&mut graph, RunTarget::All, ExecutionContext::new())
            .await
            .unwrap();

        let Some(NodeOutcome::Failed { error }) = summary.outcome("p") else {
            panic!("expected failure, got {:?}", summary.outcome("p"));
        };
        assert!(error.contains("executor exploded"));
        assert_eq!(graph.node("p").unwrap().status, NodeStatus::Error);
        assert_eq!(graph.node("ok").unwrap().status, NodeStatus::Success);
    }

    #[tokio::test]
    async fn test_cancellation_returns_running_nodes_to_idle() {
        let fx = fixture();
        let mut graph = WorkflowGraph::new("wf", "Cancel", fx.registry.clone());
        add(&mut graph, "a", "source");
        add(&mut graph, "slow", "slow");
        add(&mut graph, "after", "concat");
        graph.add_edge("a", "out", "slow", "in").unwrap();
        graph.add_edge("slow", "out", "after", "left").unwrap();

        let ctx = ExecutionContext::new();
        let handle = RunHandle::new(&ctx);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.cancel();
        });

        let summary = WorkflowEngine::default()
            .run(&mut graph, RunTarget::All, ctx)
            .await
            .unwrap();

        assert_eq!(summary.status, RunStatus::Cancelled);
        assert_eq!(summary.outcome("a"), Some(&NodeOutcome::Succeeded));
        assert_eq!(summary.outcome("slow"), Some(&NodeOutcome::Cancelled));
        assert_eq!(summary.outcome("after"), Some(&NodeOutcome::NotStarted));
        assert_eq!(graph.node("slow").unwrap().status, NodeStatus::Idle);
        assert_eq!(graph.node("after").unwrap().status, NodeStatus::Idle);
        assert!(graph.node("slow").unwrap().error.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let fx = fixture();
        let mut graph = WorkflowGraph::new("wf", "Cancel", fx.registry.clone());
        add(&mut graph, "a", "source");

        let ctx = ExecutionContext::new();
        ctx.cancel();
        let summary = WorkflowEngine::default()
            .run(&mut graph, RunTarget::All, ctx)
            .await
            .unwrap();

        assert_eq!(fx.source_runs.load(Ordering::SeqCst), 0);
        assert_eq!(summary.outcome("a"), Some(&NodeOutcome::NotStarted));
        assert_eq!(summary.status, RunStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_concurrency_limit() {
        let fx = fixture();
        let mut graph = WorkflowGraph::new("wf", "Gates", fx.registry.clone());
        for i in 0..6 {
            add(&mut graph, &format!("g{i}"), "gate");
        }

        let engine = WorkflowEngine::new(EngineConfig::default().with_max_concurrent_nodes(2));
        let summary = engine
            .run(&mut graph, RunTarget::All, ExecutionContext::new())
            .await
            .unwrap();

        assert!(summary.is_success());
        assert_eq!(summary.execution_order.len(), 6);
        assert_eq!(fx.max_gates.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_independent_nodes_run_concurrently() {
        let fx = fixture();
        let mut graph = WorkflowGraph::new("wf", "Gates", fx.registry.clone());
        for i in 0..4 {
            add(&mut graph, &format!("g{i}"), "gate");
        }

        let summary = WorkflowEngine::new(EngineConfig::default())
            .run(&mut graph, RunTarget::All, ExecutionContext::new())
            .await
            .unwrap();

        assert!(summary.is_success());
        assert_eq!(fx.max_gates.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_skipped_dependent_drops_previous_result() {
        let fx = fixture();
        let mut graph = WorkflowGraph::new("wf", "Stale", fx.registry.clone());
        add(&mut graph, "m", "source");
        add(&mut graph, "s", "concat");
        graph.add_edge("m", "out", "s", "left").unwrap();
        let engine = WorkflowEngine::default();

        engine
            .run_node(&mut graph, "s", ExecutionContext::new())
            .await
            .unwrap();
        assert_eq!(graph.node("s").unwrap().status, NodeStatus::Success);

        // A non-string value makes the source fail
        graph
            .update_config("m", NodeConfig::from([("value".to_string(), json!(1))]))
            .unwrap();
        let summary = engine
            .run_node(&mut graph, "s", ExecutionContext::new())
            .await
            .unwrap();

        assert_eq!(
            summary.outcome("s"),
            Some(&NodeOutcome::Skipped {
                failed_dependency: "m".into()
            })
        );
        let s = graph.node("s").unwrap();
        assert_eq!(s.status, NodeStatus::Idle);
        assert!(s.output_values.is_empty());
        assert_eq!(graph.node("m").unwrap().status, NodeStatus::Error);
    }

    #[tokio::test]
    async fn test_rerun_overwrites_previous_result() {
        let fx = fixture();
        let mut graph = WorkflowGraph::new("wf", "Rerun", fx.registry.clone());
        add(&mut graph, "a", "source");
        let engine = WorkflowEngine::default();

        engine
            .run_node(&mut graph, "a", ExecutionContext::new())
            .await
            .unwrap();
        graph
            .update_config("a", NodeConfig::from([("value".to_string(), json!("b"))]))
            .unwrap();
        // A config edit does not re-run anything by itself
        assert_eq!(graph.node("a").unwrap().output_values["out"], json!("a"));

        engine
            .run_node(&mut graph, "a", ExecutionContext::new())
            .await
            .unwrap();
        assert_eq!(graph.node("a").unwrap().output_values["out"], json!("b"));
        assert_eq!(fx.source_runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_target_is_an_error() {
        let fx = fixture();
        let mut graph = WorkflowGraph::new("wf", "Test", fx.registry.clone());
        let err = WorkflowEngine::default()
            .run_node(&mut graph, "ghost", ExecutionContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::NodeNotFound(_)));
    }
}
