use crate::order::execution_order;
use crate::registry::NodeRegistry;
use crate::step::{MockStepExecutor, StepContext, StepExecutor};
use canvascore::{
    CanvasError, EdgeId, EventBus, ExecutionEvent, ExecutionId, ExecutionStatus, NodeError, NodeId,
    WorkflowError, WorkflowGraph,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::{timeout, Duration, Instant};
use tokio_util::sync::CancellationToken;

/// What a run does after a node fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorHandling {
    #[default]
    StopWorkflow,
    ContinueOnError,
}

/// What a run does with nodes that no root can reach because of a cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CyclePolicy {
    /// Run everything reachable and report the rest as skipped
    #[default]
    Skip,
    /// Refuse to start
    Reject,
}

/// Configuration for simulated runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub step_timeout_ms: Option<u64>,
    pub on_error: ErrorHandling,
    pub on_cycle: CyclePolicy,
    pub event_buffer_size: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 300,
            max_delay_ms: 800,
            step_timeout_ms: None,
            on_error: ErrorHandling::StopWorkflow,
            on_cycle: CyclePolicy::Skip,
            event_buffer_size: 1000,
        }
    }
}

/// Outcome of one run over the canvas
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub execution_id: ExecutionId,
    /// Nodes that finished successfully, in the order they ran
    pub executed: Vec<NodeId>,
    pub failed: Vec<NodeId>,
    /// Nodes that never ran: blocked by a cycle, or left over after a stop or cancel
    pub skipped: Vec<NodeId>,
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

/// Walks a canvas graph in topological order, one node at a time,
/// writing status and outputs back into the nodes as it goes.
pub struct ExecutionSimulator {
    registry: Arc<NodeRegistry>,
    executor: Arc<dyn StepExecutor>,
    config: SimulatorConfig,
}

impl ExecutionSimulator {
    /// Simulator backed by [`MockStepExecutor`] with the configured latency
    pub fn new(registry: Arc<NodeRegistry>, config: SimulatorConfig) -> Self {
        let executor = Arc::new(MockStepExecutor::new(config.min_delay_ms, config.max_delay_ms));
        Self::with_executor(registry, executor, config)
    }

    pub fn with_executor(
        registry: Arc<NodeRegistry>,
        executor: Arc<dyn StepExecutor>,
        config: SimulatorConfig,
    ) -> Self {
        Self {
            registry,
            executor,
            config,
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Run every node reachable from a root.
    ///
    /// Root nodes receive `input`; every other node receives its direct
    /// predecessors' outputs merged into one object.
    pub async fn run(
        &self,
        graph: &mut WorkflowGraph,
        event_bus: &EventBus,
        input: serde_json::Value,
        cancellation: CancellationToken,
    ) -> Result<RunSummary, CanvasError> {
        let plan = execution_order(graph);
        if !plan.is_complete() {
            match self.config.on_cycle {
                CyclePolicy::Reject => {
                    return Err(WorkflowError::CyclicDependency(plan.blocked).into());
                }
                CyclePolicy::Skip => {
                    tracing::warn!(
                        "{} node(s) are blocked by a cycle and will not run: {:?}",
                        plan.blocked.len(),
                        plan.blocked
                    );
                }
            }
        }

        let execution_id = ExecutionId::new_v4();
        let start_time = Instant::now();

        graph.reset_execution();

        tracing::info!("Starting run {} over {} node(s)", execution_id, plan.order.len());
        event_bus.emit(ExecutionEvent::RunStarted {
            execution_id,
            queued: plan.order.clone(),
            timestamp: Utc::now(),
        });
        for node_id in &plan.order {
            set_status(graph, event_bus, execution_id, node_id, ExecutionStatus::Queued);
        }

        let mut summary = RunSummary {
            execution_id,
            executed: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            cancelled: false,
            duration_ms: 0,
        };
        self.release(graph, event_bus, execution_id, &plan.blocked, "blocked by a cycle", &mut summary);

        for (position, node_id) in plan.order.iter().enumerate() {
            if cancellation.is_cancelled() {
                summary.cancelled = true;
                self.release(graph, event_bus, execution_id, &plan.order[position..], "run cancelled", &mut summary);
                break;
            }

            match self
                .run_step(graph, event_bus, execution_id, node_id, &input, &cancellation)
                .await
            {
                Ok(()) => summary.executed.push(node_id.clone()),
                Err(error) => {
                    summary.failed.push(node_id.clone());
                    let rest = &plan.order[position + 1..];
                    if error == NodeError::Cancelled {
                        summary.cancelled = true;
                        self.release(graph, event_bus, execution_id, rest, "run cancelled", &mut summary);
                        break;
                    }
                    if self.config.on_error == ErrorHandling::StopWorkflow {
                        self.release(graph, event_bus, execution_id, rest, "run stopped after a failure", &mut summary);
                        break;
                    }
                }
            }
        }

        summary.duration_ms = start_time.elapsed().as_millis() as u64;
        event_bus.emit(ExecutionEvent::RunCompleted {
            execution_id,
            success: summary.success(),
            cancelled: summary.cancelled,
            duration_ms: summary.duration_ms,
            timestamp: Utc::now(),
        });
        tracing::info!(
            "Run {} finished: {} ok, {} failed, {} skipped in {}ms",
            execution_id,
            summary.executed.len(),
            summary.failed.len(),
            summary.skipped.len(),
            summary.duration_ms
        );

        Ok(summary)
    }

    async fn run_step(
        &self,
        graph: &mut WorkflowGraph,
        event_bus: &EventBus,
        execution_id: ExecutionId,
        node_id: &str,
        initial_input: &serde_json::Value,
        cancellation: &CancellationToken,
    ) -> Result<(), NodeError> {
        let input = merge_inputs(graph, node_id, initial_input);
        let incoming: Vec<EdgeId> = graph.incoming(node_id).map(|e| e.id.clone()).collect();

        let Some(node) = graph.node_mut(node_id) else {
            return Err(NodeError::ExecutionFailed(format!("node {} is not on the canvas", node_id)));
        };
        node.data.last_input = Some(input.clone());

        let node_type = node.node_type.clone();
        let ctx = StepContext {
            node_id: node_id.to_string(),
            node_type: node_type.clone(),
            config: node.data.config.clone(),
            input,
            definition: self.registry.get(&node_type).cloned(),
            events: event_bus.create_emitter(execution_id, node_id.to_string()),
            cancellation: cancellation.child_token(),
        };

        set_status(graph, event_bus, execution_id, node_id, ExecutionStatus::Running);
        event_bus.emit(ExecutionEvent::NodeStarted {
            execution_id,
            node_id: node_id.to_string(),
            node_type,
            timestamp: Utc::now(),
        });
        set_edges_active(graph, event_bus, execution_id, &incoming, true);

        let start = Instant::now();
        let result = self.execute_step(ctx, cancellation).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        set_edges_active(graph, event_bus, execution_id, &incoming, false);

        let Some(node) = graph.node_mut(node_id) else {
            return Err(NodeError::ExecutionFailed(format!("node {} is not on the canvas", node_id)));
        };
        match result {
            Ok(output) => {
                tracing::info!("Node {} completed in {}ms", node_id, duration_ms);
                node.data.last_output = Some(output.clone());
                set_status(graph, event_bus, execution_id, node_id, ExecutionStatus::Success);
                event_bus.emit(ExecutionEvent::NodeCompleted {
                    execution_id,
                    node_id: node_id.to_string(),
                    output,
                    duration_ms,
                    timestamp: Utc::now(),
                });
                Ok(())
            }
            Err(error) => {
                tracing::error!("Node {} failed: {}", node_id, error);
                node.data.last_error = Some(error.to_string());
                set_status(graph, event_bus, execution_id, node_id, ExecutionStatus::Error);
                event_bus.emit(ExecutionEvent::NodeFailed {
                    execution_id,
                    node_id: node_id.to_string(),
                    error: error.to_string(),
                    timestamp: Utc::now(),
                });
                Err(error)
            }
        }
    }

    async fn execute_step(
        &self,
        ctx: StepContext,
        cancellation: &CancellationToken,
    ) -> Result<serde_json::Value, NodeError> {
        let step = async {
            match self.config.step_timeout_ms {
                Some(millis) => timeout(Duration::from_millis(millis), self.executor.execute(ctx))
                    .await
                    .unwrap_or(Err(NodeError::Timeout { millis })),
                None => self.executor.execute(ctx).await,
            }
        };

        tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(NodeError::Cancelled),
            result = step => result,
        }
    }

    /// Return queued nodes to idle and record them as skipped
    fn release(
        &self,
        graph: &mut WorkflowGraph,
        event_bus: &EventBus,
        execution_id: ExecutionId,
        node_ids: &[NodeId],
        reason: &str,
        summary: &mut RunSummary,
    ) {
        for node_id in node_ids {
            if let Some(node) = graph.node_mut(node_id) {
                node.data.status = ExecutionStatus::Idle;
            }
            event_bus.emit(ExecutionEvent::NodeSkipped {
                execution_id,
                node_id: node_id.clone(),
                status: ExecutionStatus::Idle,
                reason: reason.to_string(),
                timestamp: Utc::now(),
            });
            summary.skipped.push(node_id.clone());
        }
    }
}

fn set_status(
    graph: &mut WorkflowGraph,
    event_bus: &EventBus,
    execution_id: ExecutionId,
    node_id: &str,
    status: ExecutionStatus,
) {
    if let Some(node) = graph.node_mut(node_id) {
        node.data.status = status;
        event_bus.emit(ExecutionEvent::NodeStatus {
            execution_id,
            node_id: node_id.to_string(),
            status,
            timestamp: Utc::now(),
        });
    }
}

fn set_edges_active(
    graph: &mut WorkflowGraph,
    event_bus: &EventBus,
    execution_id: ExecutionId,
    edge_ids: &[EdgeId],
    active: bool,
) {
    for edge_id in edge_ids {
        if let Some(edge) = graph.edge_mut(edge_id) {
            edge.animated = active;
            event_bus.emit(ExecutionEvent::EdgeActivity {
                execution_id,
                edge_id: edge_id.clone(),
                active,
                timestamp: Utc::now(),
            });
        }
    }
}

/// Shallow-merge the last outputs of a node's direct predecessors.
///
/// Object outputs are merged key by key in edge order, later predecessors
/// winning; any other output is stored under the predecessor's id. Nodes
/// without predecessors get the run's initial input.
pub fn merge_inputs(
    graph: &WorkflowGraph,
    node_id: &str,
    initial_input: &serde_json::Value,
) -> serde_json::Value {
    let predecessors = graph.predecessors(node_id);
    if predecessors.is_empty() {
        return initial_input.clone();
    }

    let mut merged = serde_json::Map::new();
    for predecessor in predecessors {
        let Some(output) = graph
            .node(&predecessor)
            .and_then(|n| n.data.last_output.as_ref())
        else {
            continue;
        };
        match output {
            serde_json::Value::Object(fields) => {
                merged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            other => {
                merged.insert(predecessor, other.clone());
            }
        }
    }
    serde_json::Value::Object(merged)
}
