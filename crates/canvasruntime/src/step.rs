use crate::registry::NodeDefinition;
use async_trait::async_trait;
use canvascore::{Config, EventEmitter, NodeError, NodeId};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

/// Everything a step sees about the node it runs
#[derive(Clone)]
pub struct StepContext {
    pub node_id: NodeId,
    pub node_type: String,
    pub config: Config,
    /// Merged outputs of the node's direct predecessors
    pub input: serde_json::Value,
    /// Catalogue entry, when the node's type is registered
    pub definition: Option<Arc<NodeDefinition>>,
    pub events: EventEmitter,
    pub cancellation: CancellationToken,
}

/// Runs one node of a canvas graph
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, ctx: StepContext) -> Result<serde_json::Value, NodeError>;
}

/// Output used for node types without a mock payload
pub fn fallback_output() -> serde_json::Value {
    serde_json::json!({ "result": "ok" })
}

/// Simulated step: waits a random latency, then answers with the node's mock output.
///
/// Failures can be injected per node id or per node type.
#[derive(Debug, Clone)]
pub struct MockStepExecutor {
    min_delay_ms: u64,
    max_delay_ms: u64,
    failing_nodes: HashSet<NodeId>,
    failing_types: HashSet<String>,
}

impl MockStepExecutor {
    pub fn new(min_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            min_delay_ms: min_delay_ms.min(max_delay_ms),
            max_delay_ms: max_delay_ms.max(min_delay_ms),
            failing_nodes: HashSet::new(),
            failing_types: HashSet::new(),
        }
    }

    /// No latency at all
    pub fn instant() -> Self {
        Self::new(0, 0)
    }

    pub fn fail_node(mut self, node_id: impl Into<NodeId>) -> Self {
        self.failing_nodes.insert(node_id.into());
        self
    }

    pub fn fail_type(mut self, node_type: impl Into<String>) -> Self {
        self.failing_types.insert(node_type.into());
        self
    }

    fn delay(&self) -> Duration {
        let millis = if self.max_delay_ms == self.min_delay_ms {
            self.min_delay_ms
        } else {
            rand::rng().random_range(self.min_delay_ms..=self.max_delay_ms)
        };
        Duration::from_millis(millis)
    }
}

impl Default for MockStepExecutor {
    fn default() -> Self {
        Self::new(300, 800)
    }
}

#[async_trait]
impl StepExecutor for MockStepExecutor {
    async fn execute(&self, ctx: StepContext) -> Result<serde_json::Value, NodeError> {
        let delay = self.delay();
        ctx.events
            .info(format!("Simulating {} for {}ms", ctx.node_type, delay.as_millis()));

        tokio::select! {
            _ = sleep(delay) => {}
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
        }

        if self.failing_nodes.contains(&ctx.node_id) || self.failing_types.contains(&ctx.node_type) {
            return Err(NodeError::ExecutionFailed(format!(
                "simulated failure in {}",
                ctx.node_id
            )));
        }

        Ok(ctx
            .definition
            .as_ref()
            .and_then(|d| d.mock_output.clone())
            .unwrap_or_else(fallback_output))
    }
}
