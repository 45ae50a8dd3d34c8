use crate::order::{execution_order, ExecutionPlan};
use crate::registry::NodeRegistry;
use crate::simulator::{ExecutionSimulator, RunSummary, SimulatorConfig};
use crate::step::StepExecutor;
use crate::validation::{validate_node_config, validate_workflow, ValidationReport, WorkflowReport};
use canvascore::{
    edge_id, CanvasError, Config, EdgeId, EventBus, ExecutionEvent, NodeId, NodeIdGenerator,
    PipelineRecord, Position, WorkflowEdge, WorkflowError, WorkflowGraph, WorkflowNode,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A connect gesture between two node handles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Connection {
    pub source: NodeId,
    pub target: NodeId,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
}

impl Connection {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    pub fn from_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }

    pub fn to_handle(mut self, handle: impl Into<String>) -> Self {
        self.target_handle = Some(handle.into());
        self
    }
}

/// Configuration for the canvas editor
#[derive(Debug, Clone)]
pub struct CanvasConfig {
    /// Offset applied to a duplicated node's position
    pub duplicate_offset: Position,
    pub simulator: SimulatorConfig,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            duplicate_offset: Position::new(40.0, 40.0),
            simulator: SimulatorConfig::default(),
        }
    }
}

/// Editor state for one workflow: the graph plus the registry that gates it
pub struct Canvas {
    graph: WorkflowGraph,
    registry: Arc<NodeRegistry>,
    event_bus: Arc<EventBus>,
    simulator: ExecutionSimulator,
    ids: NodeIdGenerator,
    config: CanvasConfig,
}

impl Canvas {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self::with_config(registry, CanvasConfig::default())
    }

    pub fn with_config(registry: Arc<NodeRegistry>, config: CanvasConfig) -> Self {
        let simulator = ExecutionSimulator::new(registry.clone(), config.simulator.clone());
        Self::build(registry, simulator, config)
    }

    /// Canvas whose runs go through a custom step executor
    pub fn with_executor(
        registry: Arc<NodeRegistry>,
        executor: Arc<dyn StepExecutor>,
        config: CanvasConfig,
    ) -> Self {
        let simulator =
            ExecutionSimulator::with_executor(registry.clone(), executor, config.simulator.clone());
        Self::build(registry, simulator, config)
    }

    fn build(registry: Arc<NodeRegistry>, simulator: ExecutionSimulator, config: CanvasConfig) -> Self {
        Self {
            graph: WorkflowGraph::new(),
            event_bus: Arc::new(EventBus::new(config.simulator.event_buffer_size)),
            registry,
            simulator,
            ids: NodeIdGenerator::new(),
            config,
        }
    }

    /// Replace the graph, e.g. with one loaded from a pipeline record
    pub fn load(&mut self, graph: WorkflowGraph) {
        self.ids = NodeIdGenerator::starting_at(graph.nodes().len() as u64);
        self.graph = graph;
    }

    pub fn load_record(&mut self, record: &PipelineRecord) -> Result<(), WorkflowError> {
        let graph = record.graph()?;
        self.load(graph);
        Ok(())
    }

    /// Pipeline record for saving; run state is left out
    pub fn to_record(&self, name: impl Into<String>) -> PipelineRecord {
        PipelineRecord::new(name, &self.graph)
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut WorkflowNode, WorkflowError> {
        self.graph
            .node_mut(id)
            .ok_or_else(|| WorkflowError::NodeNotFound(id.to_string()))
    }

    fn fresh_id(&self) -> NodeId {
        loop {
            let id = self.ids.next_id();
            if !self.graph.contains_node(&id) {
                return id;
            }
        }
    }

    /// Drop a new node of `node_type` at `position`, pre-filled with the type's defaults
    pub fn add_node(&mut self, node_type: &str, position: Position) -> Result<NodeId, WorkflowError> {
        let definition = self
            .registry
            .get(node_type)
            .ok_or_else(|| WorkflowError::UnknownNodeType(node_type.to_string()))?;

        let mut node = WorkflowNode::new(self.fresh_id(), node_type).with_label(definition.label.clone());
        node.position = position;
        node.data.config = definition.default_config();

        tracing::debug!("Adding {} node {}", node_type, node.id);
        self.graph.insert_node(node)
    }

    /// Copy a node's type, label, notes and config into a new unconnected node
    pub fn duplicate_node(&mut self, id: &str) -> Result<NodeId, WorkflowError> {
        let original = self
            .graph
            .node(id)
            .ok_or_else(|| WorkflowError::NodeNotFound(id.to_string()))?;

        let mut copy = original.clone();
        copy.id = self.fresh_id();
        copy.position = original
            .position
            .offset(self.config.duplicate_offset.x, self.config.duplicate_offset.y);
        copy.data.clear_execution();

        self.graph.insert_node(copy)
    }

    pub fn move_node(&mut self, id: &str, position: Position) -> Result<(), WorkflowError> {
        self.node_mut(id)?.position = position;
        Ok(())
    }

    pub fn rename_node(&mut self, id: &str, label: impl Into<String>) -> Result<(), WorkflowError> {
        self.node_mut(id)?.data.label = label.into();
        Ok(())
    }

    pub fn set_notes(&mut self, id: &str, notes: impl Into<String>) -> Result<(), WorkflowError> {
        self.node_mut(id)?.data.notes = notes.into();
        Ok(())
    }

    pub fn set_config_value(
        &mut self,
        id: &str,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), WorkflowError> {
        self.node_mut(id)?.data.config.insert(key.into(), value);
        Ok(())
    }

    pub fn replace_config(&mut self, id: &str, config: Config) -> Result<(), WorkflowError> {
        self.node_mut(id)?.data.config = config;
        Ok(())
    }

    /// Delete a node and every edge attached to it
    pub fn remove_node(&mut self, id: &str) -> Result<WorkflowNode, WorkflowError> {
        let (node, edges) = self.graph.remove_node(id)?;
        tracing::debug!("Removed node {} with {} edge(s)", id, edges.len());
        Ok(node)
    }

    pub fn remove_edge(&mut self, id: &str) -> Result<WorkflowEdge, WorkflowError> {
        self.graph.remove_edge(id)
    }

    /// Check whether a connect gesture would be accepted, without applying it
    pub fn check_connection(&self, connection: &Connection) -> Result<(), WorkflowError> {
        let source = self
            .graph
            .node(&connection.source)
            .ok_or_else(|| WorkflowError::NodeNotFound(connection.source.clone()))?;
        let target = self
            .graph
            .node(&connection.target)
            .ok_or_else(|| WorkflowError::NodeNotFound(connection.target.clone()))?;

        if source.id == target.id {
            return Err(WorkflowError::InvalidConnection(format!(
                "{} cannot connect to itself",
                source.id
            )));
        }

        if !self.registry.can_connect(&source.node_type, &target.node_type) {
            return Err(WorkflowError::InvalidConnection(format!(
                "{} nodes cannot connect into {} nodes",
                source.node_type, target.node_type
            )));
        }

        // can_connect only passes for registered types
        let (Some(source_def), Some(target_def)) = (
            self.registry.get(&source.node_type),
            self.registry.get(&target.node_type),
        ) else {
            return Err(WorkflowError::UnknownNodeType(source.node_type.clone()));
        };

        if source_def.outputs.is_empty() {
            return Err(WorkflowError::InvalidConnection(format!(
                "{} nodes have no outputs",
                source.node_type
            )));
        }
        if target_def.inputs.is_empty() {
            return Err(WorkflowError::InvalidConnection(format!(
                "{} nodes have no inputs",
                target.node_type
            )));
        }
        if let Some(handle) = &connection.source_handle {
            if !source_def.has_output(handle) {
                return Err(WorkflowError::InvalidConnection(format!(
                    "{} has no output handle '{}'",
                    source.node_type, handle
                )));
            }
        }
        if let Some(handle) = &connection.target_handle {
            if !target_def.has_input(handle) {
                return Err(WorkflowError::InvalidConnection(format!(
                    "{} has no input handle '{}'",
                    target.node_type, handle
                )));
            }
        }

        Ok(())
    }

    /// Create an edge for a connect gesture.
    ///
    /// An identical existing connection is returned as is.
    pub fn connect(&mut self, connection: Connection) -> Result<EdgeId, WorkflowError> {
        if let Err(e) = self.check_connection(&connection) {
            tracing::debug!("Rejected connection {} -> {}: {}", connection.source, connection.target, e);
            return Err(e);
        }

        if let Some(existing) = self.graph.find_edge(
            &connection.source,
            connection.source_handle.as_deref(),
            &connection.target,
            connection.target_handle.as_deref(),
        ) {
            return Ok(existing.id.clone());
        }

        let mut edge = WorkflowEdge::new(connection.source, connection.target)
            .with_handles(connection.source_handle, connection.target_handle);
        // loaded graphs may already use the derived id for another edge
        if self.graph.edge(&edge.id).is_some() {
            let base = edge_id(
                &edge.source,
                edge.source_handle.as_deref(),
                &edge.target,
                edge.target_handle.as_deref(),
            );
            let mut n = 1;
            while self.graph.edge(&format!("{}-{}", base, n)).is_some() {
                n += 1;
            }
            edge.id = format!("{}-{}", base, n);
        }
        self.graph.insert_edge(edge)
    }

    pub fn validate_node(&self, id: &str) -> Result<ValidationReport, WorkflowError> {
        let node = self
            .graph
            .node(id)
            .ok_or_else(|| WorkflowError::NodeNotFound(id.to_string()))?;
        validate_node_config(&self.registry, &node.node_type, &node.data.config)
    }

    pub fn validate(&self) -> WorkflowReport {
        validate_workflow(&self.registry, &self.graph)
    }

    pub fn execution_order(&self) -> ExecutionPlan {
        execution_order(&self.graph)
    }

    /// Run the whole graph with an empty initial input
    pub async fn run(&mut self) -> Result<RunSummary, CanvasError> {
        self.run_with(serde_json::json!({}), CancellationToken::new()).await
    }

    pub async fn run_with(
        &mut self,
        input: serde_json::Value,
        cancellation: CancellationToken,
    ) -> Result<RunSummary, CanvasError> {
        self.simulator
            .run(&mut self.graph, &self.event_bus, input, cancellation)
            .await
    }

    pub fn reset_execution(&mut self) {
        self.graph.reset_execution();
    }
}
