use crate::node::{NodeId, WorkflowNode};
use crate::persist::PersistedGraph;
use crate::WorkflowError;
use serde::{Deserialize, Serialize};

pub type EdgeId = String;

/// Directed connection between two nodes on the canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,

    /// Set while the edge's target node is running
    #[serde(default)]
    pub animated: bool,
}

impl WorkflowEdge {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: edge_id(&source, None, &target, None),
            source,
            target,
            source_handle: None,
            target_handle: None,
            animated: false,
        }
    }

    pub fn with_handles(mut self, source_handle: Option<String>, target_handle: Option<String>) -> Self {
        self.id = edge_id(&self.source, source_handle.as_deref(), &self.target, target_handle.as_deref());
        self.source_handle = source_handle;
        self.target_handle = target_handle;
        self
    }

    pub fn with_id(mut self, id: impl Into<EdgeId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// Deterministic edge id derived from the connection's endpoints
pub fn edge_id(source: &str, source_handle: Option<&str>, target: &str, target_handle: Option<&str>) -> EdgeId {
    format!(
        "edge-{}{}-{}{}",
        source,
        source_handle.unwrap_or_default(),
        target,
        target_handle.unwrap_or_default()
    )
}

/// In-memory node/edge graph behind the canvas.
///
/// Nodes and edges keep insertion order, which is what the execution order
/// uses to break ties. Every edge references nodes that exist in the graph.
/// Serde goes through [`PersistedGraph`], so run state is not written and
/// deserializing checks the same invariants as `from_persisted`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "PersistedGraph", try_from = "PersistedGraph")]
pub struct WorkflowGraph {
    nodes: Vec<WorkflowNode>,
    edges: Vec<WorkflowEdge>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[WorkflowNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[WorkflowEdge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut WorkflowNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&WorkflowEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn edge_mut(&mut self, id: &str) -> Option<&mut WorkflowEdge> {
        self.edges.iter_mut().find(|e| e.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn insert_node(&mut self, node: WorkflowNode) -> Result<NodeId, WorkflowError> {
        if self.contains_node(&node.id) {
            return Err(WorkflowError::DuplicateNode(node.id));
        }
        let id = node.id.clone();
        self.nodes.push(node);
        Ok(id)
    }

    pub fn insert_edge(&mut self, edge: WorkflowEdge) -> Result<EdgeId, WorkflowError> {
        for endpoint in [&edge.source, &edge.target] {
            if !self.contains_node(endpoint) {
                return Err(WorkflowError::NodeNotFound(endpoint.clone()));
            }
        }
        if self.edge(&edge.id).is_some() {
            return Err(WorkflowError::DuplicateEdge(edge.id));
        }
        let id = edge.id.clone();
        self.edges.push(edge);
        Ok(id)
    }

    /// Remove a node together with every edge that starts or ends at it
    pub fn remove_node(&mut self, id: &str) -> Result<(WorkflowNode, Vec<WorkflowEdge>), WorkflowError> {
        let index = self
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| WorkflowError::NodeNotFound(id.to_string()))?;
        let node = self.nodes.remove(index);

        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.edges)
            .into_iter()
            .partition(|e| e.touches(id));
        self.edges = kept;

        tracing::debug!("Removed node {} and {} incident edges", id, removed.len());
        Ok((node, removed))
    }

    pub fn remove_edge(&mut self, id: &str) -> Result<WorkflowEdge, WorkflowError> {
        let index = self
            .edges
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| WorkflowError::EdgeNotFound(id.to_string()))?;
        Ok(self.edges.remove(index))
    }

    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a WorkflowEdge> + 'a {
        self.edges.iter().filter(move |e| e.target == id)
    }

    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a WorkflowEdge> + 'a {
        self.edges.iter().filter(move |e| e.source == id)
    }

    /// Direct predecessors in edge order, without repeats
    pub fn predecessors(&self, id: &str) -> Vec<NodeId> {
        let mut seen = Vec::new();
        for edge in self.incoming(id) {
            if !seen.contains(&edge.source) {
                seen.push(edge.source.clone());
            }
        }
        seen
    }

    pub fn find_edge(
        &self,
        source: &str,
        source_handle: Option<&str>,
        target: &str,
        target_handle: Option<&str>,
    ) -> Option<&WorkflowEdge> {
        self.edges.iter().find(|e| {
            e.source == source
                && e.target == target
                && e.source_handle.as_deref() == source_handle
                && e.target_handle.as_deref() == target_handle
        })
    }

    /// Clear statuses, outputs and edge animation left by a previous run
    pub fn reset_execution(&mut self) {
        for node in &mut self.nodes {
            node.data.clear_execution();
        }
        for edge in &mut self.edges {
            edge.animated = false;
        }
    }
}
