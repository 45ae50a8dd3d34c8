//! Saved shape of a canvas graph.
//!
//! Pipelines are stored by the backend with the graph embedded under
//! `metadata.rf_nodes` / `metadata.rf_edges`. Only the editable parts of a
//! node are written; run state never leaves the process.

use crate::node::{Config, NodeData, NodeId, Position, WorkflowNode};
use crate::workflow::{EdgeId, WorkflowEdge, WorkflowGraph};
use crate::WorkflowError;
use serde::{Deserialize, Deserializer, Serialize};

/// Read an explicit `null` the same way as a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedNodeData {
    pub label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub config: Config,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub position: Position,
    pub data: PersistedNodeData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub source_handle: Option<String>,
    #[serde(default)]
    pub target_handle: Option<String>,
}

impl From<&WorkflowNode> for PersistedNode {
    fn from(node: &WorkflowNode) -> Self {
        Self {
            id: node.id.clone(),
            node_type: node.node_type.clone(),
            position: node.position,
            data: PersistedNodeData {
                label: node.data.label.clone(),
                notes: node.data.notes.clone(),
                config: node.data.config.clone(),
            },
        }
    }
}

impl From<PersistedNode> for WorkflowNode {
    fn from(node: PersistedNode) -> Self {
        Self {
            id: node.id,
            node_type: node.node_type,
            position: node.position,
            data: NodeData {
                label: node.data.label,
                notes: node.data.notes,
                config: node.data.config,
                ..Default::default()
            },
        }
    }
}

impl From<&WorkflowEdge> for PersistedEdge {
    fn from(edge: &WorkflowEdge) -> Self {
        Self {
            id: edge.id.clone(),
            source: edge.source.clone(),
            target: edge.target.clone(),
            source_handle: edge.source_handle.clone(),
            target_handle: edge.target_handle.clone(),
        }
    }
}

impl From<PersistedEdge> for WorkflowEdge {
    fn from(edge: PersistedEdge) -> Self {
        Self {
            id: edge.id,
            source: edge.source,
            target: edge.target,
            source_handle: edge.source_handle,
            target_handle: edge.target_handle,
            animated: false,
        }
    }
}

/// Node and edge lists in their saved form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedGraph {
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<PersistedNode>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub edges: Vec<PersistedEdge>,
}

impl From<WorkflowGraph> for PersistedGraph {
    fn from(graph: WorkflowGraph) -> Self {
        graph.to_persisted()
    }
}

impl TryFrom<PersistedGraph> for WorkflowGraph {
    type Error = WorkflowError;

    fn try_from(persisted: PersistedGraph) -> Result<Self, Self::Error> {
        WorkflowGraph::from_persisted(persisted)
    }
}

impl WorkflowGraph {
    pub fn to_persisted(&self) -> PersistedGraph {
        PersistedGraph {
            nodes: self.nodes().iter().map(PersistedNode::from).collect(),
            edges: self.edges().iter().map(PersistedEdge::from).collect(),
        }
    }

    /// Rebuild a graph, rejecting duplicate ids and edges to missing nodes
    pub fn from_persisted(persisted: PersistedGraph) -> Result<Self, WorkflowError> {
        let mut graph = WorkflowGraph::new();
        for node in persisted.nodes {
            graph.insert_node(node.into())?;
        }
        for edge in persisted.edges {
            graph.insert_edge(edge.into())?;
        }
        Ok(graph)
    }
}

/// Graph payload embedded in a pipeline record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetadata {
    #[serde(default, deserialize_with = "null_as_default")]
    pub rf_nodes: Vec<PersistedNode>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rf_edges: Vec<PersistedEdge>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A pipeline as listed and saved by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: PipelineMetadata,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PipelineRecord {
    pub fn new(name: impl Into<String>, graph: &WorkflowGraph) -> Self {
        let mut record = Self {
            name: name.into(),
            ..Default::default()
        };
        record.set_graph(graph);
        record
    }

    pub fn set_graph(&mut self, graph: &WorkflowGraph) {
        let persisted = graph.to_persisted();
        self.metadata.rf_nodes = persisted.nodes;
        self.metadata.rf_edges = persisted.edges;
    }

    pub fn graph(&self) -> Result<WorkflowGraph, WorkflowError> {
        WorkflowGraph::from_persisted(PersistedGraph {
            nodes: self.metadata.rf_nodes.clone(),
            edges: self.metadata.rf_edges.clone(),
        })
    }
}
