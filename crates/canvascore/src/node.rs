use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub type NodeId = String;

/// Node configuration keyed by field key. Ordered so saved graphs diff cleanly.
pub type Config = BTreeMap<String, serde_json::Value>;

/// Node position on the canvas
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Execution state of a single node during a simulated run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    #[default]
    #[serde(rename = "none")]
    Idle,
    Queued,
    Running,
    Success,
    Error,
}

impl ExecutionStatus {
    /// Whether the node has reached a final state for the current run
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Success | ExecutionStatus::Error)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionStatus::Idle => "none",
            ExecutionStatus::Queued => "queued",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// Editable payload of a node plus its transient execution fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub label: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub config: Config,

    #[serde(default)]
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_input: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl NodeData {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// Drop everything a run wrote into this node
    pub fn clear_execution(&mut self) {
        self.status = ExecutionStatus::Idle;
        self.last_output = None;
        self.last_input = None;
        self.last_error = None;
    }
}

/// A node placed on the canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    pub position: Position,
    pub data: NodeData,
}

impl WorkflowNode {
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        let node_type = node_type.into();
        Self {
            id: id.into(),
            data: NodeData::new(node_type.clone()),
            node_type,
            position: Position::default(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.data.label = label.into();
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.config.insert(key.into(), value.into());
        self
    }

    pub fn status(&self) -> ExecutionStatus {
        self.data.status
    }
}

/// Generates opaque node ids from a monotonic counter and the creation time
#[derive(Debug, Default)]
pub struct NodeIdGenerator {
    counter: AtomicU64,
}

impl NodeIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting after `start`, e.g. after the nodes of a loaded graph
    pub fn starting_at(start: u64) -> Self {
        Self {
            counter: AtomicU64::new(start),
        }
    }

    pub fn next_id(&self) -> NodeId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("node_{}_{}", n, Utc::now().timestamp_millis())
    }
}
