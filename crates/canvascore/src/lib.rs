//! Core data model for the workflow canvas
//!
//! Nodes, edges, execution status, run events and the persisted pipeline
//! shape. This crate holds no registry and runs nothing; the runtime crate
//! builds on these types.

mod error;
pub mod events;
mod node;
mod persist;
mod workflow;

pub use error::{CanvasError, NodeError, WorkflowError};
pub use events::*;
pub use node::{Config, ExecutionStatus, NodeData, NodeId, NodeIdGenerator, Position, WorkflowNode};
pub use persist::{
    PersistedEdge, PersistedGraph, PersistedNode, PersistedNodeData, PipelineMetadata,
    PipelineRecord,
};
pub use workflow::{edge_id, EdgeId, WorkflowEdge, WorkflowGraph};

/// Result type for canvas operations
pub type Result<T> = std::result::Result<T, CanvasError>;
