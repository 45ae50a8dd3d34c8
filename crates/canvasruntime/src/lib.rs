//! Workflow canvas runtime
//!
//! This crate holds the node registry and connection rules, config and
//! graph validation, the topological execution order, the simulated run
//! over a canvas graph, the canvas editor itself and the pipeline store
//! client used to list and save graphs.

mod canvas;
mod order;
mod registry;
mod simulator;
mod step;
mod store;
mod validation;

pub use canvas::{Canvas, CanvasConfig, Connection};
pub use order::{execution_order, strict_order, ExecutionPlan};
pub use registry::{FieldCondition, FieldSpec, FieldType, HandleSpec, NodeDefinition, NodeRegistry};
pub use simulator::{
    merge_inputs, CyclePolicy, ErrorHandling, ExecutionSimulator, RunSummary, SimulatorConfig,
};
pub use step::{fallback_output, MockStepExecutor, StepContext, StepExecutor};
pub use store::{list_or_empty, HttpPipelineStore, MemoryPipelineStore, PipelineStore, StoreError};
pub use validation::{
    should_show_field, validate_node_config, validate_workflow, GraphIssue, ValidationReport,
    WorkflowReport,
};
