//! Built-in node catalogue
//!
//! Definitions for the node types the canvas offers out of the box, and
//! the table of which types may connect into which.

mod actions;
mod agents;
mod logic;
mod output;
mod triggers;

pub use actions::{action, tool, transform};
pub use agents::{agent, llm};
pub use logic::{condition, guardrail, hitl};
pub use output::output;
pub use triggers::{schedule, trigger, webhook};

use canvasruntime::{NodeDefinition, NodeRegistry};

/// Every built-in definition, in palette order
pub fn definitions() -> Vec<NodeDefinition> {
    vec![
        trigger(),
        webhook(),
        schedule(),
        agent(),
        llm(),
        condition(),
        hitl(),
        guardrail(),
        action(),
        tool(),
        transform(),
        output(),
    ]
}

/// Allowed connections, source type → target types.
///
/// Directional: nothing connects into a trigger and `output` ends a branch.
pub const CONNECTION_RULES: &[(&str, &[&str])] = &[
    ("trigger", &["agent", "llm", "condition", "hitl", "guardrail", "action", "tool", "transform"]),
    ("webhook", &["agent", "llm", "condition", "hitl", "guardrail", "action", "tool", "transform"]),
    ("schedule", &["agent", "llm", "condition", "hitl", "guardrail", "action", "tool", "transform"]),
    ("agent", &["agent", "llm", "condition", "hitl", "guardrail", "action", "tool", "transform", "output"]),
    ("llm", &["agent", "llm", "condition", "hitl", "guardrail", "action", "tool", "transform", "output"]),
    ("condition", &["agent", "llm", "condition", "hitl", "guardrail", "action", "tool", "transform", "output"]),
    ("hitl", &["agent", "llm", "condition", "action", "tool", "transform", "output"]),
    ("guardrail", &["agent", "llm", "hitl", "action", "tool", "transform", "output"]),
    ("action", &["agent", "llm", "condition", "hitl", "action", "transform", "output"]),
    ("tool", &["agent", "llm", "condition", "action", "transform", "output"]),
    ("transform", &["agent", "llm", "condition", "hitl", "guardrail", "action", "tool", "transform", "output"]),
    ("output", &[]),
];

/// Register all built-in node types and their connection rules
pub fn register_all(registry: &mut NodeRegistry) {
    for definition in definitions() {
        registry.register(definition);
    }
    for (source, targets) in CONNECTION_RULES {
        registry.allow_connections(source, targets.iter().copied());
    }
}

/// Registry holding only the built-in catalogue
pub fn default_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    register_all(&mut registry);
    registry
}
