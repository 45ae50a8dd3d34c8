//! Config and graph validation.
//!
//! Everything here is advisory: reports are shown next to the node and never
//! stop a graph from being saved.

use crate::order::execution_order;
use crate::registry::{FieldSpec, FieldType, NodeRegistry};
use canvascore::{Config, EdgeId, NodeId, WorkflowError, WorkflowGraph};
use serde::Serialize;
use std::collections::BTreeMap;

/// Errors and warnings for one node, keyed by field key
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: BTreeMap<String, String>,
    pub warnings: BTreeMap<String, String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Whether `field` is visible given the rest of the node's config
pub fn should_show_field(field: &FieldSpec, config: &Config, fields: &[FieldSpec]) -> bool {
    let Some(condition) = &field.visible_when else {
        return true;
    };

    let current = config.get(&condition.field).cloned().or_else(|| {
        fields
            .iter()
            .find(|f| f.key == condition.field)
            .map(|f| f.default.clone())
    });

    match current {
        Some(value) => condition.equals.contains(&value),
        None => false,
    }
}

fn is_blank(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn check_field(field: &FieldSpec, value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;

    match (field.field_type, value) {
        (FieldType::Number, Value::Number(n)) => {
            let n = n.as_f64().unwrap_or_default();
            if let Some(min) = field.min {
                if n < min {
                    return Some(format!("{} must be at least {}", field.label, min));
                }
            }
            if let Some(max) = field.max {
                if n > max {
                    return Some(format!("{} must be at most {}", field.label, max));
                }
            }
            None
        }
        (FieldType::Boolean, Value::Bool(_)) => None,
        (FieldType::Text | FieldType::Textarea, Value::String(s)) => match field.max_length {
            Some(limit) if s.chars().count() > limit => Some(format!(
                "{} must be at most {} characters",
                field.label, limit
            )),
            _ => None,
        },
        (FieldType::Select, Value::String(s)) => {
            if field.options.is_empty() || field.options.contains(s) {
                None
            } else {
                Some(format!(
                    "{} must be one of: {}",
                    field.label,
                    field.options.join(", ")
                ))
            }
        }
        (FieldType::Json, Value::String(s)) => serde_json::from_str::<Value>(s)
            .err()
            .map(|e| format!("{} is not valid JSON: {}", field.label, e)),
        (FieldType::Json, _) => None,
        (expected, actual) => Some(format!(
            "{} expects a {} value, got {}",
            field.label,
            expected.as_str(),
            json_kind(actual)
        )),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Check a node's config against its type's field schema
pub fn validate_node_config(
    registry: &NodeRegistry,
    node_type: &str,
    config: &Config,
) -> Result<ValidationReport, WorkflowError> {
    let definition = registry
        .get(node_type)
        .ok_or_else(|| WorkflowError::UnknownNodeType(node_type.to_string()))?;

    let mut report = ValidationReport::default();

    for field in &definition.fields {
        let value = config.get(&field.key);

        if !should_show_field(field, config, &definition.fields) {
            if value.is_some_and(|v| !is_blank(v)) {
                report.warnings.insert(
                    field.key.clone(),
                    format!("{} is ignored with the current settings", field.label),
                );
            }
            continue;
        }

        match value {
            None => {
                if field.required {
                    report
                        .errors
                        .insert(field.key.clone(), format!("{} is required", field.label));
                }
            }
            Some(v) if is_blank(v) => {
                if field.required {
                    report
                        .errors
                        .insert(field.key.clone(), format!("{} is required", field.label));
                }
            }
            Some(v) => {
                if let Some(message) = check_field(field, v) {
                    report.errors.insert(field.key.clone(), message);
                }
            }
        }
    }

    for key in config.keys() {
        if definition.field(key).is_none() {
            report
                .warnings
                .insert(key.clone(), format!("Unknown setting '{}'", key));
        }
    }

    Ok(report)
}

/// Structural problem found in a graph
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphIssue {
    UnknownNodeType { node_id: NodeId, node_type: String },
    DisallowedConnection { edge_id: EdgeId, source_type: String, target_type: String },
    UnknownHandle { edge_id: EdgeId, handle: String },
    NoEntryPoint,
    Blocked { node_ids: Vec<NodeId> },
}

/// Validation results for a whole graph
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowReport {
    pub nodes: BTreeMap<NodeId, ValidationReport>,
    pub issues: Vec<GraphIssue>,
}

impl WorkflowReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty() && self.nodes.values().all(ValidationReport::is_valid)
    }

    pub fn error_count(&self) -> usize {
        self.issues.len() + self.nodes.values().map(|r| r.errors.len()).sum::<usize>()
    }
}

/// Validate every node's config and the graph's structure
pub fn validate_workflow(registry: &NodeRegistry, graph: &WorkflowGraph) -> WorkflowReport {
    let mut report = WorkflowReport::default();

    for node in graph.nodes() {
        match validate_node_config(registry, &node.node_type, &node.data.config) {
            Ok(node_report) => {
                report.nodes.insert(node.id.clone(), node_report);
            }
            Err(_) => report.issues.push(GraphIssue::UnknownNodeType {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
            }),
        }
    }

    for edge in graph.edges() {
        // insert_edge guarantees both endpoints exist
        let (Some(source), Some(target)) = (graph.node(&edge.source), graph.node(&edge.target)) else {
            continue;
        };
        if registry.contains(&source.node_type)
            && registry.contains(&target.node_type)
            && !registry.can_connect(&source.node_type, &target.node_type)
        {
            report.issues.push(GraphIssue::DisallowedConnection {
                edge_id: edge.id.clone(),
                source_type: source.node_type.clone(),
                target_type: target.node_type.clone(),
            });
        }
        if let (Some(handle), Some(definition)) = (&edge.source_handle, registry.get(&source.node_type)) {
            if !definition.has_output(handle) {
                report.issues.push(GraphIssue::UnknownHandle {
                    edge_id: edge.id.clone(),
                    handle: handle.clone(),
                });
            }
        }
        if let (Some(handle), Some(definition)) = (&edge.target_handle, registry.get(&target.node_type)) {
            if !definition.has_input(handle) {
                report.issues.push(GraphIssue::UnknownHandle {
                    edge_id: edge.id.clone(),
                    handle: handle.clone(),
                });
            }
        }
    }

    if !graph.is_empty() {
        let plan = execution_order(graph);
        if plan.order.is_empty() {
            report.issues.push(GraphIssue::NoEntryPoint);
        }
        if !plan.blocked.is_empty() {
            report.issues.push(GraphIssue::Blocked {
                node_ids: plan.blocked,
            });
        }
    }

    report
}
