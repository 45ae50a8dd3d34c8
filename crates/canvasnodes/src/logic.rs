use canvasruntime::{FieldSpec, HandleSpec, NodeDefinition};
use serde_json::json;

/// Branches on an expression; one output per outcome
pub fn condition() -> NodeDefinition {
    NodeDefinition::new("condition", "Condition", "logic")
        .with_description("Routes data down the true or false branch")
        .with_color("#f59e0b")
        .with_outputs(vec![
            HandleSpec::labelled("true", "True"),
            HandleSpec::labelled("false", "False"),
        ])
        .with_field(FieldSpec::text("expression", "Expression").required())
        .with_mock_output(json!({ "branch": "true" }))
}

/// Human-in-the-loop approval gate
pub fn hitl() -> NodeDefinition {
    NodeDefinition::new("hitl", "Human Approval", "logic")
        .with_description("Waits for a person to approve before continuing")
        .with_color("#ec4899")
        .with_field(FieldSpec::text("approvers", "Approvers").required())
        .with_field(FieldSpec::textarea("message", "Message").max_length(2000))
        .with_field(
            FieldSpec::number("timeout_minutes", "Timeout (minutes)")
                .min(1.0)
                .default_value(60),
        )
        .with_field(
            FieldSpec::select("on_timeout", "On Timeout", ["approve", "reject"]).default_value("reject"),
        )
        .with_mock_output(json!({ "approved": true, "approver": "reviewer" }))
}

pub fn guardrail() -> NodeDefinition {
    NodeDefinition::new("guardrail", "Guardrail", "logic")
        .with_description("Checks data against a guardrail policy")
        .with_color("#ef4444")
        .with_field(FieldSpec::text("guardrail_id", "Guardrail").required())
        .with_field(
            FieldSpec::select("action", "On Violation", ["block", "warn", "redact"])
                .required()
                .default_value("block"),
        )
        .with_mock_output(json!({ "passed": true, "violations": [] }))
}
