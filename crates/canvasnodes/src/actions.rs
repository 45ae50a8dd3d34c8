use canvasruntime::{FieldSpec, NodeDefinition};
use serde_json::json;

/// Side effect step: HTTP call, email or script depending on `action_type`
pub fn action() -> NodeDefinition {
    NodeDefinition::new("action", "Action", "actions")
        .with_description("Performs an HTTP call, sends an email or runs a script")
        .with_color("#0ea5e9")
        .with_field(
            FieldSpec::select("action_type", "Action Type", ["http", "email", "script"])
                .required()
                .default_value("http"),
        )
        .with_field(
            FieldSpec::text("url", "URL")
                .visible_when("action_type", ["http"])
                .required(),
        )
        .with_field(
            FieldSpec::select("method", "Method", ["GET", "POST", "PUT", "DELETE"])
                .visible_when("action_type", ["http"])
                .default_value("POST"),
        )
        .with_field(
            FieldSpec::text("recipient", "Recipient")
                .visible_when("action_type", ["email"])
                .required(),
        )
        .with_field(
            FieldSpec::textarea("script", "Script")
                .visible_when("action_type", ["script"])
                .required(),
        )
        .with_mock_output(json!({ "status": "done" }))
}

pub fn tool() -> NodeDefinition {
    NodeDefinition::new("tool", "Tool Call", "actions")
        .with_description("Invokes a registered tool")
        .with_color("#06b6d4")
        .with_field(FieldSpec::text("tool_name", "Tool").required())
        .with_field(FieldSpec::json("arguments", "Arguments").default_value(json!({})))
        .with_mock_output(json!({ "tool_result": { "ok": true } }))
}

/// Reshapes data; has no mock payload of its own
pub fn transform() -> NodeDefinition {
    NodeDefinition::new("transform", "Transform", "actions")
        .with_description("Reshapes data with an expression")
        .with_color("#14b8a6")
        .with_field(FieldSpec::textarea("expression", "Expression").required())
}
