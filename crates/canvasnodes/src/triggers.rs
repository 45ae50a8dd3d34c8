use canvasruntime::{FieldSpec, NodeDefinition};
use serde_json::json;

/// Manual start of a workflow
pub fn trigger() -> NodeDefinition {
    NodeDefinition::new("trigger", "Manual Trigger", "triggers")
        .with_description("Starts the workflow when run from the canvas")
        .with_color("#22c55e")
        .with_inputs(vec![])
        .with_field(FieldSpec::json("payload", "Test Payload").default_value(json!({})))
        .with_mock_output(json!({ "triggered": true }))
}

pub fn webhook() -> NodeDefinition {
    NodeDefinition::new("webhook", "Webhook", "triggers")
        .with_description("Starts the workflow on an incoming HTTP request")
        .with_color("#16a34a")
        .with_inputs(vec![])
        .with_field(
            FieldSpec::text("path", "Path")
                .required()
                .max_length(200)
                .help("Relative path, e.g. /hooks/intake"),
        )
        .with_field(FieldSpec::select("method", "Method", ["GET", "POST", "PUT"]).default_value("POST"))
        .with_field(FieldSpec::boolean("require_signature", "Require Signature").default_value(false))
        .with_field(
            FieldSpec::text("secret_header", "Signature Header")
                .visible_when("require_signature", [true])
                .required(),
        )
        .with_mock_output(json!({ "body": {}, "headers": {} }))
}

pub fn schedule() -> NodeDefinition {
    NodeDefinition::new("schedule", "Schedule", "triggers")
        .with_description("Starts the workflow on a cron schedule")
        .with_color("#15803d")
        .with_inputs(vec![])
        .with_field(FieldSpec::text("cron", "Cron Expression").required().default_value("0 * * * *"))
        .with_field(FieldSpec::text("timezone", "Timezone").default_value("UTC"))
        .with_mock_output(json!({ "fired_at": "1970-01-01T00:00:00Z" }))
}
