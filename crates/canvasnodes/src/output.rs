use canvasruntime::{FieldSpec, NodeDefinition};
use serde_json::json;

pub fn output() -> NodeDefinition {
    NodeDefinition::new("output", "Output", "outputs")
        .with_description("Final result of the workflow")
        .with_color("#64748b")
        .with_outputs(vec![])
        .with_field(
            FieldSpec::select("format", "Format", ["json", "text", "markdown"]).default_value("json"),
        )
        .with_mock_output(json!({ "delivered": true }))
}
