use canvasruntime::{FieldSpec, NodeDefinition};
use serde_json::json;

/// Hands the input to a configured agent
pub fn agent() -> NodeDefinition {
    NodeDefinition::new("agent", "Agent", "agents")
        .with_description("Runs a configured agent on the incoming data")
        .with_color("#6366f1")
        .with_field(FieldSpec::text("agent_id", "Agent").required())
        .with_field(FieldSpec::textarea("instructions", "Instructions").max_length(4000))
        .with_field(
            FieldSpec::number("max_iterations", "Max Iterations")
                .range(1.0, 50.0)
                .default_value(5),
        )
        .with_mock_output(json!({
            "response": "Agent completed the task",
            "iterations": 1
        }))
}

pub fn llm() -> NodeDefinition {
    NodeDefinition::new("llm", "LLM Call", "agents")
        .with_description("Single completion against a configured model")
        .with_color("#8b5cf6")
        .with_field(
            FieldSpec::select("provider", "Provider", ["openai", "anthropic", "local"])
                .required()
                .default_value("openai"),
        )
        .with_field(FieldSpec::text("model", "Model").required())
        .with_field(
            FieldSpec::text("endpoint", "Endpoint URL")
                .visible_when("provider", ["local"])
                .required(),
        )
        .with_field(FieldSpec::textarea("system_prompt", "System Prompt").max_length(8000))
        .with_field(
            FieldSpec::number("temperature", "Temperature")
                .range(0.0, 2.0)
                .default_value(0.7),
        )
        .with_field(FieldSpec::number("max_tokens", "Max Tokens").min(1.0).default_value(1024))
        .with_mock_output(json!({
            "completion": "This is a simulated completion.",
            "tokens": 42
        }))
}
