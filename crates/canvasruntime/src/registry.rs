use canvascore::Config;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Kind of input a config field expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Textarea,
    Number,
    Boolean,
    Select,
    Json,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Select => "select",
            FieldType::Json => "json",
        }
    }
}

/// Show a field only while another field holds one of `equals`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCondition {
    pub field: String,
    pub equals: Vec<serde_json::Value>,
}

/// One entry of a node type's config schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub key: String,
    pub label: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub default: serde_json::Value,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_when: Option<FieldCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl FieldSpec {
    pub fn new(key: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            field_type,
            default: serde_json::Value::Null,
            required: false,
            min: None,
            max: None,
            max_length: None,
            options: Vec::new(),
            visible_when: None,
            help: None,
        }
    }

    pub fn text(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldType::Text)
    }

    pub fn textarea(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldType::Textarea)
    }

    pub fn number(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldType::Number)
    }

    pub fn boolean(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldType::Boolean)
    }

    pub fn json(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldType::Json)
    }

    pub fn select<I, S>(key: impl Into<String>, label: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut field = Self::new(key, label, FieldType::Select);
        field.options = options.into_iter().map(Into::into).collect();
        field
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.default = value.into();
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn visible_when<I, V>(mut self, field: impl Into<String>, equals: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<serde_json::Value>,
    {
        self.visible_when = Some(FieldCondition {
            field: field.into(),
            equals: equals.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

/// Connection point on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandleSpec {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl HandleSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
        }
    }

    pub fn labelled(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: Some(label.into()),
        }
    }
}

/// Catalogue entry describing one node type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub node_type: String,
    pub label: String,
    pub description: String,
    pub category: String,
    pub color: String,
    pub fields: Vec<FieldSpec>,
    pub inputs: Vec<HandleSpec>,
    pub outputs: Vec<HandleSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mock_output: Option<serde_json::Value>,
}

impl NodeDefinition {
    /// A definition with one input and one output handle
    pub fn new(node_type: impl Into<String>, label: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            label: label.into(),
            description: String::new(),
            category: category.into(),
            color: "#64748b".to_string(),
            fields: Vec::new(),
            inputs: vec![HandleSpec::new("in")],
            outputs: vec![HandleSpec::new("out")],
            mock_output: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<HandleSpec>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<HandleSpec>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_mock_output(mut self, output: serde_json::Value) -> Self {
        self.mock_output = Some(output);
        self
    }

    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn has_input(&self, handle: &str) -> bool {
        self.inputs.iter().any(|h| h.id == handle)
    }

    pub fn has_output(&self, handle: &str) -> bool {
        self.outputs.iter().any(|h| h.id == handle)
    }

    /// Field defaults for a freshly dropped node; fields without a default are left out
    pub fn default_config(&self) -> Config {
        self.fields
            .iter()
            .filter(|f| !f.default.is_null())
            .map(|f| (f.key.clone(), f.default.clone()))
            .collect()
    }
}

/// Catalogue of node types plus the table of allowed connections
#[derive(Debug, Default)]
pub struct NodeRegistry {
    definitions: HashMap<String, Arc<NodeDefinition>>,
    order: Vec<String>,
    connections: HashMap<String, HashSet<String>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type. Re-registering a type replaces its definition.
    pub fn register(&mut self, definition: NodeDefinition) {
        let node_type = definition.node_type.clone();
        tracing::debug!("Registering node type: {}", node_type);
        if !self.definitions.contains_key(&node_type) {
            self.order.push(node_type.clone());
        }
        self.definitions.insert(node_type, Arc::new(definition));
    }

    pub fn get(&self, node_type: &str) -> Option<&Arc<NodeDefinition>> {
        self.definitions.get(node_type)
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.definitions.contains_key(node_type)
    }

    /// Registered node types in registration order
    pub fn list_node_types(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Arc<NodeDefinition>> {
        self.order.iter().filter_map(|t| self.definitions.get(t))
    }

    /// Categories in order of first appearance
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for definition in self.definitions() {
            if !categories.contains(&definition.category) {
                categories.push(definition.category.clone());
            }
        }
        categories
    }

    pub fn by_category(&self, category: &str) -> Vec<Arc<NodeDefinition>> {
        self.definitions()
            .filter(|d| d.category == category)
            .cloned()
            .collect()
    }

    pub fn default_config(&self, node_type: &str) -> Option<Config> {
        self.get(node_type).map(|d| d.default_config())
    }

    pub fn mock_output(&self, node_type: &str) -> Option<&serde_json::Value> {
        self.get(node_type).and_then(|d| d.mock_output.as_ref())
    }

    pub fn allow_connection(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.connections
            .entry(source.into())
            .or_default()
            .insert(target.into());
    }

    pub fn allow_connections<I, S>(&mut self, source: &str, targets: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for target in targets {
            self.allow_connection(source, target);
        }
    }

    /// Whether an edge from a `source_type` node into a `target_type` node is allowed.
    ///
    /// Directional lookup; both types must be registered.
    pub fn can_connect(&self, source_type: &str, target_type: &str) -> bool {
        if !self.contains(source_type) || !self.contains(target_type) {
            return false;
        }
        self.connections
            .get(source_type)
            .is_some_and(|targets| targets.contains(target_type))
    }

    /// Node types a `source_type` node may connect into, in registration order
    pub fn allowed_targets(&self, source_type: &str) -> Vec<String> {
        self.order
            .iter()
            .filter(|t| self.can_connect(source_type, t))
            .cloned()
            .collect()
    }
}
