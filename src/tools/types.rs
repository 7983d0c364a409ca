//! Parameter schemas for tools.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// JSON Schema object describing a tool's input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolParameters {
    pub schema: Value,
}

impl ToolParameters {
    pub fn from_schema(schema: Value) -> Self {
        Self { schema }
    }

    /// A schema that accepts an empty object.
    pub fn empty() -> Self {
        Self::object().build()
    }

    pub fn object() -> ParameterBuilder {
        ParameterBuilder::default()
    }
}

impl Default for ToolParameters {
    fn default() -> Self {
        Self::empty()
    }
}

/// Incremental builder for an object schema.
#[derive(Debug, Default)]
pub struct ParameterBuilder {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl ParameterBuilder {
    pub fn string(self, name: &str, description: &str, required: bool) -> Self {
        self.property(name, json!({"type": "string", "description": description}), required)
    }

    pub fn integer(self, name: &str, description: &str, required: bool) -> Self {
        self.property(name, json!({"type": "integer", "description": description}), required)
    }

    pub fn boolean(self, name: &str, description: &str, required: bool) -> Self {
        self.property(name, json!({"type": "boolean", "description": description}), required)
    }

    pub fn string_enum(self, name: &str, description: &str, values: &[&str], required: bool) -> Self {
        self.property(
            name,
            json!({"type": "string", "description": description, "enum": values}),
            required,
        )
    }

    /// Array whose items follow `items`.
    pub fn array(self, name: &str, description: &str, items: Value, required: bool) -> Self {
        self.property(
            name,
            json!({"type": "array", "description": description, "items": items}),
            required,
        )
    }

    /// Add a property with an arbitrary schema.
    pub fn property(mut self, name: &str, schema: Value, required: bool) -> Self {
        self.properties.insert(name.to_string(), schema);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn build(self) -> ToolParameters {
        ToolParameters {
            schema: json!({
                "type": "object",
                "properties": self.properties,
                "required": self.required,
            }),
        }
    }
}
