//! JSON-Schema subset used to describe tool inputs and outputs.

use serde::Serialize;
use std::collections::BTreeMap;

pub type Properties = BTreeMap<String, PropertySchema>;

/// Top level `inputSchema` / `outputSchema` of a tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: Properties,
    pub required: Vec<String>,
}

impl ToolSchema {
    pub fn object() -> Self {
        Self {
            kind: "object".to_string(),
            properties: Properties::new(),
            required: Vec::new(),
        }
    }

    pub fn property(mut self, name: &str, schema: PropertySchema) -> Self {
        self.properties.insert(name.to_string(), schema);
        self
    }

    /// Adds a property and marks it required.
    pub fn required_property(mut self, name: &str, schema: PropertySchema) -> Self {
        self.required.push(name.to_string());
        self.property(name, schema)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
}

impl PropertySchema {
    fn of(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            description: None,
            items: None,
            properties: None,
        }
    }

    pub fn string() -> Self {
        Self::of("string")
    }

    pub fn integer() -> Self {
        Self::of("integer")
    }

    pub fn boolean() -> Self {
        Self::of("boolean")
    }

    pub fn array(items: PropertySchema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::of("array")
        }
    }

    pub fn object(properties: impl IntoIterator<Item = (&'static str, PropertySchema)>) -> Self {
        Self {
            properties: Some(
                properties
                    .into_iter()
                    .map(|(name, schema)| (name.to_string(), schema))
                    .collect(),
            ),
            ..Self::of("object")
        }
    }

    /// Free-form item type, such as `resource`.
    pub fn named(kind: &str) -> Self {
        Self::of(kind)
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}
