//! Resource state carried by requests, responses, and push messages.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ResourcePath;

/// Snapshot of a resource: identity, location, properties, and members.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Identifier of the resource within its parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Canonical location of the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<ResourcePath>,
    /// Named property values.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    /// Shallow states of member resources.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<ResourceState>,
}

impl ResourceState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the canonical location.
    #[must_use]
    pub fn with_uri(mut self, uri: ResourcePath) -> Self {
        self.uri = Some(uri);
        self
    }

    /// Adds or replaces a property.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_property(name, value);
        self
    }

    /// Adds or replaces a property in place.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }

    /// Looks up a property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Looks up a string property.
    #[must_use]
    pub fn string_property(&self, name: &str) -> Option<&str> {
        self.property(name).and_then(Value::as_str)
    }
}
