use serde::{Deserialize, Serialize};

use super::namespace;

/// A named category of elements inside one namespace.
///
/// The id is unique within its namespace. The display name is meant to be
/// unique as well, but backends only guarantee "first match" on name lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementType {
    pub namespace: String,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Name of the store this type was read from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
}

impl ElementType {
    /// A new type whose display name defaults to its id.
    pub fn new(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            namespace: namespace.into(),
            name: id.clone(),
            id,
            description: String::new(),
            store_name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Shape check only: id and name present, namespace well formed.
    pub fn is_valid(&self) -> bool {
        namespace::is_valid_name(&self.namespace)
            && namespace::is_valid_name(&self.id)
            && !self.name.trim().is_empty()
    }
}
