use serde::{Deserialize, Serialize};

use super::attribute::{Attribute, AttributeContainer, AttributeTree, Value};
use super::owner::ElementOwner;

/// A persisted record of an element type.
///
/// `value` and `children` together form the element's attribute tree.
/// Child order is insertion order and is preserved by every backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<ElementOwner>,
    #[serde(default)]
    pub children: Vec<Attribute>,
}

impl Element {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// An element whose name equals its id.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name: Some(name),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_owner(mut self, owner: ElementOwner) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_child(mut self, child: Attribute) -> Self {
        self.children.push(child);
        self
    }

    pub fn has_owner(&self) -> bool {
        self.owner.is_some()
    }

    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn tree(&self) -> AttributeTree {
        AttributeTree {
            value: self.value.clone(),
            children: self.children.clone(),
        }
    }

    pub fn set_tree(&mut self, tree: AttributeTree) {
        self.value = tree.value;
        self.children = tree.children;
    }
}

impl AttributeContainer for Element {
    fn children(&self) -> &[Attribute] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<Attribute> {
        &mut self.children
    }
}
