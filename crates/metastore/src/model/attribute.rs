//! Attribute tree: the backend-independent value representation.
//!
//! Every element's content is an [`AttributeTree`]: an optional primitive
//! [`Value`] plus an ordered list of child [`Attribute`]s, each of which is
//! itself a value plus children. Attribute ids may repeat; a repeated id is how
//! a collection is represented. Lookups by id return the first match.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A primitive attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
}

impl Value {
    /// Name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::Date(_) => "date",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Date(d) => f.write_str(&d.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Date(value)
    }
}

/// A named node of an attribute tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Attribute {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Attribute>,
}

impl Attribute {
    pub fn new(id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            value: Some(value.into()),
            children: Vec::new(),
        }
    }

    /// An attribute with neither a value nor children.
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: None,
            children: Vec::new(),
        }
    }

    /// Attach a subtree under the given id.
    pub fn from_tree(id: impl Into<String>, tree: AttributeTree) -> Self {
        Self {
            id: id.into(),
            value: tree.value,
            children: tree.children,
        }
    }

    /// Builder-style child append.
    pub fn with_child(mut self, child: Attribute) -> Self {
        self.children.push(child);
        self
    }

    /// True when the attribute carries no value and no children.
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }

    pub fn into_tree(self) -> AttributeTree {
        AttributeTree {
            value: self.value,
            children: self.children,
        }
    }
}

/// The content of an element or of a nested object: a value plus children.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttributeTree {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Attribute>,
}

impl AttributeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
            children: Vec::new(),
        }
    }
}

/// Child access shared by everything that holds an ordered attribute list.
pub trait AttributeContainer {
    fn children(&self) -> &[Attribute];
    fn children_mut(&mut self) -> &mut Vec<Attribute>;

    /// First child with the given id.
    fn child(&self, id: &str) -> Option<&Attribute> {
        self.children().iter().find(|a| a.id == id)
    }

    /// First child with the given id, mutably.
    fn child_mut(&mut self, id: &str) -> Option<&mut Attribute> {
        self.children_mut().iter_mut().find(|a| a.id == id)
    }

    /// All children sharing the id, in insertion order.
    fn children_with_id<'a>(&'a self, id: &'a str) -> Box<dyn Iterator<Item = &'a Attribute> + 'a> {
        Box::new(self.children().iter().filter(move |a| a.id == id))
    }

    fn add_child(&mut self, child: Attribute) {
        self.children_mut().push(child);
    }

    /// Remove every child with the given id, returning how many were removed.
    fn remove_children(&mut self, id: &str) -> usize {
        let children = self.children_mut();
        let before = children.len();
        children.retain(|a| a.id != id);
        before - children.len()
    }

    fn clear_children(&mut self) {
        self.children_mut().clear();
    }
}

impl AttributeContainer for Attribute {
    fn children(&self) -> &[Attribute] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<Attribute> {
        &mut self.children
    }
}

impl AttributeContainer for AttributeTree {
    fn children(&self) -> &[Attribute] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<Attribute> {
        &mut self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Attribute {
        Attribute::empty("root")
            .with_child(Attribute::new("level", "year"))
            .with_child(Attribute::new("level", "month"))
            .with_child(Attribute::new("depth", 2i64))
    }

    #[test]
    fn test_child_returns_first_match() {
        let root = sample();
        let first = root.child("level").unwrap();
        assert_eq!(first.value, Some(Value::String("year".into())));
    }

    #[test]
    fn test_children_with_id_preserves_insertion_order() {
        let root = sample();
        let levels: Vec<_> = root
            .children_with_id("level")
            .map(|a| a.value.clone().unwrap().to_string())
            .collect();
        assert_eq!(levels, vec!["year", "month"]);
    }

    #[test]
    fn test_remove_children_drops_all_matches() {
        let mut root = sample();
        assert_eq!(root.remove_children("level"), 2);
        assert_eq!(root.children.len(), 1);
        assert!(root.child("level").is_none());
    }

    #[test]
    fn test_empty_attribute_detection() {
        assert!(Attribute::empty("x").is_empty());
        assert!(!Attribute::new("x", true).is_empty());
        assert!(!Attribute::empty("x").with_child(Attribute::empty("y")).is_empty());
    }

    #[test]
    fn test_value_display_formats_dates_as_rfc3339() {
        let date = DateTime::parse_from_rfc3339("2024-03-01T10:20:30.500Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(Value::Date(date).to_string(), "2024-03-01T10:20:30.500Z");
    }

    #[test]
    fn test_tree_round_trips_through_attribute() {
        let tree = AttributeTree {
            value: Some(Value::Integer(7)),
            children: vec![Attribute::new("a", "b")],
        };
        let attr = Attribute::from_tree("node", tree.clone());
        assert_eq!(attr.id, "node");
        assert_eq!(attr.into_tree(), tree);
    }
}
