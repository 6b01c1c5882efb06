//! Traversal state for one save or load.

use super::descriptor::FieldMeta;
use super::value::Mapped;
use super::MetaStoreObject;
use crate::error::{CoercionFailure, MapError};
use crate::model::{Attribute, AttributeTree, Value};
use crate::security::TwoWayPasswordEncoder;
use std::any::TypeId;
use std::collections::HashSet;

/// Dotted field path of the value being visited, e.g. `attributes[1].level`.
#[derive(Debug, Default, Clone)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn push_field(&mut self, name: &str) {
        self.segments.push(name.to_string());
    }

    pub fn push_index(&mut self, index: usize) {
        self.segments.push(format!("[{}]", index));
    }

    pub fn push_key(&mut self, key: &str) {
        self.segments.push(format!("[{:?}]", key));
    }

    pub fn pop(&mut self) {
        self.segments.pop();
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            if !out.is_empty() && !segment.starts_with('[') {
                out.push('.');
            }
            out.push_str(segment);
        }
        out
    }
}

/// State of an object graph being written to a tree.
pub struct SaveContext<'a> {
    encoder: &'a dyn TwoWayPasswordEncoder,
    pub(crate) path: FieldPath,
    visiting: HashSet<(TypeId, usize)>,
}

impl<'a> SaveContext<'a> {
    pub fn new(encoder: &'a dyn TwoWayPasswordEncoder) -> Self {
        Self {
            encoder,
            path: FieldPath::default(),
            visiting: HashSet::new(),
        }
    }

    pub fn path(&self) -> String {
        self.path.render()
    }

    /// Walk the descriptor of `obj`. An object already on the current path
    /// means the graph is cyclic.
    pub fn save_object<U: MetaStoreObject>(&mut self, obj: &U) -> Result<AttributeTree, MapError> {
        let key = (TypeId::of::<U>(), obj as *const U as usize);
        if !self.visiting.insert(key) {
            return Err(MapError::CyclicGraph { path: self.path() });
        }

        let mut children = Vec::new();
        let mut result = Ok(());
        for field in U::descriptor().fields() {
            self.path.push_field(field.meta().name);
            result = field.save(obj, self, &mut children);
            self.path.pop();
            if result.is_err() {
                break;
            }
        }
        self.visiting.remove(&key);
        result?;

        Ok(AttributeTree {
            value: None,
            children,
        })
    }

    pub(crate) fn save_item<M: Mapped>(
        &mut self,
        item: &M,
        meta: &FieldMeta,
    ) -> Result<AttributeTree, MapError> {
        let mut tree = item.to_tree(self)?;
        if meta.sensitive {
            self.protect(&mut tree)?;
        }
        Ok(tree)
    }

    fn protect(&self, tree: &mut AttributeTree) -> Result<(), MapError> {
        if !tree.children.is_empty() {
            return Err(MapError::SensitiveValue { path: self.path() });
        }
        if let Some(value) = tree.value.take() {
            tree.value = Some(Value::String(self.encoder.encode(&value.to_string())));
        }
        Ok(())
    }
}

/// State of a tree being read back into an object graph.
pub struct LoadContext<'a> {
    encoder: &'a dyn TwoWayPasswordEncoder,
    strict: bool,
    pub(crate) path: FieldPath,
    failures: Vec<CoercionFailure>,
}

impl<'a> LoadContext<'a> {
    pub fn new(encoder: &'a dyn TwoWayPasswordEncoder, strict: bool) -> Self {
        Self {
            encoder,
            strict,
            path: FieldPath::default(),
            failures: Vec::new(),
        }
    }

    pub fn path(&self) -> String {
        self.path.render()
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn into_failures(self) -> Vec<CoercionFailure> {
        self.failures
    }

    /// Build a `U` from its child attributes. Fields without a matching
    /// attribute keep their default.
    pub fn load_object<U: MetaStoreObject>(&mut self, children: &[Attribute]) -> Result<U, MapError> {
        let mut obj = U::default();
        for field in U::descriptor().fields() {
            let found: Vec<&Attribute> = children
                .iter()
                .filter(|a| a.id == field.meta().id)
                .collect();
            if found.is_empty() {
                continue;
            }
            self.path.push_field(field.meta().name);
            let result = field.load(&mut obj, &found, self);
            self.path.pop();
            result?;
        }
        Ok(obj)
    }

    /// The scalar value of `attr`, or a coercion error if it has none.
    pub fn scalar<'v>(&self, attr: &'v Attribute, expected: &'static str) -> Result<&'v Value, MapError> {
        match &attr.value {
            Some(value) => Ok(value),
            None if attr.children.is_empty() => Err(self.missing(expected)),
            None => Err(MapError::Coercion(CoercionFailure {
                path: self.path(),
                expected,
                found: "nested attributes".to_string(),
            })),
        }
    }

    /// Coercion error for a value that cannot become `expected`.
    pub fn mismatch(&self, expected: &'static str, found: &Value) -> MapError {
        MapError::Coercion(CoercionFailure {
            path: self.path(),
            expected,
            found: format!("{} {:?}", found.kind(), found.to_string()),
        })
    }

    pub(crate) fn missing(&self, expected: &'static str) -> MapError {
        MapError::Coercion(CoercionFailure {
            path: self.path(),
            expected,
            found: "nothing".to_string(),
        })
    }

    pub(crate) fn load_item<M: Mapped>(
        &mut self,
        attr: &Attribute,
        meta: &FieldMeta,
    ) -> Result<M, MapError> {
        if !meta.sensitive {
            return M::from_attribute(attr, self);
        }
        let encoded = self.scalar(attr, "encoded secret")?;
        let Some(cipher) = encoded.as_str() else {
            return M::from_attribute(attr, self);
        };
        let decoded = self
            .encoder
            .decode(cipher)
            .ok_or_else(|| self.mismatch("encoded secret", encoded))?;
        M::from_attribute(&Attribute::new(attr.id.clone(), decoded), self)
    }

    /// Turn a per-field coercion failure into a recorded failure unless the
    /// load is strict. Other errors always propagate.
    pub(crate) fn recover<M>(&mut self, result: Result<M, MapError>) -> Result<Option<M>, MapError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(MapError::Coercion(failure)) if !self.strict => {
                log::debug!("tolerated mapping failure: {}", failure);
                self.failures.push(failure);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
