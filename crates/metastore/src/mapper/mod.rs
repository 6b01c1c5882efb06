//! # Object Mapping
//!
//! Converts annotated Rust structs to attribute trees and back, so that any
//! backend can persist them as elements.
//!
//! A type opts in by implementing [`MetaStoreObject`], returning a static
//! [`Descriptor`] that lists its persisted fields, and by invoking
//! [`mapped_object!`](crate::mapped_object) so it can also appear nested
//! inside other objects.
//!
//! ```
//! use metastore::mapper::{Descriptor, FieldSpec, Mapper, MetaStoreObject};
//! use metastore::mapped_object;
//! use once_cell::sync::OnceCell;
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Connection {
//!     name: String,
//!     host: String,
//!     password: Option<String>,
//! }
//!
//! impl MetaStoreObject for Connection {
//!     fn descriptor() -> &'static Descriptor<Self> {
//!         static DESCRIPTOR: OnceCell<Descriptor<Connection>> = OnceCell::new();
//!         DESCRIPTOR.get_or_init(|| {
//!             Descriptor::new("Connection")
//!                 .field(FieldSpec::value("name", |c: &Self| &c.name, |c: &mut Self| &mut c.name))
//!                 .field(FieldSpec::value("host", |c: &Self| &c.host, |c: &mut Self| &mut c.host))
//!                 .field(
//!                     FieldSpec::optional("password", |c: &Self| &c.password, |c: &mut Self| &mut c.password)
//!                         .sensitive(),
//!                 )
//!         })
//!     }
//! }
//!
//! mapped_object!(Connection);
//!
//! let mapper = Mapper::default();
//! let conn = Connection {
//!     name: "warehouse".into(),
//!     host: "db.local".into(),
//!     password: Some("secret".into()),
//! };
//! let element = mapper.to_element(&conn).unwrap();
//! assert_eq!(element.id, "warehouse");
//!
//! let loaded = mapper.from_element::<Connection>(&element).unwrap();
//! assert_eq!(loaded.value, conn);
//! ```
//!
//! ## Tree Layout
//!
//! - Each field becomes one child attribute whose id is the field id.
//! - Nested objects become subtrees; list items repeat the field id.
//! - Keyed collections follow the field's [`KeyConvention`].
//! - `None` is omitted unless the field persists empty values. Such a field
//!   saves an [`EMPTY_MARKER`] attribute for `None` and for empty collections.
//!
//! ## Failure Handling
//!
//! Saving fails on a cyclic graph or on a sensitive field that holds a nested
//! object. Loading is tolerant by default: a value that cannot be coerced is
//! skipped, its field keeps the default, and a [`CoercionFailure`] is reported
//! in [`Loaded::failures`]. A strict mapper fails on the first one instead.

mod context;
mod descriptor;
mod value;

pub use context::{FieldPath, LoadContext, SaveContext};
pub use descriptor::{
    Cardinality, Descriptor, FieldMeta, FieldSpec, KeyConvention, Keyed, EMPTY_MARKER, ENTRY_KEY,
    ENTRY_VALUE,
};
pub use value::Mapped;

use crate::error::{CoercionFailure, MapError};
use crate::model::{AttributeContainer, AttributeTree, Element};
use crate::security::{ObfuscatingEncoder, TwoWayPasswordEncoder};
use std::sync::Arc;

/// A struct with a persisted field table.
pub trait MetaStoreObject: Default + 'static {
    fn descriptor() -> &'static Descriptor<Self>;
}

/// The result of a load: the object plus every tolerated coercion failure.
#[derive(Debug)]
pub struct Loaded<T> {
    pub value: T,
    pub failures: Vec<CoercionFailure>,
}

impl<T> Loaded<T> {
    /// True when every attribute converted cleanly.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Converts descriptor-driven objects to and from attribute trees.
#[derive(Clone)]
pub struct Mapper {
    encoder: Arc<dyn TwoWayPasswordEncoder>,
    strict: bool,
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new(Arc::new(ObfuscatingEncoder))
    }
}

impl Mapper {
    pub fn new(encoder: Arc<dyn TwoWayPasswordEncoder>) -> Self {
        Self {
            encoder,
            strict: false,
        }
    }

    /// Fail loads on the first coercion error instead of collecting them.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn to_tree<T: MetaStoreObject>(&self, object: &T) -> Result<AttributeTree, MapError> {
        let mut ctx = SaveContext::new(self.encoder.as_ref());
        ctx.save_object(object)
    }

    pub fn from_tree<T: MetaStoreObject>(&self, tree: &AttributeTree) -> Result<Loaded<T>, MapError> {
        let mut ctx = LoadContext::new(self.encoder.as_ref(), self.strict);
        let value = ctx.load_object(&tree.children)?;
        Ok(Loaded {
            value,
            failures: ctx.into_failures(),
        })
    }

    /// Build an element named after the object's name field. The name ends up
    /// in the element id, so a sensitive name field is refused.
    pub fn to_element<T: MetaStoreObject>(&self, object: &T) -> Result<Element, MapError> {
        let descriptor = T::descriptor();
        let name_field = descriptor.name_field_id();
        if descriptor
            .fields()
            .iter()
            .any(|f| f.meta().id == name_field && f.meta().sensitive)
        {
            return Err(MapError::SensitiveName {
                type_name: descriptor.type_name(),
                field: name_field,
            });
        }
        let tree = self.to_tree(object)?;
        let name = tree
            .child(name_field)
            .and_then(|a| a.value.as_ref())
            .map(|v| v.to_string())
            .filter(|n| !n.is_empty())
            .ok_or(MapError::MissingName {
                type_name: descriptor.type_name(),
                field: name_field,
            })?;

        let mut element = Element::named(name);
        element.set_tree(tree);
        Ok(element)
    }

    pub fn from_element<T: MetaStoreObject>(&self, element: &Element) -> Result<Loaded<T>, MapError> {
        self.from_tree(&element.tree())
    }
}
