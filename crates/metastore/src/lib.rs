//! # metastore
//!
//! A persistence-agnostic store for structured metadata, plus a mapper that
//! turns plain Rust structs into stored elements and back.
//!
//! ## Layers
//!
//! - [`model`]: namespaces, element types, elements, owners and the
//!   attribute tree that carries element content.
//! - [`store`]: the [`MetaStore`] contract and two backends, in memory and
//!   on the filesystem.
//! - [`mapper`]: descriptor-driven conversion between objects and attribute
//!   trees, with cycle detection, sensitive-field encoding and tolerant
//!   loading.
//! - [`factory`]: typed save/load/list/delete for one object type.
//! - [`config`]: layered configuration and [`config::open_store`].
//!
//! ## Quick Start
//!
//! ```
//! use metastore::store::memory::MemoryMetaStore;
//! use metastore::{Attribute, Element, ElementType, MetaStore};
//!
//! let store = MemoryMetaStore::new("scratch");
//! store.create_namespace("pentaho").unwrap();
//!
//! let dimensions = ElementType::new("pentaho", "Dimension");
//! store.create_element_type("pentaho", &dimensions).unwrap();
//!
//! let time = Element::named("time").with_child(Attribute::new("levels", 3i64));
//! store.create_element("pentaho", &dimensions, &time).unwrap();
//!
//! let loaded = store.element("pentaho", &dimensions, "time").unwrap();
//! assert_eq!(loaded, Some(time));
//! ```

pub mod config;
pub mod error;
pub mod factory;
pub mod mapper;
pub mod model;
pub mod security;
pub mod store;

pub use config::{open_store, MetaStoreConfig};
pub use error::{CoercionFailure, LoadFailure, MapError, MetaStoreError, Result};
pub use factory::ElementFactory;
pub use mapper::{Descriptor, FieldSpec, Loaded, Mapper, MetaStoreObject};
pub use model::{Attribute, AttributeContainer, AttributeTree, Element, ElementOwner, ElementType, OwnerType, Value};
pub use security::{ObfuscatingEncoder, TwoWayPasswordEncoder};
pub use store::MetaStore;
