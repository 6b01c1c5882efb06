//! # Data Model
//!
//! Pure value types for the store: namespaces, element types, elements,
//! owners and the attribute tree that carries element content. Nothing here
//! performs I/O; the predicates are shape checks only. Uniqueness and
//! existence are enforced by the store backends.
//!
//! ```text
//! namespace
//! └── element type (id, name, description)
//!     └── element (id, name, value, owner)
//!         └── attribute (id, value)
//!             └── attribute ...
//! ```

pub mod attribute;
pub mod element;
pub mod element_type;
pub mod namespace;
pub mod owner;

pub use attribute::{Attribute, AttributeContainer, AttributeTree, Value};
pub use element::Element;
pub use element_type::ElementType;
pub use owner::{ElementOwner, OwnerType};
