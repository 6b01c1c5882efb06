//! # Storage Layer
//!
//! This module defines the store contract. The [`MetaStore`] trait is the
//! operation set every backend implements, whatever the medium underneath.
//!
//! ## Hierarchy
//!
//! ```text
//! namespace ─┬─ element type ─┬─ element
//!            │                └─ element
//!            └─ element type ─── element
//! ```
//!
//! ## Consistency Rules
//!
//! - **Existence**: element types can only be created in an existing
//!   namespace; elements only in an existing type.
//! - **Duplicates**: create operations fail with the matching `*Exists`
//!   error; the existing entity is left untouched.
//! - **Dependency-blocked deletes**: a namespace holding types, or a type
//!   holding elements, cannot be deleted. The error carries the blocking ids.
//! - **Absent is not an error**: single-entity lookups return `Ok(None)`.
//! - **First match**: lookups by display name return the first entity the
//!   backend encounters. Each backend documents its iteration order.
//!
//! ## Tolerant Listing
//!
//! [`MetaStore::elements_tolerant`] keeps going when one element cannot be
//! read. The failure is appended to the caller's collector and the remaining
//! elements are still returned, so one corrupt record never hides its
//! siblings. Backends that cannot isolate failures fall back to
//! [`MetaStore::elements`].
//!
//! ## Locking
//!
//! Some reads accept a lock flag asking the backend to hold off structural
//! mutations for the duration of the call. The flag lives in the adapters of
//! [`locking`], not in the trait: a backend opts in by returning a
//! [`locking::ModificationLock`] from [`MetaStore::modification_lock`], and
//! every other backend silently serves the plain read.
//!
//! ## Implementations
//!
//! - [`memory::MemoryMetaStore`]: in-process maps, honors locking.
//! - [`fs::FsMetaStore`]: one JSON file per element, no locking.

use crate::error::{LoadFailure, Result};
use crate::model::{Element, ElementType};
use crate::security::TwoWayPasswordEncoder;
use std::sync::Arc;

pub mod fs;
pub mod locking;
pub mod memory;

pub use locking::{ModificationGuard, ModificationLock};

/// Abstract interface for metadata storage.
///
/// All methods take `&self`: a store is shared between callers and is
/// responsible for serializing concurrent writers to the same identifier.
pub trait MetaStore: Send + Sync {
    /// Name of this store.
    fn name(&self) -> &str;

    /// Human readable description of this store.
    fn description(&self) -> &str;

    // --- Namespaces ---

    /// All namespaces, in backend order.
    fn namespaces(&self) -> Result<Vec<String>>;

    /// Create a namespace. Fails with `NamespaceExists` on duplicates.
    fn create_namespace(&self, namespace: &str) -> Result<()>;

    /// Delete an empty namespace. Fails with `DependenciesExist` listing the
    /// contained element type ids otherwise.
    fn delete_namespace(&self, namespace: &str) -> Result<()>;

    fn namespace_exists(&self, namespace: &str) -> Result<bool> {
        Ok(self.namespaces()?.iter().any(|n| n == namespace))
    }

    // --- Element types ---

    fn element_types(&self, namespace: &str) -> Result<Vec<ElementType>>;

    fn element_type_ids(&self, namespace: &str) -> Result<Vec<String>> {
        Ok(self
            .element_types(namespace)?
            .into_iter()
            .map(|t| t.id)
            .collect())
    }

    /// Look up a type by id. Absent types yield `Ok(None)`.
    fn element_type(&self, namespace: &str, id: &str) -> Result<Option<ElementType>>;

    /// First type whose display name matches.
    fn element_type_by_name(&self, namespace: &str, name: &str) -> Result<Option<ElementType>> {
        Ok(self
            .element_types(namespace)?
            .into_iter()
            .find(|t| t.name == name))
    }

    /// Create a type. Fails with `ElementTypeExists` on duplicate ids.
    fn create_element_type(&self, namespace: &str, element_type: &ElementType) -> Result<()>;

    /// Replace an existing type's definition.
    fn update_element_type(&self, namespace: &str, element_type: &ElementType) -> Result<()>;

    /// Delete an empty type. Fails with `DependenciesExist` listing the
    /// contained element ids otherwise.
    fn delete_element_type(&self, namespace: &str, element_type: &ElementType) -> Result<()>;

    // --- Elements ---

    /// All elements of a type. Any unreadable element fails the whole call.
    fn elements(&self, namespace: &str, element_type: &ElementType) -> Result<Vec<Element>>;

    /// All readable elements of a type; unreadable ones are appended to
    /// `failures` instead of failing the call.
    fn elements_tolerant(
        &self,
        namespace: &str,
        element_type: &ElementType,
        _failures: &mut Vec<LoadFailure>,
    ) -> Result<Vec<Element>> {
        self.elements(namespace, element_type)
    }

    fn element_ids(&self, namespace: &str, element_type: &ElementType) -> Result<Vec<String>>;

    /// Look up an element by id. Absent elements yield `Ok(None)`.
    fn element(
        &self,
        namespace: &str,
        element_type: &ElementType,
        id: &str,
    ) -> Result<Option<Element>>;

    /// First element whose name matches. Unreadable siblings are skipped.
    fn element_by_name(
        &self,
        namespace: &str,
        element_type: &ElementType,
        name: &str,
    ) -> Result<Option<Element>> {
        let mut failures = Vec::new();
        Ok(self
            .elements_tolerant(namespace, element_type, &mut failures)?
            .into_iter()
            .find(|e| e.name.as_deref() == Some(name)))
    }

    /// Create an element. Fails with `ElementExists` on duplicate ids.
    fn create_element(
        &self,
        namespace: &str,
        element_type: &ElementType,
        element: &Element,
    ) -> Result<()>;

    /// Replace the element stored under `id`. The replacement may carry a
    /// different id, which renames it.
    fn update_element(
        &self,
        namespace: &str,
        element_type: &ElementType,
        id: &str,
        element: &Element,
    ) -> Result<()>;

    fn delete_element(&self, namespace: &str, element_type: &ElementType, id: &str) -> Result<()>;

    fn has_elements(&self, namespace: &str, element_type: &ElementType) -> Result<bool> {
        Ok(!self.element_ids(namespace, element_type)?.is_empty())
    }

    // --- Capabilities ---

    /// Encoder applied to sensitive fields by the mapper.
    fn password_encoder(&self) -> Arc<dyn TwoWayPasswordEncoder>;

    fn set_password_encoder(&mut self, encoder: Arc<dyn TwoWayPasswordEncoder>);

    /// The store's modification lock, if it supports one.
    fn modification_lock(&self) -> Option<&dyn ModificationLock> {
        None
    }
}
