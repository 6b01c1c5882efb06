//! Filesystem-backed store.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! └── {namespace}/
//!     └── {type id}/
//!         ├── .type.json          # ElementType definition
//!         └── {element id}.json   # One file per element
//! ```
//!
//! Path components are percent-escaped, so any id is representable. Listings
//! are sorted by id; a name lookup therefore returns the match with the
//! lowest id. Writes go to a temporary file first and are renamed into place.
//!
//! This backend does not support modification locking: the lock flag on
//! reads is accepted and ignored.

use super::MetaStore;
use crate::error::{LoadFailure, MetaStoreError, Result};
use crate::model::{namespace, Element, ElementType};
use crate::security::{ObfuscatingEncoder, TwoWayPasswordEncoder};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

const TYPE_FILE: &str = ".type.json";
const ELEMENT_EXT: &str = ".json";

pub struct FsMetaStore {
    root: PathBuf,
    name: String,
    description: String,
    encoder: Arc<dyn TwoWayPasswordEncoder>,
}

/// Escape a name into a single safe path component.
///
/// ASCII alphanumerics, `-`, `_` and non-leading `.` are kept; every other
/// byte becomes `%XX`.
pub fn encode_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, b) in name.bytes().enumerate() {
        let keep = b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || (b == b'.' && i > 0);
        if keep {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// Reverse of [`encode_file_name`]. Returns `None` for malformed input.
pub fn decode_file_name(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

impl FsMetaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            name: "fs".to_string(),
            description: String::new(),
            encoder: Arc::new(ObfuscatingEncoder),
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

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(encode_file_name(namespace))
    }

    fn type_dir(&self, namespace: &str, type_id: &str) -> PathBuf {
        self.namespace_dir(namespace).join(encode_file_name(type_id))
    }

    /// Path of an element file. Exposed so callers and tests can inspect
    /// what is on disk.
    pub fn element_path(&self, namespace: &str, type_id: &str, element_id: &str) -> PathBuf {
        self.type_dir(namespace, type_id)
            .join(format!("{}{}", encode_file_name(element_id), ELEMENT_EXT))
    }

    fn require_namespace(&self, namespace: &str) -> Result<PathBuf> {
        let dir = self.namespace_dir(namespace);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(MetaStoreError::NamespaceNotFound(namespace.to_string()))
        }
    }

    fn require_type(&self, namespace: &str, type_id: &str) -> Result<PathBuf> {
        self.require_namespace(namespace)?;
        let dir = self.type_dir(namespace, type_id);
        if dir.join(TYPE_FILE).is_file() {
            Ok(dir)
        } else {
            Err(MetaStoreError::ElementTypeNotFound {
                namespace: namespace.to_string(),
                id: type_id.to_string(),
            })
        }
    }

    /// Decoded names of the visible entries of `dir` matching `filter`, sorted.
    fn list_names(&self, dir: &Path, filter: impl Fn(&Path) -> Option<String>) -> Result<Vec<String>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(true, |n| n.starts_with('.'));
            if hidden {
                continue;
            }
            if let Some(name) = filter(&path) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn write_json<T: Serialize>(&self, dir: &Path, target: &Path, value: &T) -> Result<()> {
        let content = serde_json::to_string_pretty(value)?;
        let tmp = dir.join(format!(".tmp-{}", Uuid::new_v4()));
        fs::write(&tmp, content)?;
        fs::rename(&tmp, target)?;
        Ok(())
    }

    fn read_type(&self, namespace: &str, dir: &Path) -> Result<ElementType> {
        let content = fs::read_to_string(dir.join(TYPE_FILE))?;
        let mut element_type: ElementType = serde_json::from_str(&content)?;
        element_type.namespace = namespace.to_string();
        element_type.store_name = Some(self.name.clone());
        Ok(element_type)
    }

    fn read_element(&self, path: &Path) -> Result<Element> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl MetaStore for FsMetaStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn namespaces(&self) -> Result<Vec<String>> {
        self.list_names(&self.root, |path| {
            if !path.is_dir() {
                return None;
            }
            path.file_name()
                .and_then(|n| n.to_str())
                .and_then(decode_file_name)
        })
    }

    fn create_namespace(&self, namespace: &str) -> Result<()> {
        namespace::validate_name(namespace)?;
        let dir = self.namespace_dir(namespace);
        if dir.exists() {
            return Err(MetaStoreError::NamespaceExists(namespace.to_string()));
        }
        fs::create_dir_all(&dir)?;
        log::debug!("created namespace '{}' at {}", namespace, dir.display());
        Ok(())
    }

    fn delete_namespace(&self, namespace: &str) -> Result<()> {
        let dir = self.require_namespace(namespace)?;
        let type_ids = self.element_type_ids(namespace)?;
        if !type_ids.is_empty() {
            return Err(MetaStoreError::DependenciesExist {
                message: format!("namespace '{}' still contains element types", namespace),
                dependencies: type_ids,
            });
        }
        fs::remove_dir_all(&dir)?;
        log::debug!("deleted namespace '{}'", namespace);
        Ok(())
    }

    fn namespace_exists(&self, namespace: &str) -> Result<bool> {
        Ok(namespace::is_valid_name(namespace) && self.namespace_dir(namespace).is_dir())
    }

    fn element_types(&self, namespace: &str) -> Result<Vec<ElementType>> {
        let ids = self.element_type_ids(namespace)?;
        ids.iter()
            .map(|id| self.read_type(namespace, &self.type_dir(namespace, id)))
            .collect()
    }

    fn element_type_ids(&self, namespace: &str) -> Result<Vec<String>> {
        let dir = self.require_namespace(namespace)?;
        self.list_names(&dir, |path| {
            if !path.join(TYPE_FILE).is_file() {
                return None;
            }
            path.file_name()
                .and_then(|n| n.to_str())
                .and_then(decode_file_name)
        })
    }

    fn element_type(&self, namespace: &str, id: &str) -> Result<Option<ElementType>> {
        self.require_namespace(namespace)?;
        let dir = self.type_dir(namespace, id);
        if !dir.join(TYPE_FILE).is_file() {
            return Ok(None);
        }
        self.read_type(namespace, &dir).map(Some)
    }

    fn create_element_type(&self, namespace: &str, element_type: &ElementType) -> Result<()> {
        namespace::validate_name(&element_type.id)?;
        self.require_namespace(namespace)?;
        let dir = self.type_dir(namespace, &element_type.id);
        let type_file = dir.join(TYPE_FILE);
        if type_file.exists() {
            return Err(MetaStoreError::ElementTypeExists {
                namespace: namespace.to_string(),
                id: element_type.id.clone(),
            });
        }
        fs::create_dir_all(&dir)?;
        let mut stored = element_type.clone();
        stored.namespace = namespace.to_string();
        stored.store_name = None;
        self.write_json(&dir, &type_file, &stored)?;
        log::debug!("created element type '{}/{}'", namespace, element_type.id);
        Ok(())
    }

    fn update_element_type(&self, namespace: &str, element_type: &ElementType) -> Result<()> {
        let dir = self.require_type(namespace, &element_type.id)?;
        let mut stored = element_type.clone();
        stored.namespace = namespace.to_string();
        stored.store_name = None;
        self.write_json(&dir, &dir.join(TYPE_FILE), &stored)
    }

    fn delete_element_type(&self, namespace: &str, element_type: &ElementType) -> Result<()> {
        let dir = self.require_type(namespace, &element_type.id)?;
        let element_ids = self.element_ids(namespace, element_type)?;
        if !element_ids.is_empty() {
            return Err(MetaStoreError::DependenciesExist {
                message: format!(
                    "element type '{}' still contains elements",
                    element_type.id
                ),
                dependencies: element_ids,
            });
        }
        fs::remove_dir_all(&dir)?;
        log::debug!("deleted element type '{}/{}'", namespace, element_type.id);
        Ok(())
    }

    fn elements(&self, namespace: &str, element_type: &ElementType) -> Result<Vec<Element>> {
        self.element_ids(namespace, element_type)?
            .iter()
            .map(|id| self.read_element(&self.element_path(namespace, &element_type.id, id)))
            .collect()
    }

    fn elements_tolerant(
        &self,
        namespace: &str,
        element_type: &ElementType,
        failures: &mut Vec<LoadFailure>,
    ) -> Result<Vec<Element>> {
        let ids = self.element_ids(namespace, element_type)?;
        let mut elements = Vec::with_capacity(ids.len());
        for id in ids {
            let path = self.element_path(namespace, &element_type.id, &id);
            match self.read_element(&path) {
                Ok(element) => elements.push(element),
                Err(error) => {
                    log::warn!("skipping unreadable element {}: {}", path.display(), error);
                    failures.push(LoadFailure {
                        element_id: id,
                        error,
                    });
                }
            }
        }
        Ok(elements)
    }

    fn element_ids(&self, namespace: &str, element_type: &ElementType) -> Result<Vec<String>> {
        let dir = self.require_type(namespace, &element_type.id)?;
        self.list_names(&dir, |path| {
            if !path.is_file() {
                return None;
            }
            path.file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(ELEMENT_EXT))
                .and_then(decode_file_name)
        })
    }

    fn element(
        &self,
        namespace: &str,
        element_type: &ElementType,
        id: &str,
    ) -> Result<Option<Element>> {
        self.require_type(namespace, &element_type.id)?;
        let path = self.element_path(namespace, &element_type.id, id);
        if !path.is_file() {
            return Ok(None);
        }
        self.read_element(&path).map(Some)
    }

    fn create_element(
        &self,
        namespace: &str,
        element_type: &ElementType,
        element: &Element,
    ) -> Result<()> {
        if element.id.is_empty() {
            return Err(MetaStoreError::InvalidName("element id is empty".to_string()));
        }
        let dir = self.require_type(namespace, &element_type.id)?;
        let path = self.element_path(namespace, &element_type.id, &element.id);
        if path.exists() {
            return Err(MetaStoreError::ElementExists {
                element_type: element_type.id.clone(),
                id: element.id.clone(),
            });
        }
        self.write_json(&dir, &path, element)?;
        log::debug!("created element {}", path.display());
        Ok(())
    }

    fn update_element(
        &self,
        namespace: &str,
        element_type: &ElementType,
        id: &str,
        element: &Element,
    ) -> Result<()> {
        if element.id.is_empty() {
            return Err(MetaStoreError::InvalidName("element id is empty".to_string()));
        }
        let dir = self.require_type(namespace, &element_type.id)?;
        let old_path = self.element_path(namespace, &element_type.id, id);
        if !old_path.is_file() {
            return Err(MetaStoreError::ElementNotFound {
                element_type: element_type.id.clone(),
                id: id.to_string(),
            });
        }
        let new_path = self.element_path(namespace, &element_type.id, &element.id);
        if new_path != old_path && new_path.exists() {
            return Err(MetaStoreError::ElementExists {
                element_type: element_type.id.clone(),
                id: element.id.clone(),
            });
        }
        self.write_json(&dir, &new_path, element)?;
        if new_path != old_path {
            fs::remove_file(&old_path)?;
        }
        Ok(())
    }

    fn delete_element(&self, namespace: &str, element_type: &ElementType, id: &str) -> Result<()> {
        self.require_type(namespace, &element_type.id)?;
        let path = self.element_path(namespace, &element_type.id, id);
        if !path.is_file() {
            return Err(MetaStoreError::ElementNotFound {
                element_type: element_type.id.clone(),
                id: id.to_string(),
            });
        }
        fs::remove_file(&path)?;
        log::debug!("deleted element {}", path.display());
        Ok(())
    }

    fn password_encoder(&self) -> Arc<dyn TwoWayPasswordEncoder> {
        Arc::clone(&self.encoder)
    }

    fn set_password_encoder(&mut self, encoder: Arc<dyn TwoWayPasswordEncoder>) {
        self.encoder = encoder;
    }
}
