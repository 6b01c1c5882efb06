use super::locking::{ModificationGuard, ModificationLock};
use super::MetaStore;
use crate::error::{LoadFailure, MetaStoreError, Result};
use crate::model::{namespace, Element, ElementType};
use crate::security::{ObfuscatingEncoder, TwoWayPasswordEncoder};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

struct TypeEntry {
    element_type: ElementType,
    elements: Vec<Element>,
}

struct NamespaceEntry {
    name: String,
    types: Vec<TypeEntry>,
}

/// In-memory metadata store.
///
/// Namespaces, types and elements are kept in insertion order, so "first
/// match" lookups by name return the earliest inserted entity.
///
/// Writers take the modification mutex before the state lock; a locked read
/// (see [`super::locking`]) holds the same mutex and so excludes writers.
pub struct MemoryMetaStore {
    name: String,
    description: String,
    state: RwLock<Vec<NamespaceEntry>>,
    modification: Mutex<()>,
    corrupt: RwLock<HashSet<(String, String, String)>>,
    encoder: Arc<dyn TwoWayPasswordEncoder>,
}

impl Default for MemoryMetaStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

fn poisoned<T>(_: T) -> MetaStoreError {
    MetaStoreError::StoreUnavailable("memory store lock poisoned".to_string())
}

impl MemoryMetaStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            state: RwLock::new(Vec::new()),
            modification: Mutex::new(()),
            corrupt: RwLock::new(HashSet::new()),
            encoder: Arc::new(ObfuscatingEncoder),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Simulate a record the backend can no longer read. The element keeps
    /// its id but every read of it fails.
    pub fn mark_corrupt(&self, namespace: &str, type_id: &str, element_id: &str) {
        if let Ok(mut corrupt) = self.corrupt.write() {
            corrupt.insert((
                namespace.to_string(),
                type_id.to_string(),
                element_id.to_string(),
            ));
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<NamespaceEntry>>> {
        self.state.read().map_err(poisoned)
    }

    fn write(&self) -> Result<(MutexGuard<'_, ()>, RwLockWriteGuard<'_, Vec<NamespaceEntry>>)> {
        let modification = self.modification.lock().map_err(poisoned)?;
        let state = self.state.write().map_err(poisoned)?;
        Ok((modification, state))
    }

    fn check_readable(&self, namespace: &str, type_id: &str, element: &Element) -> Result<()> {
        let corrupt = self.corrupt.read().map_err(poisoned)?;
        let key = (
            namespace.to_string(),
            type_id.to_string(),
            element.id.clone(),
        );
        if corrupt.contains(&key) {
            return Err(MetaStoreError::StoreUnavailable(format!(
                "element '{}' of type '{}' is unreadable",
                element.id, type_id
            )));
        }
        Ok(())
    }

    fn stamped(&self, element_type: &ElementType) -> ElementType {
        let mut t = element_type.clone();
        t.store_name = Some(self.name.clone());
        t
    }
}

fn find_namespace<'a>(state: &'a [NamespaceEntry], namespace: &str) -> Result<&'a NamespaceEntry> {
    state
        .iter()
        .find(|n| n.name == namespace)
        .ok_or_else(|| MetaStoreError::NamespaceNotFound(namespace.to_string()))
}

fn find_namespace_mut<'a>(
    state: &'a mut [NamespaceEntry],
    namespace: &str,
) -> Result<&'a mut NamespaceEntry> {
    state
        .iter_mut()
        .find(|n| n.name == namespace)
        .ok_or_else(|| MetaStoreError::NamespaceNotFound(namespace.to_string()))
}

fn type_not_found(namespace: &str, id: &str) -> MetaStoreError {
    MetaStoreError::ElementTypeNotFound {
        namespace: namespace.to_string(),
        id: id.to_string(),
    }
}

fn find_type<'a>(
    state: &'a [NamespaceEntry],
    namespace: &str,
    type_id: &str,
) -> Result<&'a TypeEntry> {
    find_namespace(state, namespace)?
        .types
        .iter()
        .find(|t| t.element_type.id == type_id)
        .ok_or_else(|| type_not_found(namespace, type_id))
}

fn find_type_mut<'a>(
    state: &'a mut [NamespaceEntry],
    namespace: &str,
    type_id: &str,
) -> Result<&'a mut TypeEntry> {
    find_namespace_mut(state, namespace)?
        .types
        .iter_mut()
        .find(|t| t.element_type.id == type_id)
        .ok_or_else(|| type_not_found(namespace, type_id))
}

impl ModificationLock for MemoryMetaStore {
    fn lock_modifications(&self) -> Result<ModificationGuard<'_>> {
        let guard = self.modification.lock().map_err(poisoned)?;
        Ok(ModificationGuard::new(guard))
    }
}

impl MetaStore for MemoryMetaStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn namespaces(&self) -> Result<Vec<String>> {
        Ok(self.read()?.iter().map(|n| n.name.clone()).collect())
    }

    fn create_namespace(&self, namespace: &str) -> Result<()> {
        namespace::validate_name(namespace)?;
        let (_m, mut state) = self.write()?;
        if state.iter().any(|n| n.name == namespace) {
            return Err(MetaStoreError::NamespaceExists(namespace.to_string()));
        }
        state.push(NamespaceEntry {
            name: namespace.to_string(),
            types: Vec::new(),
        });
        log::debug!("created namespace '{}'", namespace);
        Ok(())
    }

    fn delete_namespace(&self, namespace: &str) -> Result<()> {
        let (_m, mut state) = self.write()?;
        let entry = find_namespace(&state, namespace)?;
        if !entry.types.is_empty() {
            return Err(MetaStoreError::DependenciesExist {
                message: format!("namespace '{}' still contains element types", namespace),
                dependencies: entry
                    .types
                    .iter()
                    .map(|t| t.element_type.id.clone())
                    .collect(),
            });
        }
        state.retain(|n| n.name != namespace);
        log::debug!("deleted namespace '{}'", namespace);
        Ok(())
    }

    fn namespace_exists(&self, namespace: &str) -> Result<bool> {
        Ok(self.read()?.iter().any(|n| n.name == namespace))
    }

    fn element_types(&self, namespace: &str) -> Result<Vec<ElementType>> {
        let state = self.read()?;
        Ok(find_namespace(&state, namespace)?
            .types
            .iter()
            .map(|t| self.stamped(&t.element_type))
            .collect())
    }

    fn element_type(&self, namespace: &str, id: &str) -> Result<Option<ElementType>> {
        let state = self.read()?;
        Ok(find_namespace(&state, namespace)?
            .types
            .iter()
            .find(|t| t.element_type.id == id)
            .map(|t| self.stamped(&t.element_type)))
    }

    fn create_element_type(&self, namespace: &str, element_type: &ElementType) -> Result<()> {
        namespace::validate_name(&element_type.id)?;
        let (_m, mut state) = self.write()?;
        let entry = find_namespace_mut(&mut state, namespace)?;
        if entry.types.iter().any(|t| t.element_type.id == element_type.id) {
            return Err(MetaStoreError::ElementTypeExists {
                namespace: namespace.to_string(),
                id: element_type.id.clone(),
            });
        }
        let mut stored = element_type.clone();
        stored.namespace = namespace.to_string();
        stored.store_name = None;
        entry.types.push(TypeEntry {
            element_type: stored,
            elements: Vec::new(),
        });
        log::debug!("created element type '{}/{}'", namespace, element_type.id);
        Ok(())
    }

    fn update_element_type(&self, namespace: &str, element_type: &ElementType) -> Result<()> {
        let (_m, mut state) = self.write()?;
        let entry = find_type_mut(&mut state, namespace, &element_type.id)?;
        let mut stored = element_type.clone();
        stored.namespace = namespace.to_string();
        stored.store_name = None;
        entry.element_type = stored;
        Ok(())
    }

    fn delete_element_type(&self, namespace: &str, element_type: &ElementType) -> Result<()> {
        let (_m, mut state) = self.write()?;
        let entry = find_namespace_mut(&mut state, namespace)?;
        let pos = entry
            .types
            .iter()
            .position(|t| t.element_type.id == element_type.id)
            .ok_or_else(|| type_not_found(namespace, &element_type.id))?;
        let elements = &entry.types[pos].elements;
        if !elements.is_empty() {
            return Err(MetaStoreError::DependenciesExist {
                message: format!(
                    "element type '{}' still contains elements",
                    element_type.id
                ),
                dependencies: elements.iter().map(|e| e.id.clone()).collect(),
            });
        }
        entry.types.remove(pos);
        log::debug!("deleted element type '{}/{}'", namespace, element_type.id);
        Ok(())
    }

    fn elements(&self, namespace: &str, element_type: &ElementType) -> Result<Vec<Element>> {
        let state = self.read()?;
        let entry = find_type(&state, namespace, &element_type.id)?;
        let mut elements = Vec::with_capacity(entry.elements.len());
        for element in &entry.elements {
            self.check_readable(namespace, &element_type.id, element)?;
            elements.push(element.clone());
        }
        Ok(elements)
    }

    fn elements_tolerant(
        &self,
        namespace: &str,
        element_type: &ElementType,
        failures: &mut Vec<LoadFailure>,
    ) -> Result<Vec<Element>> {
        let state = self.read()?;
        let entry = find_type(&state, namespace, &element_type.id)?;
        let mut elements = Vec::with_capacity(entry.elements.len());
        for element in &entry.elements {
            match self.check_readable(namespace, &element_type.id, element) {
                Ok(()) => elements.push(element.clone()),
                Err(error) => {
                    log::warn!("skipping element '{}': {}", element.id, error);
                    failures.push(LoadFailure {
                        element_id: element.id.clone(),
                        error,
                    });
                }
            }
        }
        Ok(elements)
    }

    fn element_ids(&self, namespace: &str, element_type: &ElementType) -> Result<Vec<String>> {
        let state = self.read()?;
        let entry = find_type(&state, namespace, &element_type.id)?;
        Ok(entry.elements.iter().map(|e| e.id.clone()).collect())
    }

    fn element(
        &self,
        namespace: &str,
        element_type: &ElementType,
        id: &str,
    ) -> Result<Option<Element>> {
        let state = self.read()?;
        let entry = find_type(&state, namespace, &element_type.id)?;
        match entry.elements.iter().find(|e| e.id == id) {
            Some(element) => {
                self.check_readable(namespace, &element_type.id, element)?;
                Ok(Some(element.clone()))
            }
            None => Ok(None),
        }
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
        let (_m, mut state) = self.write()?;
        let entry = find_type_mut(&mut state, namespace, &element_type.id)?;
        if entry.elements.iter().any(|e| e.id == element.id) {
            return Err(MetaStoreError::ElementExists {
                element_type: element_type.id.clone(),
                id: element.id.clone(),
            });
        }
        entry.elements.push(element.clone());
        log::debug!(
            "created element '{}' in '{}/{}'",
            element.id,
            namespace,
            element_type.id
        );
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
        let (_m, mut state) = self.write()?;
        let entry = find_type_mut(&mut state, namespace, &element_type.id)?;
        let pos = entry
            .elements
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| MetaStoreError::ElementNotFound {
                element_type: element_type.id.clone(),
                id: id.to_string(),
            })?;
        if element.id != id && entry.elements.iter().any(|e| e.id == element.id) {
            return Err(MetaStoreError::ElementExists {
                element_type: element_type.id.clone(),
                id: element.id.clone(),
            });
        }
        entry.elements[pos] = element.clone();
        Ok(())
    }

    fn delete_element(&self, namespace: &str, element_type: &ElementType, id: &str) -> Result<()> {
        let (_m, mut state) = self.write()?;
        let entry = find_type_mut(&mut state, namespace, &element_type.id)?;
        let before = entry.elements.len();
        entry.elements.retain(|e| e.id != id);
        if entry.elements.len() == before {
            return Err(MetaStoreError::ElementNotFound {
                element_type: element_type.id.clone(),
                id: id.to_string(),
            });
        }
        log::debug!("deleted element '{}' in '{}/{}'", id, namespace, element_type.id);
        Ok(())
    }

    fn password_encoder(&self) -> Arc<dyn TwoWayPasswordEncoder> {
        Arc::clone(&self.encoder)
    }

    fn set_password_encoder(&mut self, encoder: Arc<dyn TwoWayPasswordEncoder>) {
        self.encoder = encoder;
    }

    fn modification_lock(&self) -> Option<&dyn ModificationLock> {
        Some(self)
    }
}

// --- Test Fixtures ---

#[cfg(any(test, feature = "test_utils"))]
pub mod fixtures {
    use super::*;
    use crate::model::Attribute;

    pub const NAMESPACE: &str = "test";
    pub const TYPE_ID: &str = "connection";

    pub struct StoreFixture {
        pub store: MemoryMetaStore,
        pub element_type: ElementType,
    }

    impl Default for StoreFixture {
        fn default() -> Self {
            Self::new()
        }
    }

    impl StoreFixture {
        /// A store with one namespace holding one empty element type.
        pub fn new() -> Self {
            let store = MemoryMetaStore::new("fixture");
            let element_type = ElementType::new(NAMESPACE, TYPE_ID)
                .with_name("Connection")
                .with_description("Database connections");
            store.create_namespace(NAMESPACE).unwrap();
            store.create_element_type(NAMESPACE, &element_type).unwrap();
            Self {
                store,
                element_type,
            }
        }

        pub fn with_elements(self, count: usize) -> Self {
            for i in 0..count {
                let element = Element::named(format!("element-{}", i + 1))
                    .with_child(Attribute::new("index", i as i64));
                self.store
                    .create_element(NAMESPACE, &self.element_type, &element)
                    .unwrap();
            }
            self
        }
    }
}
