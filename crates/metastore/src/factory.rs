//! Typed access to one element type.
//!
//! [`ElementFactory`] pairs a store with a [`Mapper`] so callers work with
//! their own structs instead of attribute trees. The element type is named
//! after the object's descriptor and is created on first save.

use crate::error::{LoadFailure, MetaStoreError, Result};
use crate::mapper::{Loaded, Mapper, MetaStoreObject};
use crate::model::{Element, ElementType};
use crate::store::MetaStore;
use std::marker::PhantomData;

pub struct ElementFactory<'s, T> {
    store: &'s dyn MetaStore,
    namespace: String,
    mapper: Mapper,
    _marker: PhantomData<fn() -> T>,
}

impl<'s, T: MetaStoreObject> ElementFactory<'s, T> {
    /// A factory over `namespace`, encoding sensitive fields with the store's
    /// password encoder.
    pub fn new(store: &'s dyn MetaStore, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            mapper: Mapper::new(store.password_encoder()),
            _marker: PhantomData,
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.mapper = self.mapper.strict(strict);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    /// The element type for `T`, creating it (and the namespace) if needed.
    pub fn element_type(&self) -> Result<ElementType> {
        if let Some(existing) = self.existing_type()? {
            return Ok(existing);
        }

        match self.store.create_namespace(&self.namespace) {
            Ok(()) | Err(MetaStoreError::NamespaceExists(_)) => {}
            Err(e) => return Err(e),
        }

        let descriptor = T::descriptor();
        let element_type = ElementType::new(&self.namespace, descriptor.type_name())
            .with_description(descriptor.type_description());
        match self.store.create_element_type(&self.namespace, &element_type) {
            Ok(()) => log::debug!(
                "created element type '{}' in namespace '{}'",
                element_type.id,
                self.namespace
            ),
            Err(MetaStoreError::ElementTypeExists { .. }) => {}
            Err(e) => return Err(e),
        }

        self.existing_type()?
            .ok_or_else(|| MetaStoreError::ElementTypeNotFound {
                namespace: self.namespace.clone(),
                id: element_type.id,
            })
    }

    fn existing_type(&self) -> Result<Option<ElementType>> {
        if !self.store.namespace_exists(&self.namespace)? {
            return Ok(None);
        }
        self.store
            .element_type(&self.namespace, T::descriptor().type_name())
    }

    /// Store `object`, replacing any element with the same name.
    pub fn save(&self, object: &T) -> Result<Element> {
        let element_type = self.element_type()?;
        let element = self.mapper.to_element(object)?;
        let exists = self
            .store
            .element(&self.namespace, &element_type, &element.id)?
            .is_some();
        if exists {
            self.store
                .update_element(&self.namespace, &element_type, &element.id, &element)?;
        } else {
            self.store
                .create_element(&self.namespace, &element_type, &element)?;
        }
        Ok(element)
    }

    /// Load the object stored under `name`. Tolerated coercion failures are
    /// logged and the affected fields keep their defaults.
    pub fn load(&self, name: &str) -> Result<Option<T>> {
        Ok(self.load_detailed(name)?.map(Loaded::into_inner))
    }

    /// Like [`load`](Self::load), but hands back the coercion failures.
    pub fn load_detailed(&self, name: &str) -> Result<Option<Loaded<T>>> {
        let Some(element_type) = self.existing_type()? else {
            return Ok(None);
        };
        let element = match self.store.element(&self.namespace, &element_type, name)? {
            Some(element) => element,
            None => match self
                .store
                .element_by_name(&self.namespace, &element_type, name)?
            {
                Some(element) => element,
                None => return Ok(None),
            },
        };
        self.map_element(&element_type, &element).map(Some)
    }

    fn map_element(&self, element_type: &ElementType, element: &Element) -> Result<Loaded<T>> {
        let loaded = self.mapper.from_element::<T>(element)?;
        for failure in &loaded.failures {
            log::warn!(
                "{}/{}/{}: {}",
                self.namespace,
                element_type.id,
                element.id,
                failure
            );
        }
        Ok(loaded)
    }

    /// Every readable object. Elements that cannot be read or mapped are
    /// appended to `failures`.
    pub fn load_all(&self, failures: &mut Vec<LoadFailure>) -> Result<Vec<T>> {
        Ok(self
            .load_all_detailed(failures)?
            .into_iter()
            .map(Loaded::into_inner)
            .collect())
    }

    /// Like [`load_all`](Self::load_all), but keeps the coercion failures
    /// tolerated for each object.
    pub fn load_all_detailed(&self, failures: &mut Vec<LoadFailure>) -> Result<Vec<Loaded<T>>> {
        let Some(element_type) = self.existing_type()? else {
            return Ok(Vec::new());
        };
        let elements = self
            .store
            .elements_tolerant(&self.namespace, &element_type, failures)?;

        let mut objects = Vec::with_capacity(elements.len());
        for element in elements {
            match self.map_element(&element_type, &element) {
                Ok(loaded) => objects.push(loaded),
                Err(error) => failures.push(LoadFailure {
                    element_id: element.id,
                    error,
                }),
            }
        }
        Ok(objects)
    }

    /// Names of all stored objects.
    pub fn names(&self) -> Result<Vec<String>> {
        match self.existing_type()? {
            Some(element_type) => self.store.element_ids(&self.namespace, &element_type),
            None => Ok(Vec::new()),
        }
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let element_type =
            self.existing_type()?
                .ok_or_else(|| MetaStoreError::ElementNotFound {
                    element_type: T::descriptor().type_name().to_string(),
                    id: name.to_string(),
                })?;
        self.store
            .delete_element(&self.namespace, &element_type, name)
    }
}
