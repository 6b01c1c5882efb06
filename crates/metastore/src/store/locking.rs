//! Lock-aware reads.
//!
//! A caller may ask that a read hold off structural mutations while it runs.
//! Backends that can honor this expose a [`ModificationLock`]; for all other
//! backends the adapters below degrade to the plain read. The lock covers a
//! single call only; there are no multi-call transactions.
//!
//! Do not call a mutating store method from inside [`with_lock`]: the guard
//! is held by the calling thread and backend locks are not reentrant.

use super::MetaStore;
use crate::error::{LoadFailure, Result};
use crate::model::{Element, ElementType};

/// Capability of a backend to pause structural mutations.
pub trait ModificationLock {
    /// Block writers until the returned guard is dropped.
    fn lock_modifications(&self) -> Result<ModificationGuard<'_>>;
}

trait Held {}
impl<T> Held for T {}

/// Keeps a backend's modification lock held until dropped.
pub struct ModificationGuard<'a> {
    _held: Box<dyn Held + 'a>,
}

impl<'a> ModificationGuard<'a> {
    /// Wrap any backend-specific guard.
    pub fn new<G: 'a>(guard: G) -> Self {
        Self {
            _held: Box::new(guard),
        }
    }
}

/// Run `op` against `store`, holding its modification lock when `lock` is
/// set and the backend supports one.
pub fn with_lock<S, R>(store: &S, lock: bool, op: impl FnOnce(&S) -> Result<R>) -> Result<R>
where
    S: MetaStore + ?Sized,
{
    let _guard = match (lock, store.modification_lock()) {
        (true, Some(l)) => Some(l.lock_modifications()?),
        (true, None) => {
            log::debug!(
                "store '{}' does not support locking; serving unlocked read",
                store.name()
            );
            None
        }
        (false, _) => None,
    };
    op(store)
}

pub fn element_type_by_name<S: MetaStore + ?Sized>(
    store: &S,
    namespace: &str,
    name: &str,
    lock: bool,
) -> Result<Option<ElementType>> {
    with_lock(store, lock, |s| s.element_type_by_name(namespace, name))
}

pub fn elements<S: MetaStore + ?Sized>(
    store: &S,
    namespace: &str,
    element_type: &ElementType,
    lock: bool,
) -> Result<Vec<Element>> {
    with_lock(store, lock, |s| s.elements(namespace, element_type))
}

pub fn elements_tolerant<S: MetaStore + ?Sized>(
    store: &S,
    namespace: &str,
    element_type: &ElementType,
    lock: bool,
    failures: &mut Vec<LoadFailure>,
) -> Result<Vec<Element>> {
    with_lock(store, lock, |s| {
        s.elements_tolerant(namespace, element_type, failures)
    })
}

pub fn element_by_name<S: MetaStore + ?Sized>(
    store: &S,
    namespace: &str,
    element_type: &ElementType,
    name: &str,
    lock: bool,
) -> Result<Option<Element>> {
    with_lock(store, lock, |s| {
        s.element_by_name(namespace, element_type, name)
    })
}
