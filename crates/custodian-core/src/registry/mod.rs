//! The registry: owner of the key -> child table
//!
//! A `Registry` is a cheap, cloneable handle; clones refer to the same
//! table. The registry holds the owning reference to each tracked child and
//! each child holds only a [`WeakRegistry`] back to it.
//!
//! ## Lifecycle
//!
//! `Open -> Closed`, one-way. Once closed every operation except
//! [`Registry::is_closed`] fails with `RegistryClosed`, including a second
//! [`Registry::close`]: closing is not idempotent.
//!
//! ## Threading
//!
//! Handles are `!Send` and `!Sync`: one registry is confined to the thread
//! that built it, and the table is never mutated concurrently.
//!
//! ## Logging Ownership
//!
//! The registry owns boundary logging for mutating operations (`create`,
//! `close_child`, `close`). Reads and child-side transitions only use
//! `tracing::debug!` / `tracing::trace!`.

mod weak;

pub use weak::WeakRegistry;

use std::any::{type_name, TypeId};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

use custodian_core_types::RegistryId;

use crate::catalog::TypeCatalog;
use crate::child::{concrete_type_id, release_detached, ChildCore, Manageable, ManagedType};
use crate::config::RegistryConfig;
use crate::errors::{RegistryError, Result};
use crate::rules::invariants;
use crate::rules::validation::define_string;
use crate::{log_op_end, log_op_error, log_op_start};

/// Key -> child table owned by a registry
pub type ChildTable = HashMap<String, Rc<dyn Manageable>>;

/// Registry lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryStatus {
    Open,
    Closed,
}

pub(crate) struct Shared {
    id: RegistryId,
    config: RegistryConfig,
    catalog: Rc<TypeCatalog>,
    status: Cell<RegistryStatus>,
    children: RefCell<ChildTable>,
}

/// Handle to a parent-owned child registry
#[derive(Clone)]
pub struct Registry {
    shared: Rc<Shared>,
}

impl Registry {
    /// Create an open, empty registry using the default identifier limits
    pub fn new(catalog: Rc<TypeCatalog>) -> Self {
        Self::with_config(catalog, RegistryConfig::default())
    }

    /// Create an open, empty registry with explicit identifier limits
    pub fn with_config(catalog: Rc<TypeCatalog>, config: RegistryConfig) -> Self {
        let shared = Rc::new(Shared {
            id: RegistryId::new(),
            config,
            catalog,
            status: Cell::new(RegistryStatus::Open),
            children: RefCell::new(ChildTable::new()),
        });
        tracing::debug!(registry_id = shared.id.as_str(), "registry opened");
        Self { shared }
    }

    pub fn id(&self) -> &RegistryId {
        &self.shared.id
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.shared.config
    }

    pub fn catalog(&self) -> &Rc<TypeCatalog> {
        &self.shared.catalog
    }

    /// Non-owning handle, as handed to children on `initialize`
    pub fn downgrade(&self) -> WeakRegistry {
        WeakRegistry {
            shared: Rc::downgrade(&self.shared),
        }
    }

    pub fn status(&self) -> RegistryStatus {
        self.shared.status.get()
    }

    /// Whether `close` has completed. Never fails.
    pub fn is_closed(&self) -> bool {
        self.status() == RegistryStatus::Closed
    }

    // ===== Creation =====

    /// Instantiate `type_id`, bind it under `key` and return it
    ///
    /// All-or-nothing: on any failure the table is left exactly as before.
    ///
    /// # Errors
    ///
    /// - `RegistryClosed` if the registry is closed
    /// - `Validation` if `key` or `type_id` is empty or over its length limit
    /// - `DuplicateKey` if `key` is already bound
    /// - `Instantiation` if the type is unknown or construction fails
    /// - any error from the child's `initialize` (the entry is rolled back)
    pub fn create(&self, key: &str, type_id: &str) -> Result<Rc<dyn Manageable>> {
        self.logged_create(key, type_id, None)
    }

    /// Create a child keyed by its own type identifier
    ///
    /// # Errors
    ///
    /// Same as [`Registry::create`].
    pub fn create_default(&self, type_id: &str) -> Result<Rc<dyn Manageable>> {
        self.create(type_id, type_id)
    }

    /// Create a `T` keyed by `T::TYPE_ID`
    ///
    /// # Errors
    ///
    /// Same as [`Registry::create`]; additionally `Instantiation` if the
    /// constructor registered under `T::TYPE_ID` builds some other type.
    pub fn create_type<T: ManagedType>(&self) -> Result<Rc<T>> {
        self.create_type_keyed::<T>(T::TYPE_ID)
    }

    /// Create a `T` under an explicit key
    ///
    /// # Errors
    ///
    /// Same as [`Registry::create_type`].
    pub fn create_type_keyed<T: ManagedType>(&self, key: &str) -> Result<Rc<T>> {
        let child = self.logged_create(key, T::TYPE_ID, Some((TypeId::of::<T>(), type_name::<T>())))?;
        downcast_child::<T>(key, child)
    }

    fn logged_create(
        &self,
        key: &str,
        type_id: &str,
        expected: Option<(TypeId, &'static str)>,
    ) -> Result<Rc<dyn Manageable>> {
        log_op_start!(
            "create",
            registry_id = self.shared.id.as_str(),
            key = key,
            type_id = type_id
        );
        let start = Instant::now();

        let child = self.create_impl(key, type_id, expected).map_err(|e| {
            log_op_error!(
                "create",
                &e,
                duration_ms = start.elapsed().as_millis() as u64,
                registry_id = self.shared.id.as_str(),
                key = key
            );
            e
        })?;

        log_op_end!(
            "create",
            duration_ms = start.elapsed().as_millis() as u64,
            registry_id = self.shared.id.as_str(),
            key = key
        );
        Ok(child)
    }

    fn create_impl(
        &self,
        key: &str,
        type_id: &str,
        expected: Option<(TypeId, &'static str)>,
    ) -> Result<Rc<dyn Manageable>> {
        self.ensure_open()?;
        self.validate_key(key)?;
        define_string("type_id", type_id)
            .not_empty()
            .max_chars(self.shared.config.type_id_max_len())
            .validate()?;

        if self.children()?.contains_key(key) {
            return Err(RegistryError::DuplicateKey {
                key: key.to_string(),
            });
        }

        let child = self.shared.catalog.instantiate(type_id)?;
        if let Some((expected_type, expected_name)) = expected {
            if concrete_type_id(child.as_ref()) != expected_type {
                let mismatch = RegistryError::TypeMismatch {
                    key: key.to_string(),
                    expected: expected_name,
                };
                return Err(RegistryError::instantiation(type_id, Box::new(mismatch)));
            }
        }

        self.children_mut()?
            .insert(key.to_string(), Rc::clone(&child));

        if let Err(err) = child.initialize(&self.downgrade(), key) {
            self.roll_back(key, &child)?;
            return Err(err);
        }

        tracing::debug!(
            registry_id = self.shared.id.as_str(),
            key,
            type_id,
            "child bound"
        );
        Ok(child)
    }

    /// Undo a store whose `initialize` failed
    fn roll_back(&self, key: &str, child: &Rc<dyn Manageable>) -> Result<()> {
        let mut children = self.children_mut()?;
        if children.get(key).is_some_and(|bound| Rc::ptr_eq(bound, child)) {
            children.remove(key);
        }
        invariants::ensure_removed(&children, key)?;
        tracing::debug!(
            registry_id = self.shared.id.as_str(),
            key,
            "create rolled back"
        );
        Ok(())
    }

    // ===== Queries =====

    /// Child bound under `key`, or `None`
    ///
    /// # Errors
    ///
    /// `RegistryClosed`, or `Validation` for a malformed key. A missing key
    /// is not an error.
    pub fn get(&self, key: &str) -> Result<Option<Rc<dyn Manageable>>> {
        self.ensure_open()?;
        self.validate_key(key)?;
        let child = self.children()?.get(key).cloned();
        tracing::trace!(key, found = child.is_some(), "get");
        Ok(child)
    }

    /// Child bound under `key`, as its concrete type
    ///
    /// # Errors
    ///
    /// Same as [`Registry::get`]; additionally `TypeMismatch` if the bound
    /// child is not a `T`.
    pub fn get_as<T: Manageable>(&self, key: &str) -> Result<Option<Rc<T>>> {
        self.get(key)?
            .map(|child| downcast_child::<T>(key, child))
            .transpose()
    }

    /// # Errors
    ///
    /// `RegistryClosed`, or `Validation` for a malformed key.
    pub fn contains_child(&self, key: &str) -> Result<bool> {
        self.ensure_open()?;
        self.validate_key(key)?;
        Ok(self.children()?.contains_key(key))
    }

    /// # Errors
    ///
    /// `RegistryClosed`.
    pub fn child_count(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.children()?.len())
    }

    /// Owned snapshot of the bound keys; later mutation does not affect it
    ///
    /// # Errors
    ///
    /// `RegistryClosed`.
    pub fn keys(&self) -> Result<BTreeSet<String>> {
        self.ensure_open()?;
        Ok(self.children()?.keys().cloned().collect())
    }

    /// Check every binding in the table
    ///
    /// # Errors
    ///
    /// `RegistryClosed`, or `Internal` describing the first violation.
    pub fn check_invariants(&self) -> Result<()> {
        self.ensure_open()?;
        let children = self.children()?;
        invariants::validate_table(&children, self)
    }

    // ===== Teardown =====

    /// Unbind the child under `key` and release it
    ///
    /// Runs the child's release step directly rather than its `close`, so
    /// the child does not try to remove itself a second time.
    ///
    /// # Errors
    ///
    /// `RegistryClosed`, or `Validation` for a malformed key. An unbound key
    /// yields `Ok(None)`.
    pub fn close_child(&self, key: &str) -> Result<Option<Rc<dyn Manageable>>> {
        log_op_start!(
            "close_child",
            registry_id = self.shared.id.as_str(),
            key = key
        );
        let start = Instant::now();

        let removed = self.close_child_impl(key).map_err(|e| {
            log_op_error!(
                "close_child",
                &e,
                duration_ms = start.elapsed().as_millis() as u64,
                registry_id = self.shared.id.as_str(),
                key = key
            );
            e
        })?;

        log_op_end!(
            "close_child",
            duration_ms = start.elapsed().as_millis() as u64,
            registry_id = self.shared.id.as_str(),
            key = key,
            removed = removed.is_some()
        );
        Ok(removed)
    }

    fn close_child_impl(&self, key: &str) -> Result<Option<Rc<dyn Manageable>>> {
        self.ensure_open()?;
        self.validate_key(key)?;

        let removed = self.children_mut()?.remove(key);
        if let Some(child) = &removed {
            release_detached(child.as_ref());
            invariants::ensure_removed(&*self.children()?, key)?;
        }
        Ok(removed)
    }

    /// Close every child, then the registry itself
    ///
    /// Not idempotent: closing a closed registry fails.
    ///
    /// # Errors
    ///
    /// `RegistryClosed` if already closed; `Internal` if children remain
    /// bound after the sweep (the registry then stays open).
    pub fn close(&self) -> Result<()> {
        log_op_start!("close", registry_id = self.shared.id.as_str());
        let start = Instant::now();

        let released = self.close_impl().map_err(|e| {
            log_op_error!(
                "close",
                &e,
                duration_ms = start.elapsed().as_millis() as u64,
                registry_id = self.shared.id.as_str()
            );
            e
        })?;

        log_op_end!(
            "close",
            duration_ms = start.elapsed().as_millis() as u64,
            registry_id = self.shared.id.as_str(),
            child_count = released
        );
        Ok(())
    }

    fn close_impl(&self) -> Result<u64> {
        self.ensure_open()?;

        let keys = self.keys()?;
        for key in &keys {
            self.close_child(key)?;
        }
        invariants::ensure_empty(&*self.children()?)?;

        self.shared.status.set(RegistryStatus::Closed);
        Ok(keys.len() as u64)
    }

    /// Remove the table entry for a child that is closing itself
    ///
    /// Only unbinds `key` if it is bound to the child owning `core`; a
    /// closed registry has nothing bound.
    pub(crate) fn detach(&self, key: &str, core: &ChildCore) -> Result<Option<Rc<dyn Manageable>>> {
        if self.is_closed() {
            return Ok(None);
        }

        let mut children = self.children_mut()?;
        let bound_here = children
            .get(key)
            .is_some_and(|bound| std::ptr::eq(bound.core(), core));
        if !bound_here {
            return Ok(None);
        }

        let removed = children.remove(key);
        invariants::ensure_removed(&children, key)?;
        tracing::debug!(
            registry_id = self.shared.id.as_str(),
            key,
            "child detached"
        );
        Ok(removed)
    }

    // ===== Internals =====

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(RegistryError::RegistryClosed {
                registry_id: self.shared.id.to_string(),
            });
        }
        Ok(())
    }

    fn validate_key(&self, key: &str) -> Result<()> {
        define_string("key", key)
            .not_empty()
            .max_chars(self.shared.config.key_max_len())
            .validate()
    }

    fn children(&self) -> Result<Ref<'_, ChildTable>> {
        self.shared
            .children
            .try_borrow()
            .map_err(|_| reentrant_access())
    }

    fn children_mut(&self) -> Result<RefMut<'_, ChildTable>> {
        self.shared
            .children
            .try_borrow_mut()
            .map_err(|_| reentrant_access())
    }
}

fn reentrant_access() -> RegistryError {
    RegistryError::Internal {
        invariant: "child table accessed re-entrantly while being modified".to_string(),
    }
}

fn downcast_child<T: Manageable>(key: &str, child: Rc<dyn Manageable>) -> Result<Rc<T>> {
    child
        .into_any_rc()
        .downcast::<T>()
        .map_err(|_| RegistryError::TypeMismatch {
            key: key.to_string(),
            expected: type_name::<T>(),
        })
}

/// Registries compare by identity
impl PartialEq for Registry {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for Registry {}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Option<BTreeSet<String>> = self
            .shared
            .children
            .try_borrow()
            .ok()
            .map(|children| children.keys().cloned().collect());
        f.debug_struct("Registry")
            .field("id", &self.shared.id)
            .field("status", &self.shared.status.get())
            .field("keys", &keys)
            .finish()
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if self.status.get() == RegistryStatus::Closed {
            return;
        }
        let children = std::mem::take(self.children.get_mut());
        let released = children.len();
        for child in children.into_values() {
            release_detached(child.as_ref());
        }
        self.status.set(RegistryStatus::Closed);
        tracing::debug!(
            registry_id = self.id.as_str(),
            released,
            "open registry dropped; children released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::child::{BasicChild, Lifecycle};

    fn registry() -> Registry {
        Registry::new(Rc::new(TypeCatalog::with_defaults()))
    }

    #[test]
    fn test_new_registry_is_open_and_empty() {
        let registry = registry();
        assert!(!registry.is_closed());
        assert_eq!(registry.status(), RegistryStatus::Open);
        assert_eq!(registry.child_count().unwrap(), 0);
        assert!(registry.keys().unwrap().is_empty());
    }

    #[test]
    fn test_clones_share_the_table() {
        let registry = registry();
        let alias = registry.clone();
        registry.create("k", BasicChild::TYPE_ID).unwrap();

        assert_eq!(registry, alias);
        assert!(alias.contains_child("k").unwrap());
    }

    #[test]
    fn test_distinct_registries_are_not_equal() {
        assert_ne!(registry(), registry());
    }

    #[test]
    fn test_weak_handle_points_to_registry() {
        let registry = registry();
        let weak = registry.downgrade();
        assert!(weak.points_to(&registry));
        assert!(!weak.is_dangling());
        assert_eq!(weak.upgrade().unwrap(), registry);
    }

    #[test]
    fn test_drop_releases_open_children() {
        let child = {
            let registry = registry();
            registry.create("k", BasicChild::TYPE_ID).unwrap()
        };
        assert_eq!(child.lifecycle(), Lifecycle::Closed);
        assert_eq!(child.key().unwrap(), "k");
    }

    #[test]
    fn test_weak_handle_dangles_after_drop() {
        let weak = registry().downgrade();
        assert!(weak.is_dangling());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_debug_lists_keys() {
        let registry = registry();
        registry.create("alpha", BasicChild::TYPE_ID).unwrap();
        let rendered = format!("{:?}", registry);
        assert!(rendered.contains("alpha"));
        assert!(rendered.contains("Open"));
    }

    #[test]
    fn test_check_invariants_on_healthy_registry() {
        let registry = registry();
        registry.create("a", BasicChild::TYPE_ID).unwrap();
        registry.create("b", BasicChild::TYPE_ID).unwrap();
        assert!(registry.check_invariants().is_ok());
    }
}
