//! Type catalog: stable identifiers mapped to zero-argument constructors
//!
//! The catalog is filled by explicit registration at startup and then
//! shared (read-only) by every registry built from it:
//!
//! ```
//! use std::rc::Rc;
//! use custodian_core::{BasicChild, Manageable, ManagedType, Registry, TypeCatalog};
//!
//! let mut catalog = TypeCatalog::new();
//! catalog.register_type::<BasicChild>().unwrap();
//!
//! let registry = Registry::new(Rc::new(catalog));
//! let child = registry.create("worker-1", BasicChild::TYPE_ID).unwrap();
//! assert_eq!(child.key().unwrap(), "worker-1");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::child::{BasicChild, Manageable, ManagedType};
use crate::config::TYPE_ID_MAX_LENGTH;
use crate::errors::{BoxError, RegistryError, Result};
use crate::rules::validation::define_string;

/// Outcome of running a registered constructor
pub type ConstructorResult = std::result::Result<Rc<dyn Manageable>, BoxError>;

type Constructor = Box<dyn Fn() -> ConstructorResult>;

/// Registry of child constructors keyed by type identifier
#[derive(Default)]
pub struct TypeCatalog {
    constructors: BTreeMap<String, Constructor>,
}

impl TypeCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog with the built-in child types registered
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        catalog
            .constructors
            .insert(BasicChild::TYPE_ID.to_string(), Box::new(constructor_for::<BasicChild>()));
        catalog
    }

    /// Register a constructor closure under `type_id`
    ///
    /// Identifiers are checked against the global [`TYPE_ID_MAX_LENGTH`];
    /// `RegistryConfig` cannot raise a registry's limit above it.
    ///
    /// # Errors
    ///
    /// - `Validation` if `type_id` is empty or longer than 2048 characters
    /// - `TypeAlreadyRegistered` if `type_id` already has a constructor
    pub fn register<F>(&mut self, type_id: &str, constructor: F) -> Result<()>
    where
        F: Fn() -> ConstructorResult + 'static,
    {
        define_string("type_id", type_id)
            .not_empty()
            .max_chars(TYPE_ID_MAX_LENGTH)
            .validate()?;
        if self.constructors.contains_key(type_id) {
            return Err(RegistryError::TypeAlreadyRegistered {
                type_id: type_id.to_string(),
            });
        }
        self.constructors
            .insert(type_id.to_string(), Box::new(constructor));
        tracing::debug!(type_id, "type registered");
        Ok(())
    }

    /// Register `T` under `T::TYPE_ID`
    ///
    /// # Errors
    ///
    /// Same as [`TypeCatalog::register`].
    pub fn register_type<T: ManagedType>(&mut self) -> Result<()> {
        self.register(T::TYPE_ID, constructor_for::<T>())
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.constructors.contains_key(type_id)
    }

    /// Registered identifiers, in sorted order
    pub fn type_ids(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Build one new instance of `type_id`
    ///
    /// Unknown identifiers and constructor failures both surface as
    /// `Instantiation`, so callers need not tell them apart. The cause is
    /// `UnknownType` or the constructor's own error.
    ///
    /// # Errors
    ///
    /// `Instantiation`, carrying the cause as its `source`.
    pub fn instantiate(&self, type_id: &str) -> Result<Rc<dyn Manageable>> {
        let constructor = self.constructors.get(type_id).ok_or_else(|| {
            let unknown = RegistryError::UnknownType {
                type_id: type_id.to_string(),
            };
            RegistryError::instantiation(type_id, Box::new(unknown))
        })?;
        constructor().map_err(|cause| RegistryError::instantiation(type_id, cause))
    }
}

impl fmt::Debug for TypeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCatalog")
            .field("type_ids", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn constructor_for<T: ManagedType>() -> impl Fn() -> ConstructorResult {
    || T::instantiate().map(|child| Rc::new(child) as Rc<dyn Manageable>)
}
