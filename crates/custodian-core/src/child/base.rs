use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;

use crate::errors::{RegistryError, Result};
use crate::registry::{Registry, WeakRegistry};
use crate::rules::validation::{define_string, require_present};

/// Lifecycle of a managed child
///
/// `Uninitialized -> Active -> Closed`, one-way. `initialize` is the only
/// way into `Active`; a close (self- or registry-initiated) is the only way
/// into `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifecycle {
    #[default]
    Uninitialized,
    Active,
    Closed,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Lifecycle::Uninitialized => "uninitialized",
            Lifecycle::Active => "active",
            Lifecycle::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Binding state shared by every managed child
///
/// Embed one in a child type and return it from `Manageable::core`; the
/// trait's provided methods implement the standard bind/close protocol on
/// top of it. All methods take `&self` so a child can be closed through a
/// shared handle while the registry still holds its own.
#[derive(Default)]
pub struct ChildCore {
    key: OnceCell<String>,
    parent: RefCell<Option<WeakRegistry>>,
    lifecycle: Cell<Lifecycle>,
}

impl ChildCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.get()
    }

    /// The bound key, if `bind` has succeeded. Survives close.
    pub fn key(&self) -> Option<&str> {
        self.key.get().map(String::as_str)
    }

    /// Bind the parent handle and key, moving the child to `Active`
    ///
    /// # Errors
    ///
    /// - `Validation` if `key` is empty or `parent` no longer refers to a live registry
    /// - `ChildAlreadyBound` if the child was bound before (key and parent bind once)
    pub fn bind(&self, parent: &WeakRegistry, key: &str) -> Result<()> {
        define_string("key", key).not_empty().validate()?;
        require_present("parent", parent.upgrade())?;

        if let Some(existing) = self.key() {
            return Err(RegistryError::ChildAlreadyBound {
                key: existing.to_string(),
            });
        }
        self.key
            .set(key.to_string())
            .map_err(|_| RegistryError::ChildAlreadyBound {
                key: key.to_string(),
            })?;
        *self.parent.borrow_mut() = Some(parent.clone());
        self.lifecycle.set(Lifecycle::Active);
        Ok(())
    }

    /// The key of an `Active` child
    ///
    /// # Errors
    ///
    /// `ChildUninitialized` before `bind`, `ChildClosed` after close.
    pub fn active_key(&self) -> Result<&str> {
        match (self.lifecycle.get(), self.key()) {
            (Lifecycle::Active, Some(key)) => Ok(key),
            (Lifecycle::Closed, Some(key)) => Err(RegistryError::ChildClosed {
                key: key.to_string(),
            }),
            _ => Err(RegistryError::ChildUninitialized),
        }
    }

    /// Strong handle to the registry this child is bound to
    ///
    /// # Errors
    ///
    /// `ChildUninitialized`, `ChildClosed`, or `ParentDropped` when the
    /// registry no longer exists.
    pub fn parent(&self) -> Result<Registry> {
        let key = self.active_key()?;
        self.parent
            .borrow()
            .as_ref()
            .and_then(WeakRegistry::upgrade)
            .ok_or_else(|| RegistryError::ParentDropped {
                key: key.to_string(),
            })
    }

    /// Standard self-initiated close
    ///
    /// Detaches this child from its registry if the registry still binds
    /// this exact instance under its key, drops the parent link, marks the
    /// core `Closed` and only then runs `release`. A close reached again from
    /// inside `release` therefore fails with `ChildClosed`. Child types
    /// overriding `Manageable::close` should finish by calling this.
    ///
    /// # Errors
    ///
    /// `ChildClosed` if already closed, `ChildUninitialized` if never bound,
    /// `Internal` if the registry table could not be updated.
    pub fn close_with<F: FnOnce()>(&self, release: F) -> Result<()> {
        let key = self.active_key()?;
        let registry = self.parent.borrow().as_ref().and_then(WeakRegistry::upgrade);
        let detached = match &registry {
            Some(registry) => registry.detach(key, self)?,
            None => None,
        };

        self.mark_closed();
        release();
        tracing::debug!(key, detached = detached.is_some(), "child closed");
        Ok(())
    }

    /// Terminal transition; drops the back-reference.
    pub(crate) fn mark_closed(&self) {
        self.parent.borrow_mut().take();
        self.lifecycle.set(Lifecycle::Closed);
    }
}

impl fmt::Debug for ChildCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parent = self.parent.try_borrow().ok().and_then(|p| p.clone());
        f.debug_struct("ChildCore")
            .field("key", &self.key())
            .field("lifecycle", &self.lifecycle.get())
            .field("parent", &parent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TypeCatalog;
    use std::rc::Rc;

    fn registry() -> Registry {
        Registry::new(Rc::new(TypeCatalog::new()))
    }

    #[test]
    fn test_new_core_is_uninitialized() {
        let core = ChildCore::new();
        assert_eq!(core.lifecycle(), Lifecycle::Uninitialized);
        assert!(core.key().is_none());
        assert!(matches!(
            core.active_key(),
            Err(RegistryError::ChildUninitialized)
        ));
    }

    #[test]
    fn test_bind_activates() {
        let registry = registry();
        let core = ChildCore::new();
        core.bind(&registry.downgrade(), "k").unwrap();

        assert_eq!(core.lifecycle(), Lifecycle::Active);
        assert_eq!(core.key(), Some("k"));
        assert_eq!(core.parent().unwrap(), registry);
    }

    #[test]
    fn test_bind_twice_fails() {
        let registry = registry();
        let core = ChildCore::new();
        core.bind(&registry.downgrade(), "k").unwrap();

        let err = core.bind(&registry.downgrade(), "other").unwrap_err();
        assert!(matches!(err, RegistryError::ChildAlreadyBound { key } if key == "k"));
        assert_eq!(core.key(), Some("k"));
    }

    #[test]
    fn test_bind_rejects_dangling_parent() {
        let core = ChildCore::new();
        let err = core.bind(&WeakRegistry::default(), "k").unwrap_err();
        assert!(matches!(err, RegistryError::Validation { field: "parent", .. }));
        assert_eq!(core.lifecycle(), Lifecycle::Uninitialized);
    }

    #[test]
    fn test_close_unregistered_core() {
        let registry = registry();
        let core = ChildCore::new();
        core.bind(&registry.downgrade(), "k").unwrap();

        let mut released = false;
        core.close_with(|| released = true).unwrap();

        assert!(released);
        assert_eq!(core.lifecycle(), Lifecycle::Closed);
        assert_eq!(core.key(), Some("k"));
        assert!(matches!(
            core.parent(),
            Err(RegistryError::ChildClosed { .. })
        ));
    }

    #[test]
    fn test_close_from_inside_release_is_rejected() {
        let registry = registry();
        let core = ChildCore::new();
        core.bind(&registry.downgrade(), "k").unwrap();

        let nested = RefCell::new(None);
        core.close_with(|| {
            assert_eq!(core.lifecycle(), Lifecycle::Closed);
            *nested.borrow_mut() = Some(core.close_with(|| {}));
        })
        .unwrap();

        assert!(matches!(
            nested.into_inner(),
            Some(Err(RegistryError::ChildClosed { .. }))
        ));
    }

    #[test]
    fn test_parent_dropped() {
        let core = ChildCore::new();
        {
            let registry = registry();
            core.bind(&registry.downgrade(), "k").unwrap();
        }
        assert!(matches!(
            core.parent(),
            Err(RegistryError::ParentDropped { .. })
        ));
    }

    #[test]
    fn test_lifecycle_display() {
        assert_eq!(Lifecycle::Active.to_string(), "active");
    }
}
