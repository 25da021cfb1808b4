use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::base::{ChildCore, Lifecycle};
use crate::errors::{BoxError, RegistryError, Result};
use crate::registry::{Registry, WeakRegistry};

/// Type-erasure helper so registry handles can be downcast to concrete children
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Capability set of every object a [`Registry`] can manage
///
/// Implementors only supply [`Manageable::core`]; the provided methods carry
/// the standard protocol:
///
/// - `initialize` binds parent and key exactly once
/// - `close` detaches from the parent, runs [`Manageable::release`] and
///   marks the child closed
/// - `key` / `parent` report the binding
///
/// Override [`Manageable::release`] to free resources the child owns. It
/// runs exactly once, on whichever close path reaches the child first, and
/// the child is already `Closed` while it runs: `parent()` fails and a
/// nested `close()` returns `ChildClosed`.
pub trait Manageable: AsAny + fmt::Debug {
    /// Embedded binding state
    fn core(&self) -> &ChildCore;

    /// Free resources owned by this child
    fn release(&self) {}

    /// Bind this child to `parent` under `key`
    ///
    /// # Errors
    ///
    /// `Validation` for an empty key or a dangling parent handle,
    /// `ChildAlreadyBound` on a second call.
    fn initialize(&self, parent: &WeakRegistry, key: &str) -> Result<()> {
        self.core().bind(parent, key)
    }

    /// Remove this child from its registry and release it
    ///
    /// # Errors
    ///
    /// `ChildClosed` if the child was already closed.
    fn close(&self) -> Result<()> {
        self.core().close_with(|| self.release())
    }

    /// Key this child was bound under
    ///
    /// # Errors
    ///
    /// `ChildUninitialized` before `initialize`.
    fn key(&self) -> Result<&str> {
        self.core().key().ok_or(RegistryError::ChildUninitialized)
    }

    /// Registry this child belongs to
    ///
    /// # Errors
    ///
    /// `ChildClosed` once closed, `ChildUninitialized` before `initialize`.
    fn parent(&self) -> Result<Registry> {
        self.core().parent()
    }

    fn lifecycle(&self) -> Lifecycle {
        self.core().lifecycle()
    }

    fn is_closed(&self) -> bool {
        self.lifecycle() == Lifecycle::Closed
    }
}

/// A child type that can be registered in a [`crate::TypeCatalog`] by its
/// stable identifier and built without arguments
pub trait ManagedType: Manageable + Sized {
    /// Stable identifier; also the default key for `Registry::create_type`
    const TYPE_ID: &'static str;

    /// Build a fresh, uninitialized instance
    ///
    /// # Errors
    ///
    /// Any construction failure; the registry reports it as `Instantiation`.
    fn instantiate() -> std::result::Result<Self, BoxError>;
}

/// Concrete type of a type-erased child
pub fn concrete_type_id(child: &dyn Manageable) -> TypeId {
    child.as_any().type_id()
}

/// Children are equal when they share a key and a concrete type
impl PartialEq for dyn Manageable {
    fn eq(&self, other: &Self) -> bool {
        concrete_type_id(self) == concrete_type_id(other) && self.core().key() == other.core().key()
    }
}

impl Eq for dyn Manageable {}

impl Hash for dyn Manageable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        concrete_type_id(self).hash(state);
        self.core().key().hash(state);
    }
}

/// Release a child the registry has already unbound
///
/// Registry-side counterpart of `Manageable::close`: it never calls back
/// into the registry, so it is safe to run after the table entry is gone.
pub(crate) fn release_detached(child: &dyn Manageable) {
    if child.is_closed() {
        return;
    }
    child.core().mark_closed();
    child.release();
}
