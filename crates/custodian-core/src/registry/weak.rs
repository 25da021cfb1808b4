use std::fmt;
use std::rc::{Rc, Weak};

use super::{Registry, Shared};

/// Non-owning handle from a child back to its registry
///
/// Holding one never keeps a registry alive, so a registry and its children
/// never form a reference cycle. `WeakRegistry::default()` refers to no
/// registry at all and is rejected by `Manageable::initialize`.
#[derive(Clone, Default)]
pub struct WeakRegistry {
    pub(super) shared: Weak<Shared>,
}

impl WeakRegistry {
    /// Strong handle, if the registry still exists
    pub fn upgrade(&self) -> Option<Registry> {
        self.shared.upgrade().map(|shared| Registry { shared })
    }

    /// True if this handle refers to `registry`
    pub fn points_to(&self, registry: &Registry) -> bool {
        std::ptr::eq(self.shared.as_ptr(), Rc::as_ptr(&registry.shared))
    }

    pub fn is_dangling(&self) -> bool {
        self.shared.strong_count() == 0
    }
}

impl fmt::Debug for WeakRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shared.upgrade() {
            Some(shared) => write!(f, "WeakRegistry({})", shared.id),
            None => f.write_str("WeakRegistry(<dropped>)"),
        }
    }
}
