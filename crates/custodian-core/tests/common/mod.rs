#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use custodian_core::{
    BasicChild, BoxError, ChildCore, Manageable, ManagedType, Registry, RegistryError,
    TypeCatalog, WeakRegistry,
};

/// Child that counts how often its release step runs
#[derive(Debug, Default)]
pub struct Session {
    core: ChildCore,
    releases: Cell<u32>,
}

impl Session {
    pub fn releases(&self) -> u32 {
        self.releases.get()
    }
}

impl Manageable for Session {
    fn core(&self) -> &ChildCore {
        &self.core
    }

    fn release(&self) {
        self.releases.set(self.releases.get() + 1);
    }
}

impl ManagedType for Session {
    const TYPE_ID: &'static str = "test.session";

    fn instantiate() -> Result<Self, BoxError> {
        Ok(Self::default())
    }
}

/// Child whose constructor always fails
#[derive(Debug, Default)]
pub struct Broken {
    core: ChildCore,
}

impl Manageable for Broken {
    fn core(&self) -> &ChildCore {
        &self.core
    }
}

impl ManagedType for Broken {
    const TYPE_ID: &'static str = "test.broken";

    fn instantiate() -> Result<Self, BoxError> {
        Err("connection pool exhausted".into())
    }
}

/// Child that refuses to be bound
#[derive(Debug, Default)]
pub struct Unbindable {
    core: ChildCore,
}

impl Manageable for Unbindable {
    fn core(&self) -> &ChildCore {
        &self.core
    }

    fn initialize(&self, _parent: &WeakRegistry, _key: &str) -> custodian_core::Result<()> {
        Err(RegistryError::InvalidConfig {
            reason: "unbindable child".to_string(),
        })
    }
}

impl ManagedType for Unbindable {
    const TYPE_ID: &'static str = "test.unbindable";

    fn instantiate() -> Result<Self, BoxError> {
        Ok(Self::default())
    }
}

/// Type whose identifier is registered with a constructor for another type
#[derive(Debug, Default)]
pub struct Impostor {
    core: ChildCore,
}

impl Manageable for Impostor {
    fn core(&self) -> &ChildCore {
        &self.core
    }
}

impl ManagedType for Impostor {
    const TYPE_ID: &'static str = "test.impostor";

    fn instantiate() -> Result<Self, BoxError> {
        Ok(Self::default())
    }
}

/// Child whose release step closes a peer child
#[derive(Debug, Default)]
pub struct Paired {
    core: ChildCore,
    releases: Cell<u32>,
    peer: RefCell<Option<Weak<dyn Manageable>>>,
}

impl Paired {
    pub fn releases(&self) -> u32 {
        self.releases.get()
    }

    pub fn pair_with(&self, peer: &Rc<dyn Manageable>) {
        *self.peer.borrow_mut() = Some(Rc::downgrade(peer));
    }
}

impl Manageable for Paired {
    fn core(&self) -> &ChildCore {
        &self.core
    }

    fn release(&self) {
        self.releases.set(self.releases.get() + 1);
        let peer = self.peer.borrow().as_ref().and_then(Weak::upgrade);
        if let Some(peer) = peer {
            // The peer may already be closing; that is not an error here
            let _ = peer.close();
        }
    }
}

impl ManagedType for Paired {
    const TYPE_ID: &'static str = "test.paired";

    fn instantiate() -> Result<Self, BoxError> {
        Ok(Self::default())
    }
}

/// Catalog with every test child type registered
pub fn test_catalog() -> TypeCatalog {
    let mut catalog = TypeCatalog::with_defaults();
    catalog.register_type::<Session>().unwrap();
    catalog.register_type::<Paired>().unwrap();
    catalog.register_type::<Broken>().unwrap();
    catalog.register_type::<Unbindable>().unwrap();
    catalog
        .register(Impostor::TYPE_ID, || {
            Ok(Rc::new(BasicChild::new()) as Rc<dyn Manageable>)
        })
        .unwrap();
    catalog
}

/// Create an open registry over `test_catalog()`
pub fn new_registry() -> Registry {
    Registry::new(Rc::new(test_catalog()))
}

/// A key of exactly `len` characters
pub fn key_of_len(len: usize) -> String {
    "k".repeat(len)
}
