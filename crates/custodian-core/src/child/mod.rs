pub mod base;
pub mod basic;
pub mod manageable;

pub use base::{ChildCore, Lifecycle};
pub use basic::BasicChild;
pub use manageable::{concrete_type_id, AsAny, Manageable, ManagedType};

pub(crate) use manageable::release_detached;
