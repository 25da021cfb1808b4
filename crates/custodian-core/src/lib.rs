//! Custodian Core - parent-owned registry of managed child objects
//!
//! A [`Registry`] creates children by stable type identifier through a
//! [`TypeCatalog`], tracks them under unique string keys and tears them all
//! down when it closes. This crate provides:
//! - The [`Manageable`] capability set and the [`ChildCore`] binding state
//!   children embed to implement it
//! - Registry creation, lookup and single-child / whole-registry close
//! - Identifier validation and always-on table invariants
//! - Structured boundary logging and the canonical error facility

pub mod catalog;
pub mod child;
pub mod config;
pub mod errors;
pub mod logging_facility;
pub mod registry;
pub mod rules;

// Re-export commonly used types
pub use catalog::TypeCatalog;
pub use child::{BasicChild, ChildCore, Lifecycle, Manageable, ManagedType};
pub use config::RegistryConfig;
pub use errors::{BoxError, ExError, ExErrorKind, RegistryError, Result};
pub use registry::{Registry, RegistryStatus, WeakRegistry};

pub use custodian_core_types::{schema, RegistryId};

#[doc(hidden)]
pub use tracing;
