//! Core types shared across Custodian facilities
//!
//! This crate provides foundational types used by both error handling
//! and logging facilities:
//!
//! - **Identity types**: RegistryId
//! - **Schema constants**: Canonical field keys and event names

pub mod ids;
pub mod schema;

pub use ids::RegistryId;
