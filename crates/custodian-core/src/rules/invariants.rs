//! Registry table invariants
//!
//! These checks run unconditionally (not as debug assertions) and report a
//! violation as `RegistryError::Internal`, so a corrupted table is always
//! diagnosable instead of silently tolerated.

use crate::child::Lifecycle;
use crate::errors::{RegistryError, Result};
use crate::registry::{ChildTable, Registry};

/// Find slots whose child is not `Active` or reports a key other than the slot's
///
/// Returns `(slot_key, child_key)` pairs.
pub fn find_misbound_children(table: &ChildTable) -> Vec<(String, Option<String>)> {
    let mut misbound: Vec<_> = table
        .iter()
        .filter(|(slot, child)| {
            child.lifecycle() != Lifecycle::Active || child.core().key() != Some(slot.as_str())
        })
        .map(|(slot, child)| (slot.clone(), child.core().key().map(str::to_string)))
        .collect();
    misbound.sort();
    misbound
}

/// Find slots whose child reports a parent other than `registry`
pub fn find_foreign_children(table: &ChildTable, registry: &Registry) -> Vec<String> {
    let mut foreign: Vec<_> = table
        .iter()
        .filter(|(_, child)| {
            child
                .parent()
                .map(|parent| parent != *registry)
                .unwrap_or(true)
        })
        .map(|(slot, _)| slot.clone())
        .collect();
    foreign.sort();
    foreign
}

/// Validate every binding in the table
///
/// # Errors
///
/// Returns `Internal` describing the first violation found.
pub fn validate_table(table: &ChildTable, registry: &Registry) -> Result<()> {
    if let Some((slot, child_key)) = find_misbound_children(table).first() {
        return Err(RegistryError::Internal {
            invariant: format!(
                "slot '{}' holds a child that is not active under that key (child key: {:?})",
                slot, child_key
            ),
        });
    }
    if let Some(slot) = find_foreign_children(table, registry).first() {
        return Err(RegistryError::Internal {
            invariant: format!("slot '{}' holds a child bound to another registry", slot),
        });
    }
    Ok(())
}

/// A key that was just removed must not be bound any more
pub(crate) fn ensure_removed(table: &ChildTable, key: &str) -> Result<()> {
    if table.contains_key(key) {
        return Err(RegistryError::Internal {
            invariant: format!("key '{}' is still bound after its child was closed", key),
        });
    }
    Ok(())
}

/// The table must be empty once every child has been closed
pub(crate) fn ensure_empty(table: &ChildTable) -> Result<()> {
    if !table.is_empty() {
        let mut remaining: Vec<_> = table.keys().cloned().collect();
        remaining.sort();
        return Err(RegistryError::Internal {
            invariant: format!(
                "child table should be empty after close, still holds {:?}",
                remaining
            ),
        });
    }
    Ok(())
}
