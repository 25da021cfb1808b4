//! Registry configuration

use crate::errors::{RegistryError, Result};

/// Maximum length of a child key, in characters
pub const KEY_MAX_LENGTH: usize = 256;

/// Maximum length of a type identifier, in characters
///
/// Global: `TypeCatalog::register` enforces it for every catalog, and a
/// registry's own `type_id_max_len` may only tighten it.
pub const TYPE_ID_MAX_LENGTH: usize = 2048;

/// Identifier limits enforced by a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    key_max_len: usize,
    type_id_max_len: usize,
}

impl RegistryConfig {
    /// Build a configuration with explicit limits
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if either limit is zero, or if
    /// `type_id_max_len` exceeds [`TYPE_ID_MAX_LENGTH`] (no catalog could
    /// hold such an identifier).
    pub fn new(key_max_len: usize, type_id_max_len: usize) -> Result<Self> {
        if key_max_len == 0 {
            return Err(RegistryError::InvalidConfig {
                reason: "key_max_len must be at least 1".to_string(),
            });
        }
        if type_id_max_len == 0 {
            return Err(RegistryError::InvalidConfig {
                reason: "type_id_max_len must be at least 1".to_string(),
            });
        }
        if type_id_max_len > TYPE_ID_MAX_LENGTH {
            return Err(RegistryError::InvalidConfig {
                reason: format!(
                    "type_id_max_len {} exceeds the catalog limit of {}",
                    type_id_max_len, TYPE_ID_MAX_LENGTH
                ),
            });
        }
        Ok(Self {
            key_max_len,
            type_id_max_len,
        })
    }

    pub fn key_max_len(&self) -> usize {
        self.key_max_len
    }

    pub fn type_id_max_len(&self) -> usize {
        self.type_id_max_len
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            key_max_len: KEY_MAX_LENGTH,
            type_id_max_len: TYPE_ID_MAX_LENGTH,
        }
    }
}
