use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

use crate::rules::validation::ValidationRule;

/// Result type alias using RegistryError
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Boxed cause returned by child constructors
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that can be used for programmatic
/// error handling and testing. Several `RegistryError` variants share a kind
/// (a closed registry and a closed child are both `Closed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExErrorKind {
    /// Malformed key, type identifier or parent handle
    Validation,
    /// Operation on a closed registry or a closed child
    Closed,
    /// Key (or type identifier) already bound
    DuplicateKey,
    /// Child construction failed for any reason
    Instantiation,
    /// A bound child is not of the requested concrete type
    TypeMismatch,
    /// Child used outside of its lifecycle (unbound, bound twice, orphaned)
    InvalidState,
    /// An internal invariant did not hold
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::Validation => "ERR_VALIDATION",
            ExErrorKind::Closed => "ERR_CLOSED",
            ExErrorKind::DuplicateKey => "ERR_DUPLICATE_KEY",
            ExErrorKind::Instantiation => "ERR_INSTANTIATION",
            ExErrorKind::TypeMismatch => "ERR_TYPE_MISMATCH",
            ExErrorKind::InvalidState => "ERR_INVALID_STATE",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries the classification plus the registry context (operation, key,
/// type identifier) the failure was raised in.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    registry_id: Option<String>,
    key: Option<String>,
    type_id: Option<String>,
    message: String,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            registry_id: None,
            key: None,
            type_id: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add registry ID context
    pub fn with_registry_id(mut self, id: impl Into<String>) -> Self {
        self.registry_id = Some(id.into());
        self
    }

    /// Add child key context
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Add type identifier context
    pub fn with_type_id(mut self, type_id: impl Into<String>) -> Self {
        self.type_id = Some(type_id.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn registry_id(&self) -> Option<&str> {
        self.registry_id.as_deref()
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn type_id(&self) -> Option<&str> {
        self.type_id.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(registry_id) = &self.registry_id {
            write!(f, " (registry_id: {})", registry_id)?;
        }
        if let Some(key) = &self.key {
            write!(f, " (key: {})", key)?;
        }
        if let Some(type_id) = &self.type_id {
            write!(f, " (type_id: {})", type_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Error taxonomy for registry and child operations
#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    /// An argument failed a validation rule
    #[error("Invalid {field}: {rule}")]
    Validation {
        field: &'static str,
        rule: ValidationRule,
    },

    /// The registry was closed; only `is_closed` may still be called
    #[error("Registry {registry_id} has been closed and may not be used")]
    RegistryClosed { registry_id: String },

    /// The child was closed and may not be used
    #[error("Child '{key}' has been closed and may not be used")]
    ChildClosed { key: String },

    /// A child is already bound under this key
    #[error("A child already exists with key '{key}'")]
    DuplicateKey { key: String },

    /// A constructor is already registered for this type identifier
    #[error("Type identifier already registered: {type_id}")]
    TypeAlreadyRegistered { type_id: String },

    /// No constructor is registered for this type identifier; reported as
    /// the `source` of an `Instantiation` error
    #[error("Unable to locate type identifier: {type_id}")]
    UnknownType { type_id: String },

    /// The constructor for this type identifier failed
    #[error("Unable to instantiate type identifier {type_id}: {source}")]
    Instantiation {
        type_id: String,
        #[source]
        source: Arc<dyn StdError + Send + Sync>,
    },

    /// The child bound under this key is not of the requested type
    #[error("Child '{key}' is not of the expected type {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    /// The child has not been initialized with a parent and key
    #[error("Child has not been initialized")]
    ChildUninitialized,

    /// The child was already initialized; key and parent bind once
    #[error("Child is already bound to key '{key}'")]
    ChildAlreadyBound { key: String },

    /// The registry the child was bound to no longer exists
    #[error("Parent registry of child '{key}' has been dropped")]
    ParentDropped { key: String },

    /// Registry configuration is unusable
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A registry invariant was found violated
    #[error("Registry invariant violated: {invariant}")]
    Internal { invariant: String },
}

impl RegistryError {
    /// Wrap a constructor failure for `type_id`
    pub fn instantiation(type_id: impl Into<String>, cause: BoxError) -> Self {
        RegistryError::Instantiation {
            type_id: type_id.into(),
            source: Arc::from(cause),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ExErrorKind {
        match self {
            RegistryError::Validation { .. } | RegistryError::InvalidConfig { .. } => {
                ExErrorKind::Validation
            }
            RegistryError::RegistryClosed { .. } | RegistryError::ChildClosed { .. } => {
                ExErrorKind::Closed
            }
            RegistryError::DuplicateKey { .. } | RegistryError::TypeAlreadyRegistered { .. } => {
                ExErrorKind::DuplicateKey
            }
            RegistryError::UnknownType { .. } | RegistryError::Instantiation { .. } => {
                ExErrorKind::Instantiation
            }
            RegistryError::TypeMismatch { .. } => ExErrorKind::TypeMismatch,
            RegistryError::ChildUninitialized
            | RegistryError::ChildAlreadyBound { .. }
            | RegistryError::ParentDropped { .. } => ExErrorKind::InvalidState,
            RegistryError::Internal { .. } => ExErrorKind::Internal,
        }
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// True for both registry-closed and child-closed failures
    pub fn is_closed(&self) -> bool {
        self.kind() == ExErrorKind::Closed
    }
}

impl From<&RegistryError> for ExError {
    fn from(err: &RegistryError) -> Self {
        let ex = ExError::new(err.kind()).with_message(err.to_string());
        match err {
            RegistryError::Validation { field, .. } => ex.with_op(format!("validate_{}", field)),
            RegistryError::RegistryClosed { registry_id } => ex.with_registry_id(registry_id),
            RegistryError::ChildClosed { key }
            | RegistryError::DuplicateKey { key }
            | RegistryError::TypeMismatch { key, .. }
            | RegistryError::ChildAlreadyBound { key }
            | RegistryError::ParentDropped { key } => ex.with_key(key),
            RegistryError::TypeAlreadyRegistered { type_id }
            | RegistryError::UnknownType { type_id }
            | RegistryError::Instantiation { type_id, .. } => ex.with_type_id(type_id),
            RegistryError::ChildUninitialized
            | RegistryError::InvalidConfig { .. }
            | RegistryError::Internal { .. } => ex,
        }
    }
}

impl From<RegistryError> for ExError {
    fn from(err: RegistryError) -> Self {
        ExError::from(&err)
    }
}
