//! Precondition checks for identifiers handed to the registry
//!
//! Checks are declared fluently and evaluated in declaration order; the
//! first failing rule is reported:
//!
//! ```
//! use custodian_core::rules::validation::define_string;
//!
//! assert!(define_string("key", "session-1").not_empty().max_chars(256).validate().is_ok());
//! assert!(define_string("key", "").not_empty().validate().is_err());
//! ```

use std::fmt;

use crate::errors::{RegistryError, Result};

/// The rule an argument failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRule {
    /// A required handle or value was absent
    Present,
    /// The string was empty
    NotEmpty,
    /// The string was longer than `max` characters
    MaxLength { max: usize, actual: usize },
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationRule::Present => write!(f, "value must be present"),
            ValidationRule::NotEmpty => write!(f, "value must not be empty"),
            ValidationRule::MaxLength { max, actual } => {
                write!(f, "length {} exceeds the maximum of {} characters", actual, max)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Check {
    NotEmpty,
    MaxChars(usize),
}

/// A pending set of checks against one named string argument
#[derive(Debug, Clone)]
#[must_use = "checks do nothing until validate() is called"]
pub struct StringValidation<'a> {
    field: &'static str,
    value: &'a str,
    checks: Vec<Check>,
}

/// Start declaring checks for `value`, reported under `field` on failure
pub fn define_string<'a>(field: &'static str, value: &'a str) -> StringValidation<'a> {
    StringValidation {
        field,
        value,
        checks: Vec::new(),
    }
}

impl<'a> StringValidation<'a> {
    /// Reject the empty string
    pub fn not_empty(mut self) -> Self {
        self.checks.push(Check::NotEmpty);
        self
    }

    /// Reject strings longer than `max` characters (Unicode scalar values)
    pub fn max_chars(mut self, max: usize) -> Self {
        self.checks.push(Check::MaxChars(max));
        self
    }

    /// Run the declared checks in order
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Validation` naming the field and the first
    /// rule that failed.
    pub fn validate(self) -> Result<()> {
        for check in &self.checks {
            let failed = match *check {
                Check::NotEmpty if self.value.is_empty() => Some(ValidationRule::NotEmpty),
                Check::MaxChars(max) => {
                    let actual = self.value.chars().count();
                    (actual > max).then_some(ValidationRule::MaxLength { max, actual })
                }
                Check::NotEmpty => None,
            };
            if let Some(rule) = failed {
                return Err(RegistryError::Validation {
                    field: self.field,
                    rule,
                });
            }
        }
        Ok(())
    }
}

/// Require an optional value to be present
///
/// # Errors
///
/// Returns `RegistryError::Validation` with `ValidationRule::Present`.
pub fn require_present<T>(field: &'static str, value: Option<T>) -> Result<T> {
    value.ok_or(RegistryError::Validation {
        field,
        rule: ValidationRule::Present,
    })
}
