pub mod invariants;
pub mod validation;

pub use invariants::validate_table;
pub use validation::{define_string, ValidationRule};
