//! Configuration module
//!
//! Loads and validates game configuration files: roster rules, cipher
//! secrets, meeting timings, the task catalog and durability settings.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning};
pub use schema::*;
pub use validation::{ValidationResult, Validator};
