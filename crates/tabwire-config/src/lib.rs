//! # tabwire config
//!
//! Configuration management for the tabwire remote debugging client.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{
    ConfigValidator, ValidationError, ValidationErrorKind, ValidationResult, ValidationWarning,
};
