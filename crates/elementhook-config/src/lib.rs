//! # ElementHook Config
//!
//! Configuration management for the element scanner, mutation watcher,
//! query cache, remote platform client and bulk operation engine.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
