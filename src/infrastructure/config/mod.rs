//! Configuration infrastructure.
//!
//! Hierarchical configuration using figment:
//! - programmatic defaults
//! - YAML file loading
//! - environment variable overrides
//! - validation into a typed error

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
