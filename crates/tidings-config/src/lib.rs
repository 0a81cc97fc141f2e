#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Configuration for the Tidings event bus.
//!
//! A single [`TidingsConfig`] holds the `[bus]` section (sizing of the
//! execution contexts behind each thread mode) and the `[logging]` section
//! consumed by `tidings-telemetry`.
//!
//! # Usage
//!
//! ```rust,no_run
//! use tidings_config::TidingsConfig;
//!
//! let config = TidingsConfig::load_file(std::path::Path::new("tidings.toml")).unwrap();
//! println!("I/O pool limit: {}", config.bus.io_max_threads);
//! ```
//!
//! # Precedence
//!
//! 1. Values set in the document
//! 2. `TIDINGS_*` environment variables (fallback only)
//! 3. Built-in defaults
//!
//! This crate has **no dependencies on other internal tidings crates**.

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration document loading.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use types::*;

impl TidingsConfig {
    /// Load configuration from a file, with `TIDINGS_*` env var fallbacks.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }

    /// Parse configuration from a TOML string (no env var fallbacks).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the document cannot be parsed or fails
    /// validation.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        loader::from_toml_str(content)
    }

    /// Validate an already constructed configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate(&self) -> ConfigResult<()> {
        validate::validate(self)
    }
}
