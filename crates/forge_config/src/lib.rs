//! Parsing and validation of `forge.toml` project configuration files.
//!
//! This crate reads the project file into a strongly-typed [`ProjectConfig`]
//! and resolves it, together with command-line overrides, into the
//! [`ResolvedBuild`] that drives one pipeline run.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod profile;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use profile::{default_peripherals, default_resources};
pub use resolve::{resolve_build, BuildOverrides, ResolvedBuild};
pub use types::*;
