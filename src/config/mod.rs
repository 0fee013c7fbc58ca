// src/config/mod.rs

//! Host configuration (`Jobkit.toml`).
//!
//! - [`model`]: the TOML-backed data model.
//! - [`loader`]: reading a config file through the [`FileSystem`](crate::fs::FileSystem).
//! - [`validate`]: checks applied when turning the raw file into a [`ConfigFile`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{ConfigFile, RawConfigFile, RegistrySection};
