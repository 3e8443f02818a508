// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - `model.rs` is the TOML-backed data model.
//! - `loader.rs` reads a config file from disk.
//! - `validate.rs` turns a `RawConfigFile` into a `ConfigFile`, decoding
//!   provider options and rejecting duplicate names, clashing outputs and
//!   cycles.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{DEFAULT_CONFIG_FILE, load_and_validate, load_from_path, load_from_str};
pub use model::{ConfigFile, ConfigSection, RawConfigFile, RawEachOutput, RawTaskConfig};
