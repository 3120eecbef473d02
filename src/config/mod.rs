// src/config/mod.rs

//! Configuration loading and validation for contract-watch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate limits and endpoints (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str};
pub use model::{
    ArtifactsSection, ConfigFile, DispatcherSection, RawConfigFile, SourceSection, WatcherConfig,
};
pub use validate::validate_watcher_config;
