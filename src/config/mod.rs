// src/config/mod.rs

//! Configuration loading and validation for stagehand.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate canvas/dialog invariants (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str};
pub use model::{
    CanvasInfo, ConfigFile, DialogConfig, DialogInfo, RawConfigFile, SchedulerSection,
};
pub use validate::validate_config;
