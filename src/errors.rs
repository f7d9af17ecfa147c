// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StagehandError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job already registered: {0}")]
    DuplicateJob(String),

    #[error("Cycle detected in job dependencies: {0}")]
    DependencyCycle(String),

    #[error("Progress value {value} for job '{job}' is outside 0..=1")]
    InvalidProgress { job: String, value: f32 },

    #[error("Progress weight {weight} for job '{job}' must be positive and finite")]
    InvalidWeight { job: String, weight: f32 },

    #[error("Dialog not configured: {0}")]
    DialogNotConfigured(String),

    #[error("No active dialog: {0}")]
    DialogNotFound(String),

    #[error("Dialog system used before initialize()")]
    NotInitialized,

    #[error("Runtime channel closed")]
    ChannelClosed,

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, StagehandError>;
