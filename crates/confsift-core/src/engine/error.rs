use super::checkpoint::CheckpointError;
use super::config::ConfigError;
use crate::core::align::error::AlignError;
use crate::core::io::xyz::XyzError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Alignment failed: {source}")]
    Align {
        #[from]
        source: AlignError,
    },

    #[error("Failed to build worker pool with {threads} threads: {reason}")]
    ThreadPool { threads: usize, reason: String },

    #[error("Restart data does not match the input: {0}")]
    InvalidRestart(String),

    #[error("Checkpoint error: {source}")]
    Checkpoint {
        #[from]
        source: CheckpointError,
    },

    #[error("Failed to write '{path}': {source}")]
    Output { path: PathBuf, source: XyzError },

    #[error("Failed to write statistics '{path}': {source}")]
    Statistics { path: PathBuf, source: csv::Error },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
