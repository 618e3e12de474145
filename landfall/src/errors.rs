//! Error types for landfall

use thiserror::Error;

/// Main error type for a deployment run
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Remote command failed with exit code {exit_code}: {command}: {stderr}")]
    RemoteCommandError {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Remote command timed out after {seconds}s: {command}")]
    TimeoutError { command: String, seconds: u64 },

    #[error("Clone error: {0}")]
    CloneError(String),

    #[error("Config validation error: {0}")]
    ConfigValidationError(String),

    #[error("Pipeline error: {0}")]
    PipelineError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for DeployError {
    fn from(err: anyhow::Error) -> Self {
        DeployError::Internal(err.to_string())
    }
}
