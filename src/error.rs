use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid filter graph construction, raised at the call that caused it
    #[error("Graph construction error: {0}")]
    Construction(String),

    /// The external media tool exited non-zero or could not be started
    #[error("{description} failed (exit code {exit_code:?}): {stderr}")]
    ProcessFailure {
        description: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Clip error: {0}")]
    Clip(String),

    #[error("Duration not found for {0}")]
    DurationNotFound(String),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ReelError>;
