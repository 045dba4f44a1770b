//! Startup errors for the pipeline. Per-cycle failures never surface here;
//! the scheduler logs them and skips the cycle.

use pawcam_camera::CaptureError;
use pawcam_engine::{BuildError, InitError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    ConfigFormat(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The engine could not be initialized. Fatal.
    #[error("engine initialization failed: {0}")]
    Init(#[from] InitError),

    /// The configured frame source could not be opened.
    #[error("frame source unavailable: {0}")]
    Source(#[from] CaptureError),

    /// The built-in model could not be serialized.
    #[error("built-in model unavailable: {0}")]
    Build(#[from] BuildError),
}

/// Result type alias for pipeline setup.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
