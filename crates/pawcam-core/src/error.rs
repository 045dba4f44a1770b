//! Error types for core PawCam types.

use thiserror::Error;

/// Errors raised while constructing core values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid frame: expected {expected} bytes for {width}x{height} {encoding}, got {actual}")]
    InvalidFrame {
        width: u32,
        height: u32,
        encoding: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Result type alias for core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
