//! Capture errors. Every variant is recoverable: skip the cycle and retry
//! on the next period.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The driver has no free frame buffer (all buffers are out).
    #[error("no frame buffer available ({outstanding} of {capacity} in use)")]
    NoBuffer { outstanding: usize, capacity: usize },

    /// The captured frame is not the size the caller configured.
    #[error("frame size mismatch: expected {expected_width}x{expected_height}, got {width}x{height}")]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    /// The sensor did not deliver a frame in time.
    #[error("sensor timed out waiting for a frame")]
    Timeout,

    /// A buffer did not satisfy the frame size invariant.
    #[error(transparent)]
    InvalidFrame(#[from] pawcam_core::CoreError),

    /// The underlying device or file failed.
    #[error("capture I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for capture operations.
pub type CaptureResult<T> = std::result::Result<T, CaptureError>;
