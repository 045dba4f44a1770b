//! PawCam Camera - Frame acquisition
//!
//! This crate handles:
//! - The `FrameSource` contract (capture / release)
//! - A fixed-size frame buffer pool
//! - Synthetic pattern sources
//! - Raw RGB565 file replay

pub mod error;
pub mod pool;
pub mod replay;
pub mod source;
pub mod synthetic;

pub use error::{CaptureError, CaptureResult};
pub use pool::FramePool;
pub use replay::RawFileCamera;
pub use source::FrameSource;
pub use synthetic::{Pattern, SyntheticCamera};

/// Log the camera subsystem start (call once at startup).
pub fn init() {
    tracing::info!("PawCam camera subsystem initialized");
}
