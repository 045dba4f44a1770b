//! PawCam Core - Foundation types for the capture/inference loop
//!
//! This crate provides the types shared by every other PawCam crate:
//! - Frames and pixel encodings
//! - Per-cycle timing measurements
//! - Fixed memory budget constants

pub mod error;
pub mod frame;
pub mod measurement;

pub use error::{CoreError, CoreResult};
pub use frame::{Frame, FrameGeometry, FrameId, PixelEncoding};
pub use measurement::CycleMeasurement;

/// Memory budget constants for the ESP32-S3 class target (8 MB PSRAM).
pub mod memory_budget {
    /// Default tensor arena capacity.
    pub const TENSOR_ARENA_SIZE: usize = 2 * 1024 * 1024; // 2 MB

    /// Number of sensor frame buffers owned by the camera driver.
    pub const FRAME_BUFFER_COUNT: usize = 1;

    /// Default model input width in pixels.
    pub const FRAME_WIDTH: u32 = 96;

    /// Default model input height in pixels.
    pub const FRAME_HEIGHT: u32 = 96;

    /// Default delay between inference cycles, in milliseconds.
    pub const CYCLE_PERIOD_MS: u64 = 500;
}
