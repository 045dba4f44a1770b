//! PawCam Color - Pixel format conversion

pub mod error;
pub mod rgb565;

pub use error::ConvertError;
pub use rgb565::{convert_frame, expand_rgb565, pack_rgb888, rgb565_to_rgb888};
