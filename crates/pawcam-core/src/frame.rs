//! Frame types for raw sensor frames in CPU memory.
//!
//! Frame buffers are allocated once by the frame source and recycled for
//! the lifetime of the process; a `Frame` only moves a buffer between the
//! source and the scheduler.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic sequence number of a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameId(pub u64);

/// Pixel encoding enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelEncoding {
    /// 5-6-5 packed RGB, 16 bits per pixel, high byte first (sensor native)
    #[default]
    Rgb565,
    /// 8-bit RGB, 24 bits per pixel
    Rgb888,
    /// 8-bit grayscale
    Gray8,
}

impl PixelEncoding {
    /// Bytes per pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb565 => 2,
            Self::Rgb888 => 3,
            Self::Gray8 => 1,
        }
    }

    /// Calculate total bytes needed for a frame of this encoding.
    pub const fn frame_size(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }

    /// Short lowercase name, used in logs and errors.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rgb565 => "rgb565",
            Self::Rgb888 => "rgb888",
            Self::Gray8 => "gray8",
        }
    }
}

impl fmt::Display for PixelEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Width, height and encoding of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub encoding: PixelEncoding,
}

impl FrameGeometry {
    pub const fn new(width: u32, height: u32, encoding: PixelEncoding) -> Self {
        Self {
            width,
            height,
            encoding,
        }
    }

    /// Number of pixels in the frame.
    #[inline]
    pub const fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Number of bytes a buffer for this geometry holds.
    #[inline]
    pub const fn byte_len(&self) -> usize {
        self.encoding.frame_size(self.width, self.height)
    }

    /// Whether the width and height match, regardless of encoding.
    #[inline]
    pub fn same_dimensions(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }
}

impl fmt::Display for FrameGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.encoding)
    }
}

/// A raw frame handed out by a frame source.
///
/// The buffer length always equals `width * height * bytes_per_pixel`;
/// `Frame::new` refuses anything else.
#[derive(Debug)]
pub struct Frame {
    id: FrameId,
    geometry: FrameGeometry,
    data: Box<[u8]>,
}

impl Frame {
    /// Wrap a buffer as a frame, checking the length invariant.
    pub fn new(id: FrameId, geometry: FrameGeometry, data: Box<[u8]>) -> CoreResult<Self> {
        let expected = geometry.byte_len();
        if data.len() != expected {
            return Err(CoreError::InvalidFrame {
                width: geometry.width,
                height: geometry.height,
                encoding: geometry.encoding.name(),
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { id, geometry, data })
    }

    #[inline]
    pub fn id(&self) -> FrameId {
        self.id
    }

    #[inline]
    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.geometry.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.geometry.height
    }

    #[inline]
    pub fn encoding(&self) -> PixelEncoding {
        self.geometry.encoding
    }

    /// Raw pixel bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Raw pixel bytes, mutably. The length cannot change.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Length of the pixel buffer in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Give the buffer back so its owner can recycle it.
    pub fn into_buffer(self) -> Box<[u8]> {
        self.data
    }
}
