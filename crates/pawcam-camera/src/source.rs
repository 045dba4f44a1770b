//! The frame source contract.

use crate::error::{CaptureError, CaptureResult};
use pawcam_core::{Frame, FrameGeometry};
use tracing::debug;

/// Something that hands out raw frames and takes their buffers back.
///
/// A frame returned by [`capture`](FrameSource::capture) must be passed to
/// [`release`](FrameSource::release) exactly once, whatever happens to it
/// downstream. Sources usually own a single buffer, so a frame that is not
/// released starves every later capture.
pub trait FrameSource {
    /// Geometry of the frames this source is configured to produce.
    fn geometry(&self) -> FrameGeometry;

    /// Take the next frame.
    fn capture(&mut self) -> CaptureResult<Frame>;

    /// Return a frame's buffer to the source.
    fn release(&mut self, frame: Frame);

    /// Capture and check the reported dimensions.
    ///
    /// On mismatch the frame is released before the error is returned.
    fn capture_expecting(&mut self, width: u32, height: u32) -> CaptureResult<Frame> {
        let frame = self.capture()?;
        if !frame.geometry().same_dimensions(width, height) {
            debug!(
                expected_width = width,
                expected_height = height,
                width = frame.width(),
                height = frame.height(),
                "Picture size is not correct"
            );
            let err = CaptureError::DimensionMismatch {
                expected_width: width,
                expected_height: height,
                width: frame.width(),
                height: frame.height(),
            };
            self.release(frame);
            return Err(err);
        }
        Ok(frame)
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn geometry(&self) -> FrameGeometry {
        (**self).geometry()
    }

    fn capture(&mut self) -> CaptureResult<Frame> {
        (**self).capture()
    }

    fn release(&mut self, frame: Frame) {
        (**self).release(frame)
    }

    fn capture_expecting(&mut self, width: u32, height: u32) -> CaptureResult<Frame> {
        (**self).capture_expecting(width, height)
    }
}
