//! Synthetic frame source for bench runs without a sensor.

use crate::error::{CaptureError, CaptureResult};
use crate::pool::FramePool;
use crate::source::FrameSource;
use pawcam_color::pack_rgb888;
use pawcam_core::{memory_budget, Frame, FrameGeometry};
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use tracing::{debug, warn};

/// Image content produced by [`SyntheticCamera`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// Every pixel set to the given RGB565 value.
    Solid(u16),
    /// Eight vertical color bars.
    ColorBars,
    /// Gray horizontal sine wave that drifts one full period every
    /// `period_frames` captures.
    Sine { period_frames: u32 },
}

const BARS: [[u8; 3]; 8] = [
    [255, 255, 255], // White
    [255, 255, 0],   // Yellow
    [0, 255, 255],   // Cyan
    [0, 255, 0],     // Green
    [255, 0, 255],   // Magenta
    [255, 0, 0],     // Red
    [0, 0, 255],     // Blue
    [0, 0, 0],       // Black
];

/// Frame source that renders a [`Pattern`] into pooled RGB565 buffers.
pub struct SyntheticCamera {
    pool: FramePool,
    pattern: Pattern,
    captures: u64,
    dropout_every: Option<u64>,
}

impl SyntheticCamera {
    /// Create a source with the sensor's default buffer count.
    pub fn new(geometry: FrameGeometry, pattern: Pattern) -> Self {
        Self::with_buffers(geometry, pattern, memory_budget::FRAME_BUFFER_COUNT)
    }

    pub fn with_buffers(geometry: FrameGeometry, pattern: Pattern, buffers: usize) -> Self {
        debug!(%geometry, ?pattern, buffers, "Synthetic camera created");
        Self {
            pool: FramePool::new(geometry, buffers),
            pattern,
            captures: 0,
            dropout_every: None,
        }
    }

    /// Fail every `n`th capture with [`CaptureError::Timeout`].
    pub fn with_dropout_every(mut self, n: u64) -> Self {
        self.dropout_every = (n > 0).then_some(n);
        self
    }

    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    pub fn pool(&self) -> &FramePool {
        &self.pool
    }

    /// Number of capture attempts so far, including failed ones.
    pub fn captures(&self) -> u64 {
        self.captures
    }

    fn render(&self, frame: &mut Frame) {
        let width = frame.width().max(1);
        let tick = self.captures;
        let pattern = self.pattern;

        for (i, px) in frame.data_mut().chunks_exact_mut(2).enumerate() {
            let x = i as u32 % width;
            let value = match pattern {
                Pattern::Solid(value) => value,
                Pattern::ColorBars => {
                    let [r, g, b] = BARS[(x * 8 / width) as usize];
                    pack_rgb888(r, g, b)
                }
                Pattern::Sine { period_frames } => {
                    let drift = (tick % period_frames.max(1) as u64) as f32
                        / period_frames.max(1) as f32;
                    let phase = (x as f32 / width as f32 + drift) * TAU;
                    let level = ((phase.sin() * 0.5 + 0.5) * 255.0).round() as u8;
                    pack_rgb888(level, level, level)
                }
            };
            px.copy_from_slice(&value.to_be_bytes());
        }
    }
}

impl FrameSource for SyntheticCamera {
    fn geometry(&self) -> FrameGeometry {
        self.pool.geometry()
    }

    fn capture(&mut self) -> CaptureResult<Frame> {
        self.captures += 1;
        if let Some(n) = self.dropout_every {
            if self.captures % n == 0 {
                warn!(capture = self.captures, "Synthetic dropout");
                return Err(CaptureError::Timeout);
            }
        }
        let mut frame = self.pool.acquire()?;
        self.render(&mut frame);
        Ok(frame)
    }

    fn release(&mut self, frame: Frame) {
        self.pool.give_back(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pawcam_color::expand_rgb565;
    use pawcam_core::PixelEncoding;

    fn pixel(frame: &Frame, x: u32, y: u32) -> u16 {
        let i = ((y * frame.width() + x) * 2) as usize;
        u16::from_be_bytes([frame.data()[i], frame.data()[i + 1]])
    }

    #[test]
    fn test_solid_fills_every_pixel() {
        let geometry = FrameGeometry::new(16, 4, PixelEncoding::Rgb565);
        let mut camera = SyntheticCamera::new(geometry, Pattern::Solid(0x1234));
        let frame = camera.capture().unwrap();
        assert!(frame
            .data()
            .chunks_exact(2)
            .all(|px| u16::from_be_bytes([px[0], px[1]]) == 0x1234));
        camera.release(frame);
    }

    #[test]
    fn test_color_bars_first_white_last_black() {
        let geometry = FrameGeometry::new(64, 2, PixelEncoding::Rgb565);
        let mut camera = SyntheticCamera::new(geometry, Pattern::ColorBars);
        let frame = camera.capture().unwrap();
        assert_eq!(expand_rgb565(pixel(&frame, 0, 0)), [255, 255, 255]);
        assert_eq!(expand_rgb565(pixel(&frame, 63, 1)), [0, 0, 0]);
        assert_eq!(expand_rgb565(pixel(&frame, 5 * 8, 0)), [255, 0, 0]);
        camera.release(frame);
    }

    #[test]
    fn test_sine_drifts_between_captures() {
        let geometry = FrameGeometry::new(32, 1, PixelEncoding::Rgb565);
        let mut camera = SyntheticCamera::new(geometry, Pattern::Sine { period_frames: 4 });

        let first = camera.capture().unwrap();
        let a = pixel(&first, 0, 0);
        camera.release(first);

        let second = camera.capture().unwrap();
        let b = pixel(&second, 0, 0);
        camera.release(second);

        assert_ne!(a, b);
    }

    #[test]
    fn test_unreleased_frame_starves_source() {
        let geometry = FrameGeometry::new(8, 8, PixelEncoding::Rgb565);
        let mut camera = SyntheticCamera::new(geometry, Pattern::Solid(0));
        let held = camera.capture().unwrap();
        assert!(matches!(camera.capture(), Err(CaptureError::NoBuffer { .. })));
        camera.release(held);
        assert!(camera.capture().is_ok());
    }

    #[test]
    fn test_dropout_every_third_capture() {
        let geometry = FrameGeometry::new(8, 8, PixelEncoding::Rgb565);
        let mut camera =
            SyntheticCamera::new(geometry, Pattern::Solid(0)).with_dropout_every(3);
        let mut failures = 0;
        for _ in 0..9 {
            match camera.capture() {
                Ok(frame) => camera.release(frame),
                Err(CaptureError::Timeout) => failures += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(failures, 3);
        assert_eq!(camera.captures(), 9);
    }
}
