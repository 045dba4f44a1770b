//! Pipeline configuration.
//!
//! Stored as JSON. Every field has a default, so a partial file (or none at
//! all) describes the stock 96x96 classifier on a 500 ms cycle.

use crate::error::{PipelineError, PipelineResult};
use pawcam_camera::{FrameSource, Pattern, RawFileCamera, SyntheticCamera};
use pawcam_core::{memory_budget, FrameGeometry, PixelEncoding};
use pawcam_engine::InputNormalization;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Where the input tensor's contents come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputSource {
    /// Raw RGB565 frames replayed from a file, standing in for the sensor.
    Camera { path: PathBuf },
    /// Frames rendered by a synthetic camera.
    Pattern { pattern: Pattern },
    /// No camera. The input tensor is filled once with `value` in every
    /// channel and the detector runs on it every cycle.
    Static {
        #[serde(default)]
        value: u8,
    },
}

impl InputSource {
    pub fn has_camera(&self) -> bool {
        !matches!(self, Self::Static { .. })
    }

    /// Open the frame source, or `None` for detector-only operation.
    pub fn open(&self, geometry: FrameGeometry) -> PipelineResult<Option<Box<dyn FrameSource>>> {
        let source: Box<dyn FrameSource> = match self {
            Self::Camera { path } => Box::new(RawFileCamera::open(
                path,
                geometry.width,
                geometry.height,
            )?),
            Self::Pattern { pattern } => Box::new(SyntheticCamera::new(geometry, *pattern)),
            Self::Static { .. } => return Ok(None),
        };
        Ok(Some(source))
    }
}

impl Default for InputSource {
    fn default() -> Self {
        Self::Pattern {
            pattern: Pattern::ColorBars,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Frame width the model expects.
    pub width: u32,
    /// Frame height the model expects.
    pub height: u32,
    /// Sleep between cycles. Latency adds on top of it.
    pub period_ms: u64,
    /// Tensor arena capacity in bytes.
    pub arena_bytes: usize,
    /// Model artifact. The built-in classifier is used when absent.
    pub model: Option<PathBuf>,
    pub input: InputSource,
    /// Scores at or above this count as a detection.
    pub threshold: f32,
    pub normalization: InputNormalization,
    /// Stop after this many cycles. Runs until shutdown when absent.
    pub max_cycles: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: memory_budget::FRAME_WIDTH,
            height: memory_budget::FRAME_HEIGHT,
            period_ms: memory_budget::CYCLE_PERIOD_MS,
            arena_bytes: memory_budget::TENSOR_ARENA_SIZE,
            model: None,
            input: InputSource::default(),
            threshold: 0.5,
            normalization: InputNormalization::SIGNED_UNIT,
            max_cycles: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_json(data: &[u8]) -> PipelineResult<Self> {
        let config: Self = serde_json::from_slice(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> PipelineResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        let data = std::fs::read(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&data)?;
        info!(path = %path.display(), "Loaded pipeline config");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        std::fs::write(path, self.to_json()?).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "frame size {}x{} is empty",
                self.width, self.height
            )));
        }
        if self.arena_bytes == 0 {
            return Err(PipelineError::InvalidConfig("arena_bytes must be non-zero".into()));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(PipelineError::InvalidConfig(format!(
                "threshold {} is outside [0, 1]",
                self.threshold
            )));
        }
        let norm = self.normalization;
        if !(norm.mean.is_finite() && norm.std.is_finite() && norm.std != 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "normalization {norm:?} is not usable"
            )));
        }
        Ok(())
    }

    /// Geometry of the RGB565 frames the camera must deliver.
    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(self.width, self.height, PixelEncoding::Rgb565)
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}
