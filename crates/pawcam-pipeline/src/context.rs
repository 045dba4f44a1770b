//! Process-lifetime inference state.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use pawcam_engine::{
    demo, Arena, Engine, InitError, InputNormalization, InvokeError, Model, OpResolver,
    TensorInfo,
};
use tracing::info;

/// Owns the tensor arena and the engine bound to it.
///
/// Built once at startup and handed to the scheduler. Dropping it (or
/// calling [`InferenceContext::shutdown`]) frees both.
pub struct InferenceContext {
    arena: Arena,
    engine: Engine,
}

impl InferenceContext {
    /// Initialize `model` with the classifier kernel set in a fresh arena.
    pub fn new(model: Model, arena_bytes: usize) -> PipelineResult<Self> {
        let resolver = OpResolver::classifier().map_err(InitError::from)?;
        Self::with_resolver(model, &resolver, arena_bytes)
    }

    pub fn with_resolver<const N: usize>(
        model: Model,
        resolver: &OpResolver<N>,
        arena_bytes: usize,
    ) -> PipelineResult<Self> {
        let mut arena = Arena::new(arena_bytes);
        let engine = Engine::initialize(model, resolver, &mut arena)?;
        Ok(Self { arena, engine })
    }

    /// Load the configured model (or the built-in one) and check that its
    /// input tensor takes one RGB888 frame of the configured size.
    pub fn from_config(config: &PipelineConfig) -> PipelineResult<Self> {
        let model = match &config.model {
            Some(path) => {
                let model = Model::load(path).map_err(|source| PipelineError::Io {
                    path: path.clone(),
                    source,
                })?;
                info!(path = %path.display(), bytes = model.len(), "Loaded model artifact");
                model
            }
            None => {
                info!(width = config.width, height = config.height, "Using built-in classifier");
                demo::classifier_model(config.width as usize, config.height as usize)?
            }
        };

        let context = Self::new(model, config.arena_bytes)?;
        let expected = config.geometry().pixel_count() * 3;
        if context.input_info().element_count() != expected {
            return Err(PipelineError::InvalidConfig(format!(
                "model input {:?} does not hold one {}x{} RGB frame",
                context.input_info().shape,
                config.width,
                config.height
            )));
        }
        Ok(context)
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn input_info(&self) -> &TensorInfo {
        self.engine.input_info()
    }

    pub fn output_info(&self) -> &TensorInfo {
        self.engine.output_info()
    }

    /// Normalize interleaved RGB888 pixels into the input tensor.
    pub fn load_rgb888(
        &mut self,
        pixels: &[u8],
        norm: InputNormalization,
    ) -> Result<(), InvokeError> {
        self.engine
            .input_mut(&mut self.arena)?
            .fill_from_rgb888(pixels, norm)
    }

    pub fn invoke(&mut self) -> Result<(), InvokeError> {
        self.engine.invoke(&mut self.arena)
    }

    /// First element of the output tensor, dequantized.
    pub fn score(&self) -> Result<f32, InvokeError> {
        Ok(self.engine.output(&self.arena)?.get(0))
    }

    /// Explicit teardown.
    pub fn shutdown(self) {
        info!(
            arena_used = self.arena.used(),
            arena_capacity = self.arena.capacity(),
            "Inference context released"
        );
    }
}
