//! PawCam Engine - Fixed-arena inference
//!
//! This crate provides:
//! - A claim-only tensor arena sized once at startup
//! - The versioned model artifact format and its builder
//! - A fixed-capacity operator resolver and reference kernels
//! - The graph interpreter bound to input/output tensors at initialization
//! - A built-in single-class classifier model

pub mod arena;
pub mod builder;
pub mod demo;
pub mod engine;
pub mod error;
pub mod kernels;
pub mod model;
pub mod ops;
pub mod tensor;

pub use arena::{Arena, ArenaRegion, ARENA_ALIGNMENT};
pub use builder::ModelBuilder;
pub use engine::Engine;
pub use error::{BuildError, InitError, InitResult, InvokeError, ResolverError};
pub use model::{Model, MODEL_MAGIC, SUPPORTED_SCHEMA_VERSION};
pub use ops::{
    Activation, ConvParams, OpCode, OpParams, OpResolver, PadParams, Padding, Registration,
    CLASSIFIER_OPS,
};
pub use tensor::{ElementType, InputNormalization, Quantization, TensorInfo, TensorMut, TensorRef};
