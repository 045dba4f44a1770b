//! Error types for the inference engine.

use crate::ops::OpCode;
use thiserror::Error;

/// Errors that abort engine initialization. All of them are fatal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InitError {
    /// The model was built against a different schema than this engine.
    #[error("model schema version {model} does not match supported version {supported}")]
    VersionMismatch { model: u32, supported: u32 },

    /// The model's tensors and scratch do not fit in the arena.
    #[error("arena exhausted: model needs {required} bytes, {available} available")]
    ArenaExhausted { required: usize, available: usize },

    /// The artifact could not be parsed.
    #[error("malformed model: {0}")]
    MalformedModel(String),

    /// The graph uses an operator the resolver does not provide.
    #[error("operator {0:?} is not registered")]
    UnregisteredOp(OpCode),

    /// A node's tensors do not fit its operator.
    #[error("node {node} ({op:?}): {reason}")]
    InvalidNode {
        node: usize,
        op: OpCode,
        reason: String,
    },

    /// Building the operator resolver failed.
    #[error(transparent)]
    Resolver(#[from] ResolverError),
}

/// Errors from a single forward pass. Recoverable: retry with fresh input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvokeError {
    /// A kernel produced NaN or infinity.
    #[error("node {node} ({op:?}) produced a non-finite value")]
    NonFinite { node: usize, op: OpCode },

    /// A kernel found tensors it cannot process.
    #[error("node {node} ({op:?}): {reason}")]
    Kernel {
        node: usize,
        op: OpCode,
        reason: &'static str,
    },

    /// The arena passed in is not the one the engine was initialized with.
    #[error("arena does not belong to this engine")]
    ArenaMismatch,

    /// Input data does not match the input tensor's element count.
    #[error("input size mismatch: tensor holds {expected} elements, got {actual}")]
    InputSizeMismatch { expected: usize, actual: usize },
}

/// Errors from serializing a model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A value does not fit the width of its field in the artifact.
    #[error("{field} {value} does not fit the model format")]
    FieldOverflow { field: &'static str, value: usize },
}

/// Errors from registering kernels.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ResolverError {
    #[error("resolver is full ({capacity} kernels)")]
    Full { capacity: usize },
    #[error("operator {0:?} registered twice")]
    Duplicate(OpCode),
}

/// Result type alias for engine initialization.
pub type InitResult<T> = std::result::Result<T, InitError>;
