//! PawCam Pipeline - Capture and inference scheduling
//!
//! This crate ties the other PawCam crates together:
//! - `PipelineConfig`, loaded from JSON with defaults for every field
//! - `InferenceContext`, owning the tensor arena and the engine
//! - The `Clock` seam for timestamps and the period sleep
//! - The `Scheduler` state machine that runs one cycle per period

pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod scheduler;

pub use clock::{Clock, MonotonicClock, SteppingClock};
pub use config::{InputSource, PipelineConfig};
pub use context::InferenceContext;
pub use error::{PipelineError, PipelineResult};
pub use scheduler::{CycleOutcome, CycleReport, CycleState, CycleStats, Scheduler};
