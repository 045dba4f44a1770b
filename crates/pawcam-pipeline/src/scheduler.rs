//! The inference cycle.
//!
//! One cycle walks `Idle -> Capturing -> Converting -> Inferring ->
//! Reporting -> Releasing -> Idle`. Every failure is logged once, counted
//! once and ends the cycle early; a captured frame is always released
//! before the scheduler returns to `Idle`.
//!
//! Without a frame source the scheduler runs detector-only: the input
//! tensor is filled once and each cycle goes straight to `Inferring`.

use crate::clock::Clock;
use crate::config::{InputSource, PipelineConfig};
use crate::context::InferenceContext;
use pawcam_camera::FrameSource;
use pawcam_color::{convert_frame, ConvertError};
use pawcam_core::{CycleMeasurement, Frame, FrameGeometry, FrameId};
use pawcam_engine::InputNormalization;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleState {
    Idle,
    Capturing,
    Converting,
    Inferring,
    Reporting,
    Releasing,
}

/// Result of one successful forward pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    /// The frame that was classified; `None` in detector-only mode.
    pub frame: Option<FrameId>,
    pub measurement: CycleMeasurement,
    pub score: f32,
    pub detected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    CaptureFailed,
    ConversionFailed,
    InvokeFailed,
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Running counters. `failure_events` goes up by exactly one for every
/// cycle that ends early.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    pub cycles: u64,
    pub completed: u64,
    pub capture_failures: u64,
    pub conversion_failures: u64,
    pub invoke_failures: u64,
    pub failure_events: u64,
    /// Conversions attempted.
    pub conversions: u64,
    /// Engine invocations attempted.
    pub invocations: u64,
}

#[derive(Debug, Clone, Copy)]
enum Failure {
    Capture,
    Conversion,
    Invoke,
}

impl CycleStats {
    fn record(&mut self, failure: Failure) {
        match failure {
            Failure::Capture => self.capture_failures += 1,
            Failure::Conversion => self.conversion_failures += 1,
            Failure::Invoke => self.invoke_failures += 1,
        }
        self.failure_events += 1;
    }
}

fn enter(state: &mut CycleState, next: CycleState) {
    trace!(from = ?*state, to = ?next, "Cycle state");
    *state = next;
}

/// A captured frame on loan from its source. Released explicitly on every
/// normal path; dropping an unreleased lease releases it too.
struct FrameLease<'a, S: FrameSource + ?Sized> {
    source: &'a mut S,
    frame: Option<Frame>,
}

impl<'a, S: FrameSource + ?Sized> FrameLease<'a, S> {
    fn convert_into(&self, dst: &mut [u8]) -> Result<usize, ConvertError> {
        match &self.frame {
            Some(frame) => convert_frame(frame, dst),
            None => Err(ConvertError::ConversionSizeMismatch {
                expected: dst.len(),
                written: 0,
            }),
        }
    }

    fn release(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.source.release(frame);
        }
    }
}

impl<'a, S: FrameSource + ?Sized> Drop for FrameLease<'a, S> {
    fn drop(&mut self) {
        if self.frame.is_some() {
            warn!("Releasing frame from an abandoned cycle");
            self.release();
        }
    }
}

/// Everything one cycle touches apart from the frame source.
struct CycleParts<'a, C> {
    context: &'a mut InferenceContext,
    clock: &'a C,
    staging: &'a mut [u8],
    normalization: InputNormalization,
    threshold: f32,
    state: &'a mut CycleState,
    stats: &'a mut CycleStats,
}

impl<'a, C: Clock> CycleParts<'a, C> {
    fn camera_cycle<S: FrameSource + ?Sized>(
        mut self,
        source: &mut S,
        geometry: FrameGeometry,
    ) -> CycleOutcome {
        enter(self.state, CycleState::Capturing);
        let frame = match source.capture_expecting(geometry.width, geometry.height) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "Camera capture failed");
                self.stats.record(Failure::Capture);
                return CycleOutcome::CaptureFailed;
            }
        };
        let frame_id = frame.id();
        let mut lease = FrameLease {
            source,
            frame: Some(frame),
        };

        enter(self.state, CycleState::Converting);
        self.stats.conversions += 1;
        let loaded = match lease.convert_into(self.staging) {
            Ok(_) => self
                .context
                .load_rgb888(self.staging, self.normalization)
                .map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };
        if let Err(error) = loaded {
            warn!(frame = frame_id.0, %error, "Frame conversion failed");
            self.stats.record(Failure::Conversion);
            enter(self.state, CycleState::Releasing);
            lease.release();
            return CycleOutcome::ConversionFailed;
        }

        let outcome = self.infer(Some(frame_id));
        enter(self.state, CycleState::Releasing);
        lease.release();
        outcome
    }

    fn static_cycle(mut self, value: u8, loaded: &mut bool) -> CycleOutcome {
        if !*loaded {
            self.staging.fill(value);
            if let Err(err) = self.context.load_rgb888(self.staging, self.normalization) {
                warn!(error = %err, "Static input rejected");
                self.stats.record(Failure::Conversion);
                return CycleOutcome::ConversionFailed;
            }
            *loaded = true;
            debug!(value, "Static input loaded");
        }
        self.infer(None)
    }

    /// Invoke and report; shared by both modes.
    fn infer(&mut self, frame: Option<FrameId>) -> CycleOutcome {
        enter(self.state, CycleState::Inferring);
        self.stats.invocations += 1;
        let start_us = self.clock.now_micros();
        let invoked = self.context.invoke();
        let end_us = self.clock.now_micros();

        let score = match invoked.and_then(|()| self.context.score()) {
            Ok(score) => score,
            Err(err) => {
                warn!(frame = frame.map(|f| f.0), error = %err, "Invoke failed");
                self.stats.record(Failure::Invoke);
                return CycleOutcome::InvokeFailed;
            }
        };

        enter(self.state, CycleState::Reporting);
        let measurement = CycleMeasurement::new(start_us, end_us);
        let detected = score >= self.threshold;
        info!(
            frame = frame.map(|f| f.0),
            latency_us = measurement.latency_us(),
            fps = measurement.throughput(),
            score,
            detected,
            "{measurement}, score: {score:.3}"
        );
        self.stats.completed += 1;
        CycleOutcome::Completed(CycleReport {
            frame,
            measurement,
            score,
            detected,
        })
    }
}

/// Drives the capture/inference loop.
pub struct Scheduler<S, C> {
    context: InferenceContext,
    source: Option<S>,
    clock: C,
    geometry: FrameGeometry,
    staging: Box<[u8]>,
    normalization: InputNormalization,
    threshold: f32,
    period: Duration,
    max_cycles: Option<u64>,
    static_value: u8,
    static_loaded: bool,
    state: CycleState,
    stats: CycleStats,
}

impl<C: Clock> Scheduler<Box<dyn FrameSource>, C> {
    /// Scheduler with no camera attached.
    pub fn detector_only(context: InferenceContext, clock: C, config: &PipelineConfig) -> Self {
        Self::new(context, None, clock, config)
    }
}

impl<S: FrameSource, C: Clock> Scheduler<S, C> {
    /// `source` decides the mode: with a source every cycle captures a
    /// frame, without one the detector runs on static input.
    pub fn new(
        context: InferenceContext,
        source: Option<S>,
        clock: C,
        config: &PipelineConfig,
    ) -> Self {
        let geometry = config.geometry();
        let static_value = match config.input {
            InputSource::Static { value } => value,
            _ => 0,
        };
        debug!(
            %geometry,
            has_camera = source.is_some(),
            period_ms = config.period_ms,
            "Scheduler created"
        );
        Self {
            context,
            source,
            clock,
            geometry,
            // Conversion target, allocated once.
            staging: vec![0u8; geometry.pixel_count() * 3].into_boxed_slice(),
            normalization: config.normalization,
            threshold: config.threshold,
            period: config.period(),
            max_cycles: config.max_cycles,
            static_value,
            static_loaded: false,
            state: CycleState::Idle,
            stats: CycleStats::default(),
        }
    }

    pub fn has_camera(&self) -> bool {
        self.source.is_some()
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn context(&self) -> &InferenceContext {
        &self.context
    }

    pub fn source(&self) -> Option<&S> {
        self.source.as_ref()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Last converted frame as interleaved RGB888.
    pub fn staging(&self) -> &[u8] {
        &self.staging
    }

    /// Run one cycle and return to `Idle`.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        self.stats.cycles += 1;
        let Self {
            context,
            source,
            clock,
            geometry,
            staging,
            normalization,
            threshold,
            static_value,
            static_loaded,
            state,
            stats,
            ..
        } = self;
        let parts = CycleParts {
            context,
            clock: &*clock,
            staging: &mut staging[..],
            normalization: *normalization,
            threshold: *threshold,
            state,
            stats,
        };
        let outcome = match source.as_mut() {
            Some(source) => parts.camera_cycle(source, *geometry),
            None => parts.static_cycle(*static_value, static_loaded),
        };
        enter(&mut self.state, CycleState::Idle);
        outcome
    }

    fn limit_reached(&self) -> bool {
        self.max_cycles
            .is_some_and(|max| self.stats.cycles >= max)
    }

    /// Cycle until `shutdown` is set or the cycle limit is hit, sleeping
    /// the fixed period between cycles.
    pub fn run(&mut self, shutdown: &AtomicBool) -> CycleStats {
        info!(
            period_ms = self.period.as_millis() as u64,
            has_camera = self.has_camera(),
            max_cycles = ?self.max_cycles,
            "Inference loop started"
        );
        while !shutdown.load(Ordering::Relaxed) && !self.limit_reached() {
            self.run_cycle();
            if shutdown.load(Ordering::Relaxed) || self.limit_reached() {
                break;
            }
            self.clock.sleep(self.period);
        }
        info!(
            cycles = self.stats.cycles,
            completed = self.stats.completed,
            failures = self.stats.failure_events,
            "Inference loop stopped"
        );
        self.stats
    }

    /// Tear down, handing back the context and the source.
    pub fn into_parts(self) -> (InferenceContext, Option<S>) {
        (self.context, self.source)
    }
}
