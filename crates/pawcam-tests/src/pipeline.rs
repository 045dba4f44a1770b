//! Integration tests for the capture/convert/infer cycle.
//!
//! Exercises pawcam-camera, pawcam-color, pawcam-engine and the scheduler
//! in pawcam-pipeline together, on the stock 96x96 geometry.

use pawcam_camera::{Pattern, SyntheticCamera};
use pawcam_core::FrameId;
use pawcam_pipeline::{
    CycleOutcome, CycleState, InferenceContext, InputSource, PipelineConfig, Scheduler,
    SteppingClock,
};
use std::sync::atomic::AtomicBool;
use std::time::Duration;

// ── Helpers ────────────────────────────────────────────────────

fn stock_scheduler<'c>(
    camera: SyntheticCamera,
    clock: &'c SteppingClock,
    config: &PipelineConfig,
) -> Scheduler<SyntheticCamera, &'c SteppingClock> {
    let context = InferenceContext::from_config(config).unwrap();
    Scheduler::new(context, Some(camera), clock, config)
}

fn camera(config: &PipelineConfig, pattern: Pattern) -> SyntheticCamera {
    SyntheticCamera::new(config.geometry(), pattern)
}

// ── Single cycle ───────────────────────────────────────────────

#[test]
fn black_frame_converts_to_zeros_and_scores() {
    let config = PipelineConfig::default();
    let clock = SteppingClock::new(2_000);
    let mut scheduler = stock_scheduler(camera(&config, Pattern::Solid(0)), &clock, &config);

    let outcome = scheduler.run_cycle();
    let report = outcome.report().unwrap();

    assert_eq!(scheduler.staging().len(), 96 * 96 * 3);
    assert!(scheduler.staging().iter().all(|&b| b == 0));
    assert_eq!(report.frame, Some(FrameId(0)));
    assert!(report.measurement.latency_us() > 0);
    assert_eq!(
        report.measurement.throughput(),
        Some(1_000_000 / report.measurement.latency_us())
    );
    assert!((0.0..1.0).contains(&report.score));
    assert_eq!(report.detected, report.score >= config.threshold);
}

#[test]
fn white_frame_expands_to_full_scale() {
    let config = PipelineConfig::default();
    let clock = SteppingClock::new(1);
    let mut scheduler = stock_scheduler(camera(&config, Pattern::Solid(0xFFFF)), &clock, &config);

    assert!(scheduler.run_cycle().is_completed());
    assert!(scheduler.staging().iter().all(|&b| b == 255));
}

#[test]
fn same_frame_gives_same_score() {
    let config = PipelineConfig::default();
    let clock = SteppingClock::new(1);
    let mut scheduler = stock_scheduler(camera(&config, Pattern::ColorBars), &clock, &config);

    let first = scheduler.run_cycle();
    let second = scheduler.run_cycle();
    assert_eq!(
        first.report().unwrap().score,
        second.report().unwrap().score
    );
    assert_eq!(second.report().unwrap().frame, Some(FrameId(1)));
}

// ── Failures ───────────────────────────────────────────────────

#[test]
fn capture_failure_is_counted_once_and_skips_the_rest() {
    let config = PipelineConfig::default();
    let clock = SteppingClock::new(1);
    let source = camera(&config, Pattern::Solid(0)).with_dropout_every(1);
    let mut scheduler = stock_scheduler(source, &clock, &config);

    assert_eq!(scheduler.run_cycle(), CycleOutcome::CaptureFailed);
    assert_eq!(scheduler.state(), CycleState::Idle);

    let stats = scheduler.stats();
    assert_eq!(stats.failure_events, 1);
    assert_eq!(stats.conversions, 0);
    assert_eq!(stats.invocations, 0);
}

#[test]
fn intermittent_dropouts_do_not_stop_the_loop() {
    let config = PipelineConfig {
        max_cycles: Some(9),
        period_ms: 5,
        ..Default::default()
    };
    let clock = SteppingClock::new(1);
    let source = camera(&config, Pattern::Sine { period_frames: 4 }).with_dropout_every(3);
    let mut scheduler = stock_scheduler(source, &clock, &config);

    let stats = scheduler.run(&AtomicBool::new(false));
    assert_eq!(stats.cycles, 9);
    assert_eq!(stats.capture_failures, 3);
    assert_eq!(stats.completed, 6);
    assert_eq!(stats.failure_events, 3);
    // Eight sleeps between nine cycles.
    assert_eq!(clock.slept(), Duration::from_millis(40));
    assert_eq!(scheduler.source().unwrap().pool().outstanding(), 0);
}

// ── Detector-only ──────────────────────────────────────────────

#[test]
fn detector_only_runs_without_a_camera() {
    let config = PipelineConfig {
        input: InputSource::Static { value: 0 },
        max_cycles: Some(3),
        ..Default::default()
    };
    let source = config.input.open(config.geometry()).unwrap();
    assert!(source.is_none());

    let context = InferenceContext::from_config(&config).unwrap();
    let clock = SteppingClock::new(10);
    let mut scheduler = Scheduler::new(context, source, &clock, &config);

    let stats = scheduler.run(&AtomicBool::new(false));
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.conversions, 0);
    assert_eq!(stats.invocations, 3);
}

// ── Teardown ───────────────────────────────────────────────────

#[test]
fn teardown_hands_back_an_idle_source() {
    let config = PipelineConfig {
        max_cycles: Some(2),
        ..Default::default()
    };
    let clock = SteppingClock::new(1);
    let mut scheduler = stock_scheduler(camera(&config, Pattern::ColorBars), &clock, &config);
    scheduler.run(&AtomicBool::new(false));

    let (context, source) = scheduler.into_parts();
    let source = source.unwrap();
    assert_eq!(source.captures(), 2);
    assert_eq!(source.pool().outstanding(), 0);
    assert!(context.arena().used() > 0);
    context.shutdown();
}
