//! Integration tests for frame sources feeding the converter.
//!
//! Exercises pawcam-camera buffer ownership, pawcam-color conversion and
//! raw file replay through the scheduler.

use pawcam_camera::{CaptureError, FrameSource, Pattern, RawFileCamera, SyntheticCamera};
use pawcam_color::{convert_frame, expand_rgb565};
use pawcam_core::{memory_budget, FrameGeometry, PixelEncoding};
use pawcam_pipeline::{InferenceContext, InputSource, PipelineConfig, Scheduler, SteppingClock};
use std::io::Write;
use std::sync::atomic::AtomicBool;

// ── Helpers ────────────────────────────────────────────────────

fn stock_geometry() -> FrameGeometry {
    FrameGeometry::new(
        memory_budget::FRAME_WIDTH,
        memory_budget::FRAME_HEIGHT,
        PixelEncoding::Rgb565,
    )
}

/// Dump of frames, each filled with one RGB565 value.
fn write_dump(pixels: &[u16], pixel_count: usize) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for value in pixels {
        for _ in 0..pixel_count {
            file.write_all(&value.to_be_bytes()).unwrap();
        }
    }
    file.flush().unwrap();
    file
}

fn small_config(path: &std::path::Path) -> PipelineConfig {
    PipelineConfig {
        width: 8,
        height: 8,
        arena_bytes: 64 * 1024,
        input: InputSource::Camera {
            path: path.to_path_buf(),
        },
        ..Default::default()
    }
}

// ── Buffer ownership ───────────────────────────────────────────

#[test]
fn thousand_capture_release_cycles_never_starve() {
    let mut camera = SyntheticCamera::new(stock_geometry(), Pattern::ColorBars);
    let mut staging = vec![0u8; 96 * 96 * 3];

    for _ in 0..1000 {
        let frame = camera.capture_expecting(96, 96).unwrap();
        assert_eq!(convert_frame(&frame, &mut staging).unwrap(), staging.len());
        camera.release(frame);
    }
    assert_eq!(camera.captures(), 1000);
    assert_eq!(camera.pool().outstanding(), 0);
}

#[test]
fn unreleased_frame_starves_the_next_capture() {
    let mut camera = SyntheticCamera::new(stock_geometry(), Pattern::Solid(0));
    let held = camera.capture().unwrap();

    let err = camera.capture().unwrap_err();
    assert!(matches!(
        err,
        CaptureError::NoBuffer {
            outstanding: 1,
            capacity: 1
        }
    ));

    camera.release(held);
    let frame = camera.capture().unwrap();
    camera.release(frame);
}

#[test]
fn converted_bars_match_pixel_expansion() {
    let mut camera = SyntheticCamera::new(stock_geometry(), Pattern::ColorBars);
    let frame = camera.capture().unwrap();
    let mut staging = vec![0u8; 96 * 96 * 3];
    convert_frame(&frame, &mut staging).unwrap();

    for (px, rgb) in frame.data().chunks_exact(2).zip(staging.chunks_exact(3)) {
        assert_eq!(rgb, expand_rgb565(u16::from_be_bytes([px[0], px[1]])));
    }
    camera.release(frame);
}

// ── Raw file replay ────────────────────────────────────────────

#[test]
fn raw_dump_drives_the_scheduler() {
    let dump = write_dump(&[0x0000, 0xFFFF], 8 * 8);
    let config = PipelineConfig {
        max_cycles: Some(4),
        ..small_config(dump.path())
    };
    let camera = RawFileCamera::open(dump.path(), config.width, config.height).unwrap();
    let context = InferenceContext::from_config(&config).unwrap();
    let clock = SteppingClock::new(100);
    let mut scheduler = Scheduler::new(context, Some(camera), &clock, &config);

    let stats = scheduler.run(&AtomicBool::new(false));
    assert_eq!(stats.completed, 4);

    // Playback looped once and stopped on the white frame.
    assert_eq!(scheduler.source().unwrap().position(), 2);
    assert!(scheduler.staging().iter().all(|&b| b == 255));
}

#[test]
fn configured_camera_input_opens_the_dump() {
    let dump = write_dump(&[0x1234], 8 * 8);
    let config = small_config(dump.path());

    let mut source = config.input.open(config.geometry()).unwrap().unwrap();
    let frame = source.capture_expecting(8, 8).unwrap();
    assert_eq!(&frame.data()[..2], &[0x12, 0x34]);
    source.release(frame);
}

#[test]
fn wrong_sized_dump_is_rejected_at_open() {
    let dump = write_dump(&[0], 8 * 8);
    let config = PipelineConfig {
        width: 96,
        height: 96,
        ..small_config(dump.path())
    };
    assert!(config.input.open(config.geometry()).is_err());
}
