//! Integration tests for model artifacts on disk.
//!
//! Exercises the pawcam-engine artifact format through the config-driven
//! startup path in pawcam-pipeline.

use pawcam_engine::{demo, InitError, InputNormalization, Model, SUPPORTED_SCHEMA_VERSION};
use pawcam_pipeline::{InferenceContext, PipelineConfig, PipelineError};

// ── Helpers ────────────────────────────────────────────────────

fn config_with_model(bytes: &[u8], dir: &tempfile::TempDir) -> PipelineConfig {
    let path = dir.path().join("classifier.pawm");
    std::fs::write(&path, bytes).unwrap();
    PipelineConfig {
        model: Some(path),
        ..Default::default()
    }
}

fn score_of(mut context: InferenceContext, pixels: &[u8]) -> f32 {
    context
        .load_rgb888(pixels, InputNormalization::SIGNED_UNIT)
        .unwrap();
    context.invoke().unwrap();
    context.score().unwrap()
}

// ── Loading ────────────────────────────────────────────────────

#[test]
fn model_file_matches_builtin_model() {
    let dir = tempfile::tempdir().unwrap();
    let builtin = demo::classifier_model(96, 96).unwrap();
    let config = config_with_model(builtin.bytes(), &dir);

    let from_file = InferenceContext::from_config(&config).unwrap();
    let from_memory = InferenceContext::new(builtin, config.arena_bytes).unwrap();
    assert_eq!(
        from_file.engine().arena_used_bytes(),
        from_memory.engine().arena_used_bytes()
    );

    let pixels: Vec<u8> = (0..96 * 96 * 3).map(|i| (i % 251) as u8).collect();
    assert_eq!(score_of(from_file, &pixels), score_of(from_memory, &pixels));
}

#[test]
fn loaded_model_reports_schema_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("m.pawm");
    std::fs::write(&path, demo::classifier_model(8, 8).unwrap().bytes()).unwrap();

    let model = Model::load(&path).unwrap();
    assert_eq!(model.schema_version().unwrap(), SUPPORTED_SCHEMA_VERSION);
}

// ── Fatal startup errors ───────────────────────────────────────

#[test]
fn truncated_model_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = demo::classifier_model(96, 96).unwrap().bytes().to_vec();
    let config = config_with_model(&bytes[..100], &dir);

    assert!(matches!(
        InferenceContext::from_config(&config),
        Err(PipelineError::Init(InitError::MalformedModel(_)))
    ));
}

#[test]
fn foreign_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_model(b"this is not a model at all", &dir);

    assert!(matches!(
        InferenceContext::from_config(&config),
        Err(PipelineError::Init(InitError::MalformedModel(_)))
    ));
}

#[test]
fn undersized_arena_is_fatal() {
    let config = PipelineConfig {
        arena_bytes: 16 * 1024,
        ..Default::default()
    };
    match InferenceContext::from_config(&config) {
        Err(PipelineError::Init(InitError::ArenaExhausted {
            required,
            available,
        })) => {
            assert_eq!(available, 16 * 1024);
            assert!(required > available);
        }
        other => panic!("expected arena exhaustion, got {:?}", other.err()),
    }
}
