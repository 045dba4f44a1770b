//! PawCam - Single-class camera classifier
//!
//! Entry point: builds the inference context once, then runs the
//! capture/convert/infer loop until Ctrl+C or the configured cycle limit.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use pawcam_camera::Pattern;
use pawcam_pipeline::{InferenceContext, InputSource, MonotonicClock, PipelineConfig, Scheduler};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PatternArg {
    Bars,
    Sine,
    Black,
    White,
}

impl From<PatternArg> for Pattern {
    fn from(arg: PatternArg) -> Self {
        match arg {
            PatternArg::Bars => Pattern::ColorBars,
            PatternArg::Sine => Pattern::Sine { period_frames: 30 },
            PatternArg::Black => Pattern::Solid(0x0000),
            PatternArg::White => Pattern::Solid(0xFFFF),
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "PawCam - single-class camera classifier", long_about = None)]
struct Args {
    /// Pipeline configuration file (JSON). Flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model artifact. The built-in classifier runs when omitted.
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Replay raw big-endian RGB565 frames from a file
    #[arg(long, conflicts_with_all = ["pattern", "static_value"])]
    frames: Option<PathBuf>,

    /// Synthetic camera pattern
    #[arg(long, value_enum, conflicts_with = "static_value")]
    pattern: Option<PatternArg>,

    /// Run the detector without a camera on a constant input value
    #[arg(long = "static", value_name = "VALUE")]
    static_value: Option<u8>,

    /// Delay between cycles in milliseconds
    #[arg(long)]
    period_ms: Option<u64>,

    /// Stop after this many cycles
    #[arg(short = 'n', long)]
    max_cycles: Option<u64>,

    /// Detection threshold for the score
    #[arg(long)]
    threshold: Option<f32>,

    /// Tensor arena size in bytes
    #[arg(long)]
    arena_bytes: Option<usize>,

    /// Write the effective configuration as JSON and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,

    /// Write the final cycle counters as JSON
    #[arg(long, value_name = "PATH")]
    stats: Option<PathBuf>,
}

impl Args {
    /// Config file (or defaults) with command-line overrides applied.
    fn effective_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(model) = &self.model {
            config.model = Some(model.clone());
        }
        if let Some(path) = &self.frames {
            config.input = InputSource::Camera { path: path.clone() };
        }
        if let Some(pattern) = self.pattern {
            config.input = InputSource::Pattern {
                pattern: pattern.into(),
            };
        }
        if let Some(value) = self.static_value {
            config.input = InputSource::Static { value };
        }
        if let Some(period_ms) = self.period_ms {
            config.period_ms = period_ms;
        }
        if let Some(max_cycles) = self.max_cycles {
            config.max_cycles = Some(max_cycles);
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(arena_bytes) = self.arena_bytes {
            config.arena_bytes = arena_bytes;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = args.effective_config()?;

    if let Some(path) = &args.write_config {
        config.save(path)?;
        info!(path = %path.display(), "Wrote configuration");
        return Ok(());
    }

    info!("PawCam starting...");
    pawcam_camera::init();

    // Fatal: nothing runs without a working engine.
    let context =
        InferenceContext::from_config(&config).context("failed to initialize inference")?;
    info!(
        input = ?context.input_info().shape,
        output = ?context.output_info().shape,
        arena_used = context.engine().arena_used_bytes(),
        "Inference engine ready"
    );

    let source = config.input.open(config.geometry())?;
    if source.is_none() {
        info!("No camera configured, running detector only");
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %err, "Failed to install Ctrl+C handler");
    }

    let mut scheduler = Scheduler::new(context, source, MonotonicClock::new(), &config);
    let stats = scheduler.run(&shutdown);

    if let Some(path) = &args.stats {
        let json = serde_json::to_vec_pretty(&stats)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write stats to {}", path.display()))?;
    }

    let (context, _source) = scheduler.into_parts();
    context.shutdown();
    info!("PawCam stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("pawcam").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_without_flags() {
        let config = parse(&[]).effective_config().unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_flags_override_config() {
        let config = parse(&["--static", "9", "--period-ms", "20", "-n", "4"])
            .effective_config()
            .unwrap();
        assert_eq!(config.input, InputSource::Static { value: 9 });
        assert_eq!(config.period_ms, 20);
        assert_eq!(config.max_cycles, Some(4));
    }

    #[test]
    fn test_pattern_flag() {
        let config = parse(&["--pattern", "white"]).effective_config().unwrap();
        assert_eq!(
            config.input,
            InputSource::Pattern {
                pattern: Pattern::Solid(0xFFFF)
            }
        );
    }

    #[test]
    fn test_input_flags_conflict() {
        let argv = ["pawcam", "--static", "0", "--pattern", "bars"];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_invalid_override_rejected() {
        assert!(parse(&["--threshold", "2.0"]).effective_config().is_err());
    }

    #[test]
    fn test_config_file_then_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, br#"{"period_ms": 100, "threshold": 0.8}"#).unwrap();

        let config = parse(&["--config", path.to_str().unwrap(), "--threshold", "0.25"])
            .effective_config()
            .unwrap();
        assert_eq!(config.period_ms, 100);
        assert_eq!(config.threshold, 0.25);
    }
}
