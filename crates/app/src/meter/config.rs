use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result, bail};
use clap::Args;
use frame_source::{SimulatorConfig, SourceKind};
use gauge_core::{DetectorSettings, GaugeCalibration, Point};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Flags of the `serve` subcommand.
#[derive(Args, Clone, Debug)]
pub struct MeterCliArgs {
    /// Address the HTTP server binds to.
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,
    #[arg(long, default_value_t = 5000)]
    pub port: u16,
    /// `sim` for simulated dials, otherwise an image file or a directory of images.
    #[arg(long, default_value = "sim")]
    pub source: String,
    #[arg(long, default_value_t = 640)]
    pub width: u32,
    #[arg(long, default_value_t = 480)]
    pub height: u32,
    /// Target frames per second for every session.
    #[arg(long, default_value_t = 5.0)]
    pub fps: f64,
    /// Consecutive acquire/encode failures that stop a session.
    #[arg(long, default_value_t = 5)]
    pub failure_threshold: u32,
    #[arg(long, default_value_t = 1000)]
    pub acquire_timeout_ms: u64,
    #[arg(long, default_value_t = 85)]
    pub jpeg_quality: u8,
    /// Frames buffered per subscriber before new frames are dropped.
    #[arg(long, default_value_t = 8)]
    pub sink_capacity: usize,
    /// JSON file with detector settings and gauge calibrations.
    #[arg(long)]
    pub calibrations: Option<PathBuf>,
    /// Write span timings in Chrome trace format to this file.
    #[arg(long)]
    pub chrome_trace: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct TelemetryOptions {
    pub chrome_trace_path: Option<PathBuf>,
}

/// Per-session pump tunables.
#[derive(Clone, Debug, PartialEq)]
pub struct PumpSettings {
    pub target_fps: f64,
    pub failure_threshold: u32,
    pub acquire_timeout: Duration,
    pub jpeg_quality: u8,
}

impl Default for PumpSettings {
    fn default() -> Self {
        Self {
            target_fps: 5.0,
            failure_threshold: 5,
            acquire_timeout: Duration::from_millis(1000),
            jpeg_quality: 85,
        }
    }
}

impl PumpSettings {
    /// Time budget of one cycle.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps)
    }
}

/// Detector settings plus the gauges read on every frame.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CalibrationSet {
    #[serde(default)]
    pub detector: DetectorSettings,
    #[serde(default)]
    pub gauges: Vec<GaugeCalibration>,
}

impl CalibrationSet {
    /// Calibrations matching the dials drawn by the simulator.
    pub fn simulated(simulator: &SimulatorConfig) -> Self {
        let gauges = (0..simulator.dials)
            .map(|dial| {
                let (x, y) = simulator.dial_center(dial);
                GaugeCalibration::new(
                    SimulatorConfig::dial_label(dial),
                    Point::new(x, y),
                    simulator.radius,
                    (-45.0, 225.0),
                    (0.0, 100.0),
                )
                .with_unit("%")
            })
            .collect();
        Self {
            detector: DetectorSettings::default(),
            gauges,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read calibrations from {}", path.display()))?;
        let set: CalibrationSet = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse calibrations in {}", path.display()))?;
        for gauge in &set.gauges {
            if let Err(err) = gauge.validate() {
                warn!("calibration {} is unusable and will always read NOT_FOUND: {err}", gauge.id());
            }
        }
        info!(gauges = set.gauges.len(), "loaded calibrations from {}", path.display());
        Ok(set)
    }

    /// Calibrations from `path` when given, the simulated dials otherwise.
    pub fn load_or_simulated(path: Option<&Path>, simulator: &SimulatorConfig) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::simulated(simulator)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MeterConfig {
    pub bind: String,
    pub port: u16,
    pub source_uri: String,
    pub source_kind: SourceKind,
    pub simulator: SimulatorConfig,
    pub pump: PumpSettings,
    pub sink_capacity: usize,
    pub calibrations: Arc<CalibrationSet>,
}

impl TryFrom<MeterCliArgs> for MeterConfig {
    type Error = anyhow::Error;

    fn try_from(args: MeterCliArgs) -> Result<Self> {
        if args.width == 0 || args.height == 0 {
            bail!("--width and --height must be positive");
        }
        if !args.fps.is_finite() || args.fps <= 0.0 || args.fps > 120.0 {
            bail!("--fps must be within (0, 120]");
        }
        if args.failure_threshold == 0 {
            bail!("--failure-threshold must be at least 1");
        }
        if args.acquire_timeout_ms == 0 {
            bail!("--acquire-timeout-ms must be at least 1");
        }
        if !(1..=100).contains(&args.jpeg_quality) {
            bail!("--jpeg-quality must be an integer between 1 and 100");
        }
        if args.sink_capacity == 0 {
            bail!("--sink-capacity must be at least 1");
        }

        let source_kind = SourceKind::from_uri(&args.source);
        let simulator = SimulatorConfig {
            width: args.width,
            height: args.height,
            ..SimulatorConfig::default()
        };
        let calibrations = CalibrationSet::load_or_simulated(args.calibrations.as_deref(), &simulator)?;

        Ok(Self {
            bind: args.bind,
            port: args.port,
            source_uri: args.source,
            source_kind,
            simulator,
            pump: PumpSettings {
                target_fps: args.fps,
                failure_threshold: args.failure_threshold,
                acquire_timeout: Duration::from_millis(args.acquire_timeout_ms),
                jpeg_quality: args.jpeg_quality,
            },
            sink_capacity: args.sink_capacity,
            calibrations: Arc::new(calibrations),
        })
    }
}
