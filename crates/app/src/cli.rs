use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use frame_source::{SimulatorConfig, render_frame};
use gauge_core::GaugeReader;
use tracing::info;

use crate::meter::{self, CalibrationSet, MeterCliArgs, MeterConfig, TelemetryOptions};

#[derive(Parser, Debug)]
#[command(name = "meter-stream", version, about = "Reads analog meters from a frame stream and serves them to the browser")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the dashboard and the live push channel.
    Serve(MeterCliArgs),
    /// Read the gauges of one image and print the readings as JSON.
    Read(ReadArgs),
    /// Render one simulated frame to an image file.
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
struct ReadArgs {
    image: PathBuf,
    /// JSON calibrations; defaults to the simulated dials.
    #[arg(long)]
    calibrations: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    output: PathBuf,
    #[arg(long, default_value_t = 0)]
    frame: u64,
    #[arg(long, default_value_t = 640)]
    width: u32,
    #[arg(long, default_value_t = 480)]
    height: u32,
}

pub fn handle_commands(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve(args) => {
            let _telemetry_guard = meter::init_tracing(&TelemetryOptions {
                chrome_trace_path: args.chrome_trace.clone(),
            });
            meter::run(MeterConfig::try_from(args)?)
        }
        Command::Read(args) => {
            let _telemetry_guard = meter::init_tracing(&TelemetryOptions::default());
            println!("{}", read_gauges(&args)?);
            Ok(())
        }
        Command::Simulate(args) => {
            let _telemetry_guard = meter::init_tracing(&TelemetryOptions::default());
            let config = SimulatorConfig {
                width: args.width,
                height: args.height,
                ..SimulatorConfig::default()
            };
            render_frame(&config, args.frame)
                .save(&args.output)
                .with_context(|| format!("failed to write {}", args.output.display()))?;
            info!(frame = args.frame, "wrote simulated frame to {}", args.output.display());
            Ok(())
        }
    }
}

fn read_gauges(args: &ReadArgs) -> Result<String> {
    let image = image::open(&args.image)
        .with_context(|| format!("failed to open {}", args.image.display()))?
        .to_rgb8();
    let simulator = SimulatorConfig {
        width: image.width(),
        height: image.height(),
        ..SimulatorConfig::default()
    };
    let calibrations = CalibrationSet::load_or_simulated(args.calibrations.as_deref(), &simulator)?;
    let readings = GaugeReader::new(calibrations.detector).detect(&image, &calibrations.gauges);
    serde_json::to_string_pretty(&readings).context("failed to serialize readings")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::Value;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_flags_parse() {
        let cli = Cli::try_parse_from(["meter-stream", "serve", "--port", "8080", "--fps", "2.5", "--source", "frames/"])
            .expect("parse");
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, 8080);
        assert_eq!(args.fps, 2.5);
        assert_eq!(args.failure_threshold, 5);
        assert_eq!(args.source, "frames/");
    }

    #[test]
    fn read_reports_simulated_dials() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("frame.png");
        render_frame(&SimulatorConfig::default(), 40).save(&path).expect("write frame");

        let json = read_gauges(&ReadArgs {
            image: path,
            calibrations: None,
        })
        .expect("read");
        let readings: Value = serde_json::from_str(&json).expect("json");
        assert_eq!(readings.as_array().map(Vec::len), Some(2));
        assert_eq!(readings[0]["gauge_id"], "METER-1");
        assert_eq!(readings[0]["status"], "OK");
    }
}
