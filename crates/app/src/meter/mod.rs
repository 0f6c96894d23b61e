//! Meter streaming service: per-session pumps that read analog dials from a
//! frame source and push annotated frames to browser subscribers.
//!
//! The module is split into focused submodules:
//! - `config`: CLI flags, calibration loading and validated settings.
//! - `pump`: The acquire → detect → publish loop of one session.
//! - `control`: Pump lifecycle shared with the control surface.
//! - `session`: Session registry behind the HTTP control routes.
//! - `sink`: Delivery of frame results to subscribers.
//! - `annotation`: Overlay of readings onto outgoing frames.
//! - `encoding`: JPEG/base64 encoding for transport.
//! - `server`: Actix Web endpoints.
//! - `telemetry`: Tracing subscriber and Prometheus recorder.
//! - `data`: Shared structs serialized to subscribers.

pub use config::{CalibrationSet, MeterCliArgs, MeterConfig, TelemetryOptions};
/// Serve the dashboard and push channel with a ready-made configuration.
pub use server::run;
pub(crate) use telemetry::init_tracing;

mod annotation;
mod config;
mod control;
mod data;
mod encoding;
mod pump;
mod server;
mod session;
mod sink;
mod telemetry;
