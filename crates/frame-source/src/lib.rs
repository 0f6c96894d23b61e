//! Frame sources for the meter stream.
//!
//! Sources run on their own threads and hand frames over a small bounded
//! channel; consumers pull through the [`FrameSource`] trait with a timeout.

pub mod draw;
pub mod simulator;
pub mod source;
pub mod still;
pub mod types;

pub use simulator::{SimulatorConfig, needle_angle, render_frame, spawn_simulator_reader};
pub use source::{ChannelSource, FrameSource, SourceKind, open_source};
pub use still::spawn_still_reader;
pub use types::{AcquireError, CaptureError, Frame};
