//! Pull-based access to frame producers.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::{
    simulator::{SimulatorConfig, spawn_simulator_reader},
    still::spawn_still_reader,
    types::{AcquireError, CaptureError, Frame},
};

/// Producer of frames pulled one at a time with a bounded wait.
pub trait FrameSource: Send {
    fn next_frame(&mut self, timeout: Duration) -> Result<Frame, AcquireError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self, timeout: Duration) -> Result<Frame, AcquireError> {
        (**self).next_frame(timeout)
    }
}

/// Frame source backed by a reader thread's channel.
///
/// Dropping the source drops the receiver, which lets the reader thread exit
/// on its next send.
pub struct ChannelSource {
    rx: Receiver<Result<Frame, CaptureError>>,
}

impl ChannelSource {
    pub fn new(rx: Receiver<Result<Frame, CaptureError>>) -> Self {
        Self { rx }
    }
}

impl FrameSource for ChannelSource {
    fn next_frame(&mut self, timeout: Duration) -> Result<Frame, AcquireError> {
        match self.rx.recv_timeout(timeout) {
            Ok(Ok(frame)) => Ok(frame),
            Ok(Err(err)) => Err(AcquireError::Capture(err)),
            Err(RecvTimeoutError::Timeout) => Err(AcquireError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(AcquireError::Disconnected),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// Synthetic dials drawn on the fly.
    Simulator,
    /// A still image, or a directory of images replayed in name order.
    Still(PathBuf),
}

impl SourceKind {
    pub fn from_uri(uri: &str) -> Self {
        match uri {
            "sim" | "simulator" => SourceKind::Simulator,
            other => SourceKind::Still(PathBuf::from(other.strip_prefix("file://").unwrap_or(other))),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Simulator => "simulator",
            SourceKind::Still(_) => "still",
        }
    }
}

/// Spawn the reader for `kind` and wrap it as a [`FrameSource`].
///
/// `frame_interval` paces both readers. A simulator config that already sets
/// its own interval keeps it.
pub fn open_source(kind: &SourceKind, simulator: &SimulatorConfig, frame_interval: Duration) -> Result<ChannelSource> {
    let rx = match kind {
        SourceKind::Simulator => spawn_simulator_reader(SimulatorConfig {
            frame_interval: simulator.frame_interval.or(Some(frame_interval)),
            ..simulator.clone()
        })?,
        SourceKind::Still(path) => spawn_still_reader(Path::new(path), frame_interval)?,
    };
    Ok(ChannelSource::new(rx))
}
