use std::{path::PathBuf, time::Duration};

use anyhow::Error;
use image::RgbImage;
use thiserror::Error;

/// Decoded RGB frame produced by a frame source.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    /// Per-source frame counter, starting at zero.
    pub sequence: u64,
    pub timestamp_ms: i64,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open video source {uri:?}")]
    Open { uri: String },
    #[error("failed to decode {path:?}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Other(#[from] Error),
}

/// Why a bounded pull did not yield a frame.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("no frame within {0:?}")]
    Timeout(Duration),
    #[error("frame source disconnected")]
    Disconnected,
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

impl AcquireError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AcquireError::Timeout(_) => "timeout",
            AcquireError::Disconnected => "disconnected",
            AcquireError::Capture(_) => "capture",
        }
    }
}
