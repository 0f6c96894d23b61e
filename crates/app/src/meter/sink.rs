//! Transport side of the pump: where finished frames go.

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::trace;

use crate::meter::data::{FrameResult, SessionId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub(crate) enum PublishError {
    /// The subscriber is behind; the frame was not delivered.
    #[error("subscriber queue is full")]
    Full,
    #[error("subscriber disconnected")]
    Disconnected,
}

/// Fire-and-forget delivery of frame results to one subscriber.
pub(crate) trait FrameSink: Send {
    fn publish(&self, session: SessionId, result: FrameResult) -> Result<(), PublishError>;
}

/// Sink feeding a bounded Tokio channel drained by an HTTP event stream.
pub(crate) struct ChannelSink {
    tx: mpsc::Sender<FrameResult>,
}

impl ChannelSink {
    pub(crate) fn new(tx: mpsc::Sender<FrameResult>) -> Self {
        Self { tx }
    }
}

impl FrameSink for ChannelSink {
    fn publish(&self, session: SessionId, result: FrameResult) -> Result<(), PublishError> {
        let frame_number = result.frame_number;
        match self.tx.try_send(result) {
            Ok(()) => {
                trace!(session, frame = frame_number, "frame queued for subscriber");
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(PublishError::Full),
            Err(TrySendError::Closed(_)) => Err(PublishError::Disconnected),
        }
    }
}
