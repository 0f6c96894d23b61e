use gauge_core::Reading;
use serde::Serialize;

pub(crate) type SessionId = u64;

/// Everything published for one processed frame.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct FrameResult {
    pub(crate) session_id: SessionId,
    pub(crate) frame_number: u64,
    pub(crate) timestamp_ms: i64,
    /// Wall-clock time of day, `%H:%M:%S`.
    pub(crate) time: String,
    pub(crate) readings: Vec<Reading>,
    pub(crate) frame: EncodedFrame,
}

/// Encoded image ready to embed in a JSON payload.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct EncodedFrame {
    pub(crate) mime: &'static str,
    /// Base64 (standard alphabet) of the encoded bytes.
    pub(crate) data: String,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct SessionStatus {
    pub(crate) session_id: SessionId,
    pub(crate) state: &'static str,
    pub(crate) running: bool,
    pub(crate) gauges: usize,
    /// Measured publish rate (frames per second, smoothed).
    pub(crate) rate: f64,
    pub(crate) target_rate: f64,
    pub(crate) frames_published: u64,
    pub(crate) consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) stop_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) last_error: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct ServiceStatus {
    pub(crate) status: &'static str,
    pub(crate) version: &'static str,
    pub(crate) source: String,
    pub(crate) gauges: usize,
    pub(crate) target_fps: f64,
    pub(crate) active_sessions: usize,
    pub(crate) sessions: Vec<SessionStatus>,
    pub(crate) last_update: String,
}

/// First event sent to a new subscriber.
#[derive(Serialize)]
pub(crate) struct ConnectionResponse {
    pub(crate) status: &'static str,
    pub(crate) session_id: SessionId,
    pub(crate) gauges: usize,
    pub(crate) target_fps: f64,
}
