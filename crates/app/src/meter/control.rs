//! Pump lifecycle shared between a pump thread and the control surface.

use std::{
    fmt,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum StopReason {
    Requested,
    SubscriberDisconnected,
    FailureThreshold { failures: u32, last_error: String },
    /// The pump thread could not be launched.
    StartFailed(String),
}

impl StopReason {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            StopReason::Requested => "requested",
            StopReason::SubscriberDisconnected => "subscriber_disconnected",
            StopReason::FailureThreshold { .. } => "failure_threshold",
            StopReason::StartFailed(_) => "start_failed",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::FailureThreshold { failures, last_error } => {
                write!(f, "{failures} consecutive failures (last: {last_error})")
            }
            StopReason::StartFailed(error) => write!(f, "start failed: {error}"),
            other => f.write_str(other.label()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum PumpState {
    Idle,
    Running,
    Stopped(StopReason),
}

impl PumpState {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            PumpState::Idle => "idle",
            PumpState::Running => "running",
            PumpState::Stopped(_) => "stopped",
        }
    }
}

/// Lifecycle and counters of one pump.
///
/// The pump thread owns the transitions out of `Running`; the control surface
/// only moves `Idle` to `Running` and raises the stop flag, which the pump
/// observes at the top of its next cycle.
pub(crate) struct PumpControl {
    state: Mutex<PumpState>,
    stop_flag: AtomicBool,
    stop_request: Mutex<Option<StopReason>>,
    consecutive_failures: AtomicU32,
    frames_published: AtomicU64,
    rate_bits: AtomicU64,
    last_error: Mutex<Option<String>>,
}

/// Point-in-time copy of a [`PumpControl`].
#[derive(Clone, Debug)]
pub(crate) struct PumpSnapshot {
    pub(crate) state: PumpState,
    pub(crate) consecutive_failures: u32,
    pub(crate) frames_published: u64,
    pub(crate) rate: f64,
    pub(crate) last_error: Option<String>,
}

impl PumpControl {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(PumpState::Idle),
            stop_flag: AtomicBool::new(false),
            stop_request: Mutex::new(None),
            consecutive_failures: AtomicU32::new(0),
            frames_published: AtomicU64::new(0),
            rate_bits: AtomicU64::new(0f64.to_bits()),
            last_error: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> PumpState {
        match self.state.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// `Idle` to `Running`. Returns the current state when the move is invalid.
    pub(crate) fn begin(&self) -> Result<(), PumpState> {
        let mut guard = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match *guard {
            PumpState::Idle => {
                *guard = PumpState::Running;
                Ok(())
            }
            ref other => Err(other.clone()),
        }
    }

    /// Ask the pump to stop. The first reason wins; an idle pump stops at once.
    pub(crate) fn request_stop(&self, reason: StopReason) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match *state {
            PumpState::Idle => *state = PumpState::Stopped(reason),
            PumpState::Running => {
                if let Ok(mut request) = self.stop_request.lock() {
                    request.get_or_insert(reason);
                }
                self.stop_flag.store(true, Ordering::SeqCst);
            }
            PumpState::Stopped(_) => {}
        }
    }

    /// Pending stop request, if any.
    pub(crate) fn stop_requested(&self) -> Option<StopReason> {
        if !self.stop_flag.load(Ordering::SeqCst) {
            return None;
        }
        match self.stop_request.lock() {
            Ok(guard) => guard.clone().or(Some(StopReason::Requested)),
            Err(_) => Some(StopReason::Requested),
        }
    }

    pub(crate) fn finish(&self, reason: StopReason) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *state = PumpState::Stopped(reason);
    }

    /// Count one failure and return the consecutive total.
    pub(crate) fn record_failure(&self, error: String) -> u32 {
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = Some(error);
        }
        self.consecutive_failures.fetch_add(1, Ordering::SeqCst).saturating_add(1)
    }

    /// A frame made it through the sink boundary, published or dropped.
    pub(crate) fn reset_failures(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    pub(crate) fn record_published(&self, rate: f64) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
        self.rate_bits.store(rate.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    pub(crate) fn snapshot(&self) -> PumpSnapshot {
        PumpSnapshot {
            state: self.state(),
            consecutive_failures: self.consecutive_failures(),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            rate: f64::from_bits(self.rate_bits.load(Ordering::Relaxed)),
            last_error: self.last_error.lock().ok().and_then(|guard| guard.clone()),
        }
    }
}
