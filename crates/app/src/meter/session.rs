//! Session registry: one pump per subscriber, addressed by session id.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
    thread::JoinHandle,
};

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use anyhow::{Context, Result};
use frame_source::{FrameSource, open_source};
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::meter::{
    config::MeterConfig,
    control::{PumpControl, PumpState, StopReason},
    data::{FrameResult, ServiceStatus, SessionId, SessionStatus},
    pump::StreamPump,
    sink::ChannelSink,
    telemetry,
};

/// Opens a fresh frame source for a starting session.
pub(crate) type SourceFactory = Box<dyn Fn() -> Result<Box<dyn FrameSource>> + Send + Sync>;

#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error("unknown session {0}")]
    Unknown(SessionId),
    #[error("session {id} is {state}; only idle sessions can start")]
    InvalidTransition { id: SessionId, state: &'static str },
    #[error("session {id} failed to start")]
    Start {
        id: SessionId,
        #[source]
        source: anyhow::Error,
    },
}

impl ResponseError for SessionError {
    fn status_code(&self) -> StatusCode {
        match self {
            SessionError::Unknown(_) => StatusCode::NOT_FOUND,
            SessionError::InvalidTransition { .. } => StatusCode::CONFLICT,
            SessionError::Start { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            SessionError::Start { source, .. } => format!("{self}: {source:#}"),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({ "error": message }))
    }
}

struct SessionEntry {
    control: Arc<PumpControl>,
    /// Held until the pump starts, then owned by the pump.
    sink: Option<ChannelSink>,
    handle: Option<JoinHandle<StopReason>>,
}

pub(crate) struct SessionRegistry {
    config: Arc<MeterConfig>,
    sources: SourceFactory,
    next_id: AtomicU64,
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
}

impl SessionRegistry {
    /// Registry whose sessions read from the configured source.
    pub(crate) fn new(config: Arc<MeterConfig>) -> Self {
        let source_config = config.clone();
        let sources: SourceFactory = Box::new(move || {
            let source = open_source(
                &source_config.source_kind,
                &source_config.simulator,
                source_config.pump.interval(),
            )
            .with_context(|| format!("failed to open frame source {}", source_config.source_uri))?;
            Ok(Box::new(source) as Box<dyn FrameSource>)
        });
        Self::with_sources(config, sources)
    }

    pub(crate) fn with_sources(config: Arc<MeterConfig>, sources: SourceFactory) -> Self {
        Self {
            config,
            sources,
            next_id: AtomicU64::new(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn config(&self) -> &MeterConfig {
        &self.config
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register an idle session and return the receiving end of its frames.
    pub(crate) fn open(&self) -> (SessionId, mpsc::Receiver<FrameResult>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.config.sink_capacity);
        let mut sessions = self.sessions();
        sessions.insert(
            id,
            SessionEntry {
                control: Arc::new(PumpControl::new()),
                sink: Some(ChannelSink::new(tx)),
                handle: None,
            },
        );
        metrics::gauge!("meter_active_sessions").set(sessions.len() as f64);
        info!(session = id, "session opened");
        (id, rx)
    }

    /// Start the pump of an idle session on its own thread.
    pub(crate) fn start(&self, id: SessionId) -> Result<SessionStatus, SessionError> {
        let sink = {
            let mut sessions = self.sessions();
            let entry = sessions.get_mut(&id).ok_or(SessionError::Unknown(id))?;
            let state = entry.control.state();
            match entry.sink.take() {
                Some(sink) if state == PumpState::Idle => sink,
                other => {
                    entry.sink = other;
                    return Err(SessionError::InvalidTransition { id, state: state.label() });
                }
            }
        };

        // Opening may block on a device; other sessions stay reachable meanwhile.
        let opened = (self.sources)();

        let mut sessions = self.sessions();
        // Detached while opening: the source and sink are dropped here.
        let entry = sessions.get_mut(&id).ok_or(SessionError::Unknown(id))?;
        let source = match opened {
            Ok(source) => source,
            Err(source) => {
                // A stop that raced the open already closed the stream.
                if entry.control.state() == PumpState::Idle {
                    entry.sink = Some(sink);
                }
                warn!(session = id, "frame source failed to open: {source:#}");
                return Err(SessionError::Start { id, source });
            }
        };
        if let Err(state) = entry.control.begin() {
            return Err(SessionError::InvalidTransition { id, state: state.label() });
        }

        let pump = StreamPump::new(
            id,
            source,
            sink,
            self.config.calibrations.clone(),
            self.config.pump.clone(),
            entry.control.clone(),
        );
        let handle = match telemetry::spawn_thread(format!("meter-pump-{id}"), move || pump.run()) {
            Ok(handle) => handle,
            Err(err) => {
                entry.control.finish(StopReason::StartFailed(err.to_string()));
                return Err(SessionError::Start {
                    id,
                    source: anyhow::Error::new(err).context("failed to spawn pump thread"),
                });
            }
        };
        entry.handle = Some(handle);
        info!(session = id, "session started");
        Ok(self.entry_status(id, entry))
    }

    /// Ask a session's pump to stop.
    pub(crate) fn stop(&self, id: SessionId) -> Result<SessionStatus, SessionError> {
        let mut sessions = self.sessions();
        let entry = sessions.get_mut(&id).ok_or(SessionError::Unknown(id))?;
        entry.control.request_stop(StopReason::Requested);
        // An idle session never gets a pump; closing its sink ends the event stream.
        entry.sink = None;
        info!(session = id, "stop requested");
        Ok(self.entry_status(id, entry))
    }

    pub(crate) fn status(&self, id: SessionId) -> Result<SessionStatus, SessionError> {
        let sessions = self.sessions();
        let entry = sessions.get(&id).ok_or(SessionError::Unknown(id))?;
        Ok(self.entry_status(id, entry))
    }

    /// Forget a session whose subscriber went away.
    pub(crate) fn detach(&self, id: SessionId) {
        let mut sessions = self.sessions();
        if let Some(entry) = sessions.remove(&id) {
            entry.control.request_stop(StopReason::SubscriberDisconnected);
            debug!(session = id, "session detached");
        }
        metrics::gauge!("meter_active_sessions").set(sessions.len() as f64);
    }

    pub(crate) fn overview(&self) -> ServiceStatus {
        let sessions = self.sessions();
        let mut statuses: Vec<SessionStatus> = sessions
            .iter()
            .map(|(id, entry)| self.entry_status(*id, entry))
            .collect();
        statuses.sort_by_key(|status| status.session_id);
        let running = statuses.iter().any(|status| status.running);

        ServiceStatus {
            status: if running { "streaming" } else { "ready" },
            version: env!("CARGO_PKG_VERSION"),
            source: self.config.source_uri.clone(),
            gauges: self.config.calibrations.gauges.len(),
            target_fps: self.config.pump.target_fps,
            active_sessions: statuses.len(),
            sessions: statuses,
            last_update: chrono::Local::now().to_rfc3339(),
        }
    }

    /// Stop every pump and wait for the pump threads to exit.
    pub(crate) fn shutdown(&self) {
        let drained: Vec<(SessionId, SessionEntry)> = self.sessions().drain().collect();
        metrics::gauge!("meter_active_sessions").set(0.0);
        for (id, entry) in &drained {
            entry.control.request_stop(StopReason::Requested);
            debug!(session = id, "stopping session for shutdown");
        }
        for (id, mut entry) in drained {
            if let Some(handle) = entry.handle.take() {
                if handle.join().is_err() {
                    warn!(session = id, "pump thread panicked");
                }
            }
        }
    }

    fn entry_status(&self, id: SessionId, entry: &SessionEntry) -> SessionStatus {
        let snapshot = entry.control.snapshot();
        let stop_reason = match &snapshot.state {
            PumpState::Stopped(reason) => Some(reason.to_string()),
            _ => None,
        };
        SessionStatus {
            session_id: id,
            state: snapshot.state.label(),
            running: snapshot.state == PumpState::Running,
            gauges: self.config.calibrations.gauges.len(),
            rate: snapshot.rate,
            target_rate: self.config.pump.target_fps,
            frames_published: snapshot.frames_published,
            consecutive_failures: snapshot.consecutive_failures,
            stop_reason,
            last_error: snapshot.last_error,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::{Duration, Instant};

    use anyhow::anyhow;

    use super::*;
    use crate::meter::config::{MeterConfig, tests::cli_args};

    pub(crate) fn test_config() -> Arc<MeterConfig> {
        let mut args = cli_args();
        args.fps = 50.0;
        args.acquire_timeout_ms = 200;
        Arc::new(MeterConfig::try_from(args).expect("config"))
    }

    fn wait_for(registry: &SessionRegistry, id: SessionId, predicate: impl Fn(&SessionStatus) -> bool) -> SessionStatus {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let status = registry.status(id).expect("status");
            if predicate(&status) || Instant::now() > deadline {
                return status;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn session_streams_until_stopped() {
        let registry = SessionRegistry::new(test_config());
        let (id, mut rx) = registry.open();
        assert_eq!(registry.status(id).expect("status").state, "idle");

        let started = registry.start(id).expect("start");
        assert!(started.running);

        let first = rx.blocking_recv().expect("frame");
        assert_eq!(first.session_id, id);
        assert_eq!(first.readings.len(), 2);

        registry.stop(id).expect("stop");
        let status = wait_for(&registry, id, |status| status.state == "stopped");
        assert_eq!(status.state, "stopped");
        assert_eq!(status.stop_reason.as_deref(), Some("requested"));
        assert!(status.frames_published >= 1);
        registry.shutdown();
    }

    #[test]
    fn start_requires_idle_session() {
        let registry = SessionRegistry::new(test_config());
        let (id, _rx) = registry.open();
        registry.start(id).expect("start");
        assert!(matches!(registry.start(id), Err(SessionError::InvalidTransition { state: "running", .. })));
        assert!(matches!(registry.start(999), Err(SessionError::Unknown(999))));
        registry.shutdown();
    }

    #[test]
    fn stopped_idle_session_cannot_start() {
        let registry = SessionRegistry::new(test_config());
        let (id, mut rx) = registry.open();
        let status = registry.stop(id).expect("stop");
        assert_eq!(status.state, "stopped");
        assert!(rx.blocking_recv().is_none());
        assert!(matches!(registry.start(id), Err(SessionError::InvalidTransition { state: "stopped", .. })));
    }

    #[test]
    fn source_failure_reports_start_error() {
        let sources: SourceFactory = Box::new(|| Err(anyhow!("camera unplugged")));
        let registry = SessionRegistry::with_sources(test_config(), sources);
        let (id, _rx) = registry.open();
        let err = registry.start(id).expect_err("start should fail");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(format!("{:#}", anyhow::Error::new(err)).contains("camera unplugged"));
        assert_eq!(registry.status(id).expect("status").state, "idle");
    }

    #[test]
    fn slow_source_open_leaves_registry_available() {
        let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);
        let sources: SourceFactory = Box::new(move || {
            entered_tx.send(()).context("signal open")?;
            release_rx.recv().context("wait for release")?;
            Err(anyhow!("camera unplugged"))
        });
        let registry = SessionRegistry::with_sources(test_config(), sources);
        let (opening, _opening_rx) = registry.open();

        std::thread::scope(|scope| {
            let start = scope.spawn(|| registry.start(opening));
            entered_rx.recv_timeout(Duration::from_secs(5)).expect("factory entered");

            let (other, _other_rx) = registry.open();
            assert_eq!(registry.status(other).expect("status").state, "idle");
            assert!(matches!(
                registry.start(opening),
                Err(SessionError::InvalidTransition { state: "idle", .. })
            ));
            registry.detach(opening);

            release_tx.send(()).expect("release factory");
            let result = start.join().expect("start thread");
            assert!(matches!(result, Err(SessionError::Unknown(id)) if id == opening));
        });
        assert_eq!(registry.overview().active_sessions, 1);
    }

    #[test]
    fn dead_source_stops_after_threshold() {
        let sources: SourceFactory = Box::new(|| {
            let (tx, rx) = crossbeam_channel::bounded(1);
            drop(tx);
            Ok(Box::new(frame_source::ChannelSource::new(rx)) as Box<dyn FrameSource>)
        });
        let registry = SessionRegistry::with_sources(test_config(), sources);
        let (id, _rx) = registry.open();
        registry.start(id).expect("start");

        let status = wait_for(&registry, id, |status| status.state == "stopped");
        assert_eq!(status.state, "stopped");
        assert_eq!(status.consecutive_failures, 5);
        assert!(status.stop_reason.expect("reason").starts_with("5 consecutive failures"));
    }

    #[test]
    fn detach_forgets_the_session() {
        let registry = SessionRegistry::new(test_config());
        let (id, rx) = registry.open();
        registry.start(id).expect("start");
        drop(rx);
        registry.detach(id);
        assert!(matches!(registry.status(id), Err(SessionError::Unknown(_))));
        assert_eq!(registry.overview().active_sessions, 0);
    }
}
