//! Actix Web surface: dashboard, push channel, session control and metrics.
//!
//! Every `/api/events` subscriber gets its own session. Frames reach the
//! browser as Server-Sent Events; dropping the connection detaches the
//! session, which stops its pump at the top of the next cycle.

use std::{sync::Arc, time::Duration};

use actix_web::{
    App, HttpResponse, HttpServer,
    http::header,
    web::{self, Bytes},
};
use anyhow::{Context, Result};
use async_stream::stream;
use serde::Serialize;
use tracing::info;

use crate::meter::{
    config::MeterConfig,
    data::{ConnectionResponse, FrameResult, SessionId},
    session::{SessionError, SessionRegistry},
    telemetry,
};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Shared state backing HTTP handlers.
pub(crate) struct AppState {
    pub(crate) registry: Arc<SessionRegistry>,
}

/// Run the HTTP service until the process is interrupted, then stop every
/// session.
pub fn run(config: MeterConfig) -> Result<()> {
    let _ = telemetry::init_metrics_recorder();

    let config = Arc::new(config);
    let registry = Arc::new(SessionRegistry::new(config.clone()));
    let server_span = tracing::info_span!(
        "meter.server",
        bind = %config.bind,
        port = config.port,
        source = %config.source_uri,
        source_kind = config.source_kind.label(),
        gauges = config.calibrations.gauges.len(),
        target_fps = config.pump.target_fps
    );
    let _server_guard = server_span.enter();
    info!("dashboard available at http://{}:{}/", config.bind, config.port);

    let state = web::Data::new(AppState {
        registry: registry.clone(),
    });
    let bind = (config.bind.clone(), config.port);
    let served = actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || App::new().app_data(state.clone()).configure(configure))
            .bind(bind.clone())
            .with_context(|| format!("failed to bind {}:{}", bind.0, bind.1))?
            .run()
            .await
            .context("HTTP server error")
    });

    info!("shutting down sessions");
    registry.shutdown();
    served
}

pub(crate) fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index_route))
        .route("/api/status", web::get().to(status_handler))
        .route("/api/events", web::get().to(events_handler))
        .route("/api/sessions/{id}", web::get().to(session_status_handler))
        .route("/api/sessions/{id}/start", web::post().to(start_handler))
        .route("/api/sessions/{id}/stop", web::post().to(stop_handler))
        .route("/metrics", web::get().to(metrics_handler));
}

/// Serve the dashboard page.
async fn index_route() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(crate::html::dashboard::DASHBOARD_HTML)
}

async fn status_handler(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.registry.overview())
}

async fn session_status_handler(
    path: web::Path<SessionId>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, SessionError> {
    Ok(HttpResponse::Ok().json(state.registry.status(path.into_inner())?))
}

async fn start_handler(path: web::Path<SessionId>, state: web::Data<AppState>) -> Result<HttpResponse, SessionError> {
    Ok(HttpResponse::Ok().json(state.registry.start(path.into_inner())?))
}

async fn stop_handler(path: web::Path<SessionId>, state: web::Data<AppState>) -> Result<HttpResponse, SessionError> {
    Ok(HttpResponse::Ok().json(state.registry.stop(path.into_inner())?))
}

/// Prometheus text exposition of the process metrics.
async fn metrics_handler() -> HttpResponse {
    match telemetry::prometheus_handle() {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::ServiceUnavailable().body("metrics recorder not installed"),
    }
}

/// Detaches the session when the event stream is dropped.
struct DetachOnDrop {
    registry: Arc<SessionRegistry>,
    id: SessionId,
}

impl Drop for DetachOnDrop {
    fn drop(&mut self) {
        self.registry.detach(self.id);
    }
}

enum StreamEvent {
    Frame(FrameResult),
    KeepAlive,
}

/// Format one Server-Sent Event carrying `payload` as JSON.
pub(crate) fn sse_event<T: Serialize>(event: &str, id: Option<u64>, payload: &T) -> Bytes {
    match serde_json::to_string(payload) {
        Ok(json) => {
            let mut chunk = String::with_capacity(json.len() + event.len() + 32);
            if let Some(id) = id {
                chunk.push_str("id: ");
                chunk.push_str(&id.to_string());
                chunk.push('\n');
            }
            chunk.push_str("event: ");
            chunk.push_str(event);
            chunk.push('\n');
            chunk.push_str("data: ");
            chunk.push_str(&json);
            chunk.push_str("\n\n");
            Bytes::from(chunk)
        }
        Err(err) => Bytes::from(format!("event: error\ndata: {err}\n\n")),
    }
}

/// Open a session and stream its frames as Server-Sent Events.
async fn events_handler(state: web::Data<AppState>) -> HttpResponse {
    let registry = state.registry.clone();
    let (session_id, mut rx) = registry.open();
    let hello = ConnectionResponse {
        status: "connected",
        session_id,
        gauges: registry.config().calibrations.gauges.len(),
        target_fps: registry.config().pump.target_fps,
    };
    let guard = DetachOnDrop { registry, id: session_id };

    let stream = stream! {
        let guard = guard;
        yield Ok::<Bytes, actix_web::Error>(Bytes::from_static(b"retry: 2000\n\n"));
        yield Ok::<Bytes, actix_web::Error>(sse_event("connection_response", None, &hello));

        let mut keep_alive = actix_web::rt::time::interval(KEEP_ALIVE_INTERVAL);
        keep_alive.tick().await;
        loop {
            let next = tokio::select! {
                received = rx.recv() => received.map(StreamEvent::Frame),
                _ = keep_alive.tick() => Some(StreamEvent::KeepAlive),
            };
            match next {
                Some(StreamEvent::Frame(result)) => {
                    yield Ok::<Bytes, actix_web::Error>(sse_event("meter_data", Some(result.frame_number), &result));
                }
                Some(StreamEvent::KeepAlive) => {
                    yield Ok::<Bytes, actix_web::Error>(Bytes::from_static(b": keep-alive\n\n"));
                }
                None => break,
            }
        }

        // The pump dropped its sink: report the final state once.
        if let Ok(status) = guard.registry.status(guard.id) {
            yield Ok::<Bytes, actix_web::Error>(sse_event("stopped", None, &status));
        }
    };

    HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "GET"))
        .insert_header((header::ACCESS_CONTROL_EXPOSE_HEADERS, "Content-Type"))
        .append_header(("Cache-Control", "no-cache"))
        .append_header(("Content-Type", "text/event-stream"))
        .append_header(("Connection", "keep-alive"))
        .streaming(stream)
}
