//! StreamPump: the per-session acquire, detect, publish loop.
//!
//! Each cycle pulls one frame with a bounded wait, reads every calibrated
//! gauge, overlays the readings, encodes the frame and hands the result to
//! the session's sink. The loop holds its target rate by sleeping for the
//! rest of the cycle budget and checks for a stop request before every cycle.

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use chrono::Local;
use frame_source::FrameSource;
use gauge_core::{GaugeReader, ReadingStatus};
use tracing::{debug, info, warn};

use crate::meter::{
    annotation::annotate_frame,
    config::{CalibrationSet, PumpSettings},
    control::{PumpControl, StopReason},
    data::{FrameResult, SessionId},
    encoding::encode_frame,
    sink::{FrameSink, PublishError},
};

/// What a single cycle did.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum CycleOutcome {
    Published { frame_number: u64 },
    /// Frame processed but the subscriber queue was full.
    Dropped { frame_number: u64 },
    /// Acquire or encode failed; carries the consecutive failure count.
    Failed { failures: u32 },
    Stopped(StopReason),
}

pub(crate) struct StreamPump<S, K> {
    session_id: SessionId,
    source: S,
    sink: K,
    reader: GaugeReader,
    calibrations: Arc<CalibrationSet>,
    settings: PumpSettings,
    control: Arc<PumpControl>,
    frame_number: u64,
    smoothed_fps: f64,
    last_publish: Option<Instant>,
}

impl<S: FrameSource, K: FrameSink> StreamPump<S, K> {
    pub(crate) fn new(
        session_id: SessionId,
        source: S,
        sink: K,
        calibrations: Arc<CalibrationSet>,
        settings: PumpSettings,
        control: Arc<PumpControl>,
    ) -> Self {
        Self {
            session_id,
            source,
            sink,
            reader: GaugeReader::new(calibrations.detector.clone()),
            calibrations,
            settings,
            control,
            frame_number: 0,
            smoothed_fps: 0.0,
            last_publish: None,
        }
    }

    /// Loop cycles until stopped and return why the pump stopped.
    pub(crate) fn run(mut self) -> StopReason {
        let interval = self.settings.interval();
        let session_span = tracing::info_span!(
            "pump.session",
            session = self.session_id,
            gauges = self.calibrations.gauges.len(),
            target_fps = self.settings.target_fps
        );
        let _session_guard = session_span.enter();
        info!("pump started");

        let reason = loop {
            if let Some(reason) = self.control.stop_requested() {
                break reason;
            }
            let cycle_start = Instant::now();
            if let CycleOutcome::Stopped(reason) = self.cycle() {
                break reason;
            }
            let remaining = remaining_budget(interval, cycle_start.elapsed());
            if !remaining.is_zero() {
                thread::sleep(remaining);
            }
        };

        self.control.finish(reason.clone());
        metrics::counter!("meter_pump_stops_total", "reason" => reason.label()).increment(1);
        match &reason {
            StopReason::FailureThreshold { .. } => warn!("pump stopped: {reason}"),
            _ => info!("pump stopped: {reason}"),
        }
        reason
    }

    /// Run one acquire, detect, annotate, encode, publish cycle.
    pub(crate) fn cycle(&mut self) -> CycleOutcome {
        metrics::counter!("meter_pump_cycles_total").increment(1);
        let acquire_start = Instant::now();
        let acquired = tracing::info_span!("pump.acquire", session = self.session_id)
            .in_scope(|| self.source.next_frame(self.settings.acquire_timeout));
        metrics::histogram!("meter_stage_latency_seconds", "stage" => "acquire")
            .record(acquire_start.elapsed().as_secs_f64());

        let frame = match acquired {
            Ok(frame) => frame,
            Err(err) => {
                metrics::counter!("meter_acquire_failures_total", "kind" => err.kind()).increment(1);
                return self.fail(format!("acquire {}: {err}", err.kind()));
            }
        };

        let frame_number = self.frame_number.wrapping_add(1);
        self.frame_number = frame_number;
        let frame_span = tracing::info_span!(
            "pump.cycle",
            session = self.session_id,
            frame = frame_number,
            sequence = frame.sequence
        );
        let _frame_guard = frame_span.enter();

        let detect_start = Instant::now();
        let readings = self.reader.detect(&frame.image, &self.calibrations.gauges);
        metrics::histogram!("meter_stage_latency_seconds", "stage" => "detect")
            .record(detect_start.elapsed().as_secs_f64());
        for reading in &readings {
            metrics::counter!("meter_readings_total", "status" => reading.status.label()).increment(1);
            if reading.status != ReadingStatus::Ok {
                debug!(gauge = %reading.gauge_id, status = reading.status.label(), "gauge not read");
            }
        }

        let encode_start = Instant::now();
        let mut image = frame.image;
        annotate_frame(&mut image, &self.calibrations.gauges, &readings, frame_number, self.smoothed_fps);
        let encoded = match encode_frame(&image, self.settings.jpeg_quality) {
            Ok(encoded) => encoded,
            Err(err) => return self.fail(format!("encode: {err}")),
        };
        metrics::histogram!("meter_stage_latency_seconds", "stage" => "encode")
            .record(encode_start.elapsed().as_secs_f64());

        let now = Local::now();
        let result = FrameResult {
            session_id: self.session_id,
            frame_number,
            timestamp_ms: now.timestamp_millis(),
            time: now.format("%H:%M:%S").to_string(),
            readings,
            frame: encoded,
        };

        match self.sink.publish(self.session_id, result) {
            Ok(()) => {
                self.control.reset_failures();
                self.update_rate();
                self.control.record_published(self.smoothed_fps);
                metrics::counter!("meter_frames_published_total").increment(1);
                CycleOutcome::Published { frame_number }
            }
            Err(PublishError::Full) => {
                self.control.reset_failures();
                metrics::counter!("meter_frames_dropped_total").increment(1);
                debug!(frame = frame_number, "subscriber behind; frame dropped");
                CycleOutcome::Dropped { frame_number }
            }
            Err(PublishError::Disconnected) => CycleOutcome::Stopped(StopReason::SubscriberDisconnected),
        }
    }

    fn fail(&mut self, message: String) -> CycleOutcome {
        warn!(session = self.session_id, "cycle failed: {message}");
        let failures = self.control.record_failure(message.clone());
        if failures >= self.settings.failure_threshold {
            CycleOutcome::Stopped(StopReason::FailureThreshold {
                failures,
                last_error: message,
            })
        } else {
            CycleOutcome::Failed { failures }
        }
    }

    fn update_rate(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_publish.replace(now) {
            let elapsed = now.duration_since(last).as_secs_f64();
            if elapsed > 0.0 {
                let instant = 1.0 / elapsed;
                self.smoothed_fps = if self.smoothed_fps == 0.0 {
                    instant
                } else {
                    0.9 * self.smoothed_fps + 0.1 * instant
                };
            }
        }
    }
}

/// Cycle budget left after `elapsed`, floored at zero.
pub(crate) fn remaining_budget(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use frame_source::{AcquireError, Frame, SimulatorConfig, render_frame};
    use gauge_core::ReadingStatus;

    use super::*;
    use crate::meter::control::PumpState;

    /// Replays a fixed script, then times out forever.
    pub(crate) struct ScriptedSource {
        script: VecDeque<Result<Frame, AcquireError>>,
    }

    impl ScriptedSource {
        pub(crate) fn new(script: impl IntoIterator<Item = Result<Frame, AcquireError>>) -> Self {
            Self {
                script: script.into_iter().collect(),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self, timeout: Duration) -> Result<Frame, AcquireError> {
            self.script.pop_front().unwrap_or(Err(AcquireError::Timeout(timeout)))
        }
    }

    #[derive(Clone, Default)]
    pub(crate) struct VecSink {
        published: Arc<Mutex<Vec<FrameResult>>>,
        refuse: Option<PublishError>,
    }

    impl FrameSink for VecSink {
        fn publish(&self, _session: SessionId, result: FrameResult) -> Result<(), PublishError> {
            if let Some(err) = &self.refuse {
                return Err(err.clone());
            }
            self.published.lock().expect("sink lock").push(result);
            Ok(())
        }
    }

    fn simulated_frame(sequence: u64) -> Result<Frame, AcquireError> {
        Ok(Frame {
            image: render_frame(&SimulatorConfig::default(), sequence),
            sequence,
            timestamp_ms: 0,
        })
    }

    fn timeout() -> Result<Frame, AcquireError> {
        Err(AcquireError::Timeout(Duration::from_millis(1)))
    }

    fn settings() -> PumpSettings {
        PumpSettings {
            target_fps: 1000.0,
            failure_threshold: 5,
            acquire_timeout: Duration::from_millis(1),
            jpeg_quality: 60,
        }
    }

    fn pump(source: ScriptedSource, sink: VecSink) -> (StreamPump<ScriptedSource, VecSink>, Arc<PumpControl>) {
        let control = Arc::new(PumpControl::new());
        control.begin().expect("idle");
        let calibrations = Arc::new(CalibrationSet::simulated(&SimulatorConfig::default()));
        (StreamPump::new(7, source, sink, calibrations, settings(), control.clone()), control)
    }

    #[test]
    fn five_consecutive_timeouts_stop_the_pump() {
        let sink = VecSink::default();
        let (pump, control) = pump(ScriptedSource::new([]), sink.clone());

        let reason = pump.run();
        assert!(matches!(reason, StopReason::FailureThreshold { failures: 5, .. }), "{reason:?}");
        assert_eq!(control.state(), PumpState::Stopped(reason));
        assert!(sink.published.lock().expect("sink lock").is_empty());
    }

    #[test]
    fn each_timeout_counts_once_and_success_resets() {
        let sink = VecSink::default();
        let script = [timeout(), timeout(), timeout(), timeout(), simulated_frame(10)];
        let (mut pump, control) = pump(ScriptedSource::new(script), sink.clone());

        for expected in 1..=4 {
            assert_eq!(pump.cycle(), CycleOutcome::Failed { failures: expected });
            assert_eq!(control.consecutive_failures(), expected);
        }
        assert_eq!(pump.cycle(), CycleOutcome::Published { frame_number: 1 });
        assert_eq!(control.consecutive_failures(), 0);

        for expected in 1..=4 {
            assert_eq!(pump.cycle(), CycleOutcome::Failed { failures: expected });
        }
        assert!(matches!(pump.cycle(), CycleOutcome::Stopped(StopReason::FailureThreshold { failures: 5, .. })));
    }

    #[test]
    fn published_result_carries_readings_and_frame() {
        let sink = VecSink::default();
        let (mut pump, control) = pump(ScriptedSource::new([simulated_frame(67)]), sink.clone());
        assert_eq!(pump.cycle(), CycleOutcome::Published { frame_number: 1 });

        let published = sink.published.lock().expect("sink lock");
        let result = &published[0];
        assert_eq!(result.session_id, 7);
        assert_eq!(result.time.len(), 8);
        assert_eq!(result.frame.mime, "image/jpeg");
        assert!(!result.frame.data.is_empty());
        assert_eq!(result.readings.len(), 2);
        assert_eq!(result.readings[0].gauge_id, "METER-1");
        assert_eq!(result.readings[0].status, ReadingStatus::Ok);
        let expected = (frame_source::needle_angle(67, 0) + 45.0) / 270.0 * 100.0;
        let value = result.readings[0].value.expect("value");
        assert!((value - expected).abs() < 1.0, "{value} vs {expected}");
        assert_eq!(control.snapshot().frames_published, 1);
    }

    #[test]
    fn stop_is_observed_before_the_next_cycle() {
        let sink = VecSink::default();
        let (pump, control) = pump(ScriptedSource::new([simulated_frame(1)]), sink.clone());
        control.request_stop(StopReason::Requested);

        assert_eq!(pump.run(), StopReason::Requested);
        assert!(sink.published.lock().expect("sink lock").is_empty());
    }

    #[test]
    fn disconnected_subscriber_stops_the_pump() {
        let sink = VecSink {
            refuse: Some(PublishError::Disconnected),
            ..VecSink::default()
        };
        let (pump, control) = pump(ScriptedSource::new([simulated_frame(1)]), sink);
        assert_eq!(pump.run(), StopReason::SubscriberDisconnected);
        assert_eq!(control.state(), PumpState::Stopped(StopReason::SubscriberDisconnected));
    }

    #[test]
    fn full_subscriber_queue_drops_without_failing() {
        let sink = VecSink {
            refuse: Some(PublishError::Full),
            ..VecSink::default()
        };
        let (mut pump, control) = pump(ScriptedSource::new([timeout(), simulated_frame(1)]), sink);
        assert_eq!(pump.cycle(), CycleOutcome::Failed { failures: 1 });
        assert_eq!(pump.cycle(), CycleOutcome::Dropped { frame_number: 1 });
        assert_eq!(control.consecutive_failures(), 0);
        assert_eq!(control.snapshot().frames_published, 0);
    }

    #[test]
    fn slow_subscriber_with_intermittent_timeouts_keeps_running() {
        let sink = VecSink {
            refuse: Some(PublishError::Full),
            ..VecSink::default()
        };
        let script = (1..=4).flat_map(|seq| [timeout(), simulated_frame(seq)]).chain([timeout()]);
        let (mut pump, control) = pump(ScriptedSource::new(script), sink);
        for _ in 0..9 {
            let outcome = pump.cycle();
            assert!(!matches!(outcome, CycleOutcome::Stopped(_)), "{outcome:?}");
            assert!(control.consecutive_failures() <= 1);
        }
        assert_eq!(control.state(), PumpState::Running);
    }

    #[test]
    fn capture_errors_and_disconnects_count_as_failures() {
        let script = [
            Err(AcquireError::Disconnected),
            Err(AcquireError::Capture(frame_source::CaptureError::Open { uri: "cam".into() })),
        ];
        let (mut pump, control) = pump(ScriptedSource::new(script), VecSink::default());
        assert_eq!(pump.cycle(), CycleOutcome::Failed { failures: 1 });
        assert_eq!(pump.cycle(), CycleOutcome::Failed { failures: 2 });
        assert!(control.snapshot().last_error.expect("error").contains("capture"));
    }

    #[test]
    fn sleep_budget_floors_at_zero() {
        let interval = Duration::from_millis(200);
        assert_eq!(remaining_budget(interval, Duration::from_millis(50)), Duration::from_millis(150));
        assert_eq!(remaining_budget(interval, Duration::from_millis(500)), Duration::ZERO);
    }
}
