//! Synthetic dial frames for demos and tests.
//!
//! Draws light-grey frames with a row of analog dials whose red needles sweep
//! their scale as the frame counter advances. The needle angle of every frame
//! is known exactly through [`needle_angle`], which makes the simulator usable
//! as ground truth.

use std::{thread, time::Duration};

use anyhow::Result;
use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, bounded};
use image::{Rgb, RgbImage};

use crate::{
    draw::{draw_circle, draw_line, draw_text, fill_disk, text_width},
    types::{CaptureError, Frame},
};

const BACKGROUND: Rgb<u8> = Rgb([240, 240, 240]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);
const NEEDLE: Rgb<u8> = Rgb([255, 0, 0]);

/// First scale mark, in image degrees (clockwise from east).
pub const SCALE_START_DEG: f64 = -45.0;
/// Angular span of the simulated scale.
pub const SCALE_SWEEP_DEG: u64 = 270;

#[derive(Clone, Debug, PartialEq)]
pub struct SimulatorConfig {
    pub width: u32,
    pub height: u32,
    pub dials: usize,
    pub radius: f64,
    /// Centre of the first dial; later dials are laid out to its right.
    pub first_center: (f64, f64),
    pub spacing: f64,
    /// Optional pause between rendered frames. Without it the reader is paced
    /// only by its bounded channel.
    pub frame_interval: Option<Duration>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            dials: 2,
            radius: 100.0,
            first_center: (200.0, 240.0),
            spacing: 250.0,
            frame_interval: None,
        }
    }
}

impl SimulatorConfig {
    pub fn dial_center(&self, index: usize) -> (f64, f64) {
        (self.first_center.0 + index as f64 * self.spacing, self.first_center.1)
    }

    pub fn dial_label(index: usize) -> String {
        format!("METER-{}", index + 1)
    }
}

/// Needle angle (image degrees) of `dial` in frame `frame`.
pub fn needle_angle(frame: u64, dial: usize) -> f64 {
    let step = frame.wrapping_mul(2).wrapping_add(dial as u64 * 120);
    (step % SCALE_SWEEP_DEG) as f64 + SCALE_START_DEG
}

/// Render frame number `frame`.
pub fn render_frame(config: &SimulatorConfig, frame: u64) -> RgbImage {
    let mut image = RgbImage::from_pixel(config.width, config.height, BACKGROUND);
    let radius = config.radius;

    for dial in 0..config.dials {
        let center = config.dial_center(dial);
        draw_circle(&mut image, center, radius, 3.0, INK);

        for mark in (0..SCALE_SWEEP_DEG).step_by(30) {
            let rad = (mark as f64 + SCALE_START_DEG).to_radians();
            let outer = (center.0 + radius * rad.cos(), center.1 + radius * rad.sin());
            let inner = (center.0 + (radius - 10.0) * rad.cos(), center.1 + (radius - 10.0) * rad.sin());
            draw_line(&mut image, inner, outer, 2.0, INK);
        }

        let rad = needle_angle(frame, dial).to_radians();
        let tip = (center.0 + (radius - 20.0) * rad.cos(), center.1 + (radius - 20.0) * rad.sin());
        draw_line(&mut image, center, tip, 3.0, NEEDLE);
        fill_disk(&mut image, center, 5.0, NEEDLE);

        let label = SimulatorConfig::dial_label(dial);
        let label_x = center.0.round() as i64 - text_width(&label, 2) / 2;
        let label_y = (center.1 + radius).round() as i64 + 12;
        draw_text(&mut image, label_x, label_y, &label, 2, INK);
    }

    image
}

/// Spawns a background thread that renders simulated frames.
///
/// The channel holds two frames, so rendering blocks until the consumer pulls.
/// The thread exits once the receiver is dropped.
pub fn spawn_simulator_reader(config: SimulatorConfig) -> Result<Receiver<Result<Frame, CaptureError>>> {
    let (tx, rx) = bounded(2);
    thread::Builder::new()
        .name("dial-simulator".into())
        .spawn(move || {
            if let Err(err) = simulate_loop(&config, &tx) {
                let _ = tx.send(Err(err));
            }
        })?;
    Ok(rx)
}

fn simulate_loop(config: &SimulatorConfig, tx: &Sender<Result<Frame, CaptureError>>) -> Result<(), CaptureError> {
    if config.width == 0 || config.height == 0 {
        return Err(CaptureError::Open {
            uri: format!("simulator {}x{}", config.width, config.height),
        });
    }

    let mut sequence: u64 = 0;
    loop {
        let image = render_frame(config, sequence);
        let frame = Frame {
            image,
            sequence,
            timestamp_ms: Utc::now().timestamp_millis(),
        };
        if tx.send(Ok(frame)).is_err() {
            break;
        }
        sequence = sequence.wrapping_add(1);
        if let Some(interval) = config.frame_interval {
            thread::sleep(interval);
        }
    }
    Ok(())
}
