//! Per-gauge calibration: dial geometry plus the linear angle → value map.
//!
//! Calibrations are loaded once from configuration and shared read-only by
//! every session, so the type only exposes accessors and consuming `with_*`
//! builders.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{AngleConvention, Point, wrap_degrees};

/// Widest sweep a single dial can describe.
pub const MAX_SWEEP_DEG: f64 = 360.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("gauge {id:?}: calibration contains a non-finite number")]
    NonFinite { id: String },
    #[error("gauge {id:?}: radius must be positive, got {radius}")]
    InvalidRadius { id: String, radius: f64 },
    #[error("gauge {id:?}: start and end angle are both {angle}")]
    EmptySweep { id: String, angle: f64 },
    #[error("gauge {id:?}: sweep of {sweep} degrees exceeds a full turn")]
    SweepTooWide { id: String, sweep: f64 },
}

/// Outcome of mapping a needle angle through a calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AngleMapping {
    InRange { value: f64 },
    OutOfRange,
    /// The calibration geometry cannot map any angle.
    Undefined,
}

/// Geometric and value mapping for one dial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeCalibration {
    id: String,
    center: Point,
    radius: f64,
    start_angle: f64,
    end_angle: f64,
    value_at_start: f64,
    value_at_end: f64,
    #[serde(default)]
    unit: String,
    #[serde(default)]
    convention: AngleConvention,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    needle_color: Option<[u8; 3]>,
}

impl GaugeCalibration {
    /// `sweep` is `(start_angle, end_angle)` and `values` the readings at
    /// those two angles.
    pub fn new(
        id: impl Into<String>,
        center: Point,
        radius: f64,
        sweep: (f64, f64),
        values: (f64, f64),
    ) -> Self {
        Self {
            id: id.into(),
            center,
            radius,
            start_angle: sweep.0,
            end_angle: sweep.1,
            value_at_start: values.0,
            value_at_end: values.1,
            unit: String::new(),
            convention: AngleConvention::default(),
            needle_color: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_convention(mut self, convention: AngleConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Override the detector-wide needle colour for this dial.
    pub fn with_needle_color(mut self, rgb: [u8; 3]) -> Self {
        self.needle_color = Some(rgb);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn start_angle(&self) -> f64 {
        self.start_angle
    }

    pub fn end_angle(&self) -> f64 {
        self.end_angle
    }

    pub fn value_at_start(&self) -> f64 {
        self.value_at_start
    }

    pub fn value_at_end(&self) -> f64 {
        self.value_at_end
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn convention(&self) -> AngleConvention {
        self.convention
    }

    pub fn needle_color(&self) -> Option<[u8; 3]> {
        self.needle_color
    }

    /// Angular span of the dial in degrees.
    pub fn sweep(&self) -> f64 {
        (self.end_angle - self.start_angle).abs()
    }

    pub fn validate(&self) -> Result<(), CalibrationError> {
        let numbers = [
            self.center.x,
            self.center.y,
            self.radius,
            self.start_angle,
            self.end_angle,
            self.value_at_start,
            self.value_at_end,
        ];
        if numbers.iter().any(|v| !v.is_finite()) {
            return Err(CalibrationError::NonFinite {
                id: self.id.clone(),
            });
        }
        if self.radius <= 0.0 {
            return Err(CalibrationError::InvalidRadius {
                id: self.id.clone(),
                radius: self.radius,
            });
        }
        if self.start_angle == self.end_angle {
            return Err(CalibrationError::EmptySweep {
                id: self.id.clone(),
                angle: self.start_angle,
            });
        }
        if self.sweep() > MAX_SWEEP_DEG {
            return Err(CalibrationError::SweepTooWide {
                id: self.id.clone(),
                sweep: self.sweep(),
            });
        }
        Ok(())
    }

    /// Express a raw image angle in this dial's convention, unwrapped into the
    /// full turn centred on the middle of the sweep.
    ///
    /// Centring on the sweep midpoint splits the dead zone between the end and
    /// the start stop evenly, so an angle a few degrees past either stop stays
    /// next to that stop instead of wrapping around to the other one.
    pub fn normalize(&self, image_angle_deg: f64) -> f64 {
        let angle = self.convention.from_image_angle(image_angle_deg);
        let mid = (self.start_angle + self.end_angle) / 2.0;
        mid + wrap_degrees(angle - mid)
    }

    /// Inverse of [`normalize`](Self::normalize) for drawing overlays.
    pub fn to_image_angle(&self, angle_deg: f64) -> f64 {
        self.convention.to_image_angle(angle_deg)
    }

    /// Linear map from a normalized angle to a dial value.
    ///
    /// Angles up to `tolerance_deg` beyond either stop clamp to the stop's
    /// value; anything further is out of range.
    pub fn map_angle(&self, angle_deg: f64, tolerance_deg: f64) -> AngleMapping {
        if self.validate().is_err() || !angle_deg.is_finite() {
            return AngleMapping::Undefined;
        }
        let lo = self.start_angle.min(self.end_angle);
        let hi = self.start_angle.max(self.end_angle);
        let tolerance = tolerance_deg.max(0.0);
        if angle_deg < lo - tolerance || angle_deg > hi + tolerance {
            return AngleMapping::OutOfRange;
        }
        let t = ((angle_deg - self.start_angle) / (self.end_angle - self.start_angle)).clamp(0.0, 1.0);
        // Weighted form keeps both stops exact: t == 0 and t == 1 reproduce
        // the calibration values bit for bit.
        let value = self.value_at_start * (1.0 - t) + self.value_at_end * t;
        AngleMapping::InRange { value }
    }
}
