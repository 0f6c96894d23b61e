use serde::{Deserialize, Serialize};

use crate::calibration::GaugeCalibration;

/// Detection outcome for one gauge in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadingStatus {
    Ok,
    NotFound,
    OutOfRange,
}

impl ReadingStatus {
    pub fn label(self) -> &'static str {
        match self {
            ReadingStatus::Ok => "ok",
            ReadingStatus::NotFound => "not_found",
            ReadingStatus::OutOfRange => "out_of_range",
        }
    }
}

/// Result of one detection pass for one gauge.
///
/// `value` is only present for [`ReadingStatus::Ok`]; `angle` is present
/// whenever a needle was located, including out-of-range needles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub gauge_id: String,
    pub angle: Option<f64>,
    pub value: Option<f64>,
    pub unit: String,
    pub confidence: f64,
    pub status: ReadingStatus,
}

impl Reading {
    pub fn ok(calibration: &GaugeCalibration, angle: f64, value: f64, confidence: f64) -> Self {
        Self {
            gauge_id: calibration.id().to_string(),
            angle: Some(angle),
            value: Some(value),
            unit: calibration.unit().to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            status: ReadingStatus::Ok,
        }
    }

    pub fn out_of_range(calibration: &GaugeCalibration, angle: f64, confidence: f64) -> Self {
        Self {
            gauge_id: calibration.id().to_string(),
            angle: Some(angle),
            value: None,
            unit: calibration.unit().to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            status: ReadingStatus::OutOfRange,
        }
    }

    pub fn not_found(calibration: &GaugeCalibration) -> Self {
        Self {
            gauge_id: calibration.id().to_string(),
            angle: None,
            value: None,
            unit: calibration.unit().to_string(),
            confidence: 0.0,
            status: ReadingStatus::NotFound,
        }
    }
}
