//! Needle-angle gauge reading.
//!
//! [`GaugeReader::detect`] takes one decoded RGB frame and a set of
//! [`GaugeCalibration`]s and returns a [`Reading`] per gauge. The reader is a
//! pure function of its inputs: it keeps no state between frames and reports
//! every per-gauge failure through [`ReadingStatus`] instead of an error.

pub mod calibration;
pub mod fit;
pub mod geometry;
pub mod raster;
pub mod reader;
pub mod reading;

pub use calibration::{AngleMapping, CalibrationError, GaugeCalibration};
pub use geometry::{AngleConvention, Point};
pub use reader::{DetectorSettings, GaugeReader};
pub use reading::{Reading, ReadingStatus};

pub use image;
