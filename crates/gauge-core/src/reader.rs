//! GaugeReader: one frame plus calibrations in, one reading per gauge out.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::{
    calibration::{AngleMapping, GaugeCalibration},
    fit::{Ray, fit_needle},
    raster::{DialGeometry, DiskStats, NeedleMask, needle_mask_by_color, needle_mask_by_contrast},
    reading::Reading,
};

/// Tunables shared by every gauge a reader inspects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// Expected needle colour (RGB) unless a calibration overrides it.
    pub needle_color: [u8; 3],
    /// Maximum RGB distance from the needle colour.
    pub color_tolerance: f64,
    /// Minimum luminance deviation used by the contrast fallback.
    pub contrast_threshold: f64,
    /// Extra pixels cropped around the dial disk.
    pub margin: u32,
    /// Inner edge of the search annulus as a fraction of the radius.
    pub hub_fraction: f64,
    /// Outer edge of the search annulus as a fraction of the radius.
    pub reach_fraction: f64,
    /// Fewer candidates than this means no needle.
    pub min_candidates: usize,
    /// Degrees past either stop still clamped to the stop value.
    pub range_tolerance: f64,
    /// Half the needle stroke width in pixels.
    pub needle_half_width: f64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            needle_color: [255, 0, 0],
            color_tolerance: 110.0,
            contrast_threshold: 60.0,
            margin: 4,
            hub_fraction: 0.15,
            reach_fraction: 0.8,
            min_candidates: 12,
            range_tolerance: 2.0,
            needle_half_width: 1.5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GaugeReader {
    settings: DetectorSettings,
}

impl GaugeReader {
    pub fn new(settings: DetectorSettings) -> Self {
        Self { settings }
    }

    /// Read every calibrated gauge in `frame`, preserving calibration order.
    ///
    /// Never fails: malformed calibrations and missing needles come back as
    /// `NOT_FOUND` readings and the remaining gauges are still processed.
    pub fn detect(&self, frame: &RgbImage, calibrations: &[GaugeCalibration]) -> Vec<Reading> {
        calibrations
            .iter()
            .map(|calibration| self.read_one(frame, calibration))
            .collect()
    }

    pub fn read_one(&self, frame: &RgbImage, calibration: &GaugeCalibration) -> Reading {
        if calibration.validate().is_err() {
            return Reading::not_found(calibration);
        }
        let settings = &self.settings;
        let Some(geometry) = DialGeometry::new(
            frame.dimensions(),
            calibration.center(),
            calibration.radius(),
            settings.margin,
            settings.hub_fraction,
            settings.reach_fraction,
        ) else {
            return Reading::not_found(calibration);
        };
        let Some(stats) = DiskStats::measure(frame, &geometry) else {
            return Reading::not_found(calibration);
        };

        let needle = calibration.needle_color().unwrap_or(settings.needle_color);
        let mut mask = needle_mask_by_color(frame, &geometry, needle, settings.color_tolerance, stats.mean_rgb);
        if mask.len() < settings.min_candidates {
            mask = needle_mask_by_contrast(frame, &geometry, stats.mean_luma, settings.contrast_threshold);
        }
        if mask.len() < settings.min_candidates {
            return Reading::not_found(calibration);
        }

        let inlier_width = (settings.needle_half_width * 2.0).max(2.0);
        let Some(ray) = fit_needle(mask.offsets(), inlier_width) else {
            return Reading::not_found(calibration);
        };
        let confidence = ray_support(&mask, &geometry, &ray);
        let angle = calibration.normalize(ray.angle_deg);

        match calibration.map_angle(angle, settings.range_tolerance) {
            AngleMapping::InRange { value } => Reading::ok(calibration, angle, value, confidence),
            AngleMapping::OutOfRange => Reading::out_of_range(calibration, angle, confidence),
            AngleMapping::Undefined => Reading::not_found(calibration),
        }
    }
}

/// Fraction of unit steps along `ray` (within the annulus) that land on a
/// candidate pixel or one of its perpendicular neighbours.
fn ray_support(mask: &NeedleMask, geometry: &DialGeometry, ray: &Ray) -> f64 {
    let (ux, uy) = ray.direction;
    let (nx, ny) = (-uy, ux);
    let first = geometry.inner.ceil() as i64;
    let last = geometry.outer.floor() as i64;
    if last < first {
        return 0.0;
    }

    let mut hits = 0usize;
    let mut steps = 0usize;
    for r in first..=last {
        let r = r as f64;
        let x = geometry.center.x + r * ux;
        let y = geometry.center.y + r * uy;
        steps += 1;
        let hit = [-1.0, 0.0, 1.0].iter().any(|side| {
            let px = (x + side * nx).round() as i64;
            let py = (y + side * ny).round() as i64;
            mask.contains(px, py)
        });
        if hit {
            hits += 1;
        }
    }
    (hits as f64 / steps as f64).clamp(0.0, 1.0)
}
