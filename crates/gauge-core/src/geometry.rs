//! Image-plane geometry shared by the calibration model and the raster stages.

use serde::{Deserialize, Serialize};

/// Point in image coordinates (x to the right, y downward).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Point reached by walking `distance` pixels from `self` along `angle_deg`
    /// (image convention: clockwise from the +x axis).
    pub fn offset_polar(self, angle_deg: f64, distance: f64) -> Self {
        let rad = angle_deg.to_radians();
        Self::new(self.x + distance * rad.cos(), self.y + distance * rad.sin())
    }
}

/// Zero reference and direction used to express needle angles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleConvention {
    /// Degrees from the image +x axis, growing clockwise on screen.
    #[default]
    ClockwiseFromEast,
    /// Degrees from twelve o'clock, growing clockwise on screen.
    ClockwiseFromNorth,
}

impl AngleConvention {
    /// Convert an image angle (clockwise from east) into this convention.
    pub fn from_image_angle(self, angle_deg: f64) -> f64 {
        match self {
            AngleConvention::ClockwiseFromEast => angle_deg,
            AngleConvention::ClockwiseFromNorth => angle_deg + 90.0,
        }
    }

    /// Convert an angle expressed in this convention back to image space.
    pub fn to_image_angle(self, angle_deg: f64) -> f64 {
        match self {
            AngleConvention::ClockwiseFromEast => angle_deg,
            AngleConvention::ClockwiseFromNorth => angle_deg - 90.0,
        }
    }
}

/// Wrap an angle into `[-180, 180)`.
pub fn wrap_degrees(angle_deg: f64) -> f64 {
    (angle_deg + 180.0).rem_euclid(360.0) - 180.0
}

/// Image angle (clockwise from east) of the vector `(dx, dy)`.
pub fn image_angle(dx: f64, dy: f64) -> f64 {
    dy.atan2(dx).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn wrap_keeps_values_in_half_open_range() {
        assert_relative_eq!(wrap_degrees(190.0), -170.0);
        assert_relative_eq!(wrap_degrees(-190.0), 170.0);
        assert_relative_eq!(wrap_degrees(180.0), -180.0);
        assert_relative_eq!(wrap_degrees(720.0 + 45.0), 45.0);
    }

    #[test]
    fn image_angle_grows_clockwise_on_screen() {
        assert_relative_eq!(image_angle(1.0, 0.0), 0.0);
        // y grows downward, so "down" is +90 and "up" is -90.
        assert_relative_eq!(image_angle(0.0, 1.0), 90.0);
        assert_relative_eq!(image_angle(0.0, -1.0), -90.0);
    }

    #[test]
    fn north_convention_puts_twelve_oclock_at_zero() {
        let up = image_angle(0.0, -1.0);
        let conv = AngleConvention::ClockwiseFromNorth;
        assert_relative_eq!(conv.from_image_angle(up), 0.0);
        assert_relative_eq!(conv.to_image_angle(conv.from_image_angle(37.0)), 37.0);
    }

    #[test]
    fn polar_offset_follows_image_axes() {
        let p = Point::new(10.0, 10.0).offset_polar(90.0, 5.0);
        assert_relative_eq!(p.x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 15.0, epsilon = 1e-9);
    }
}
