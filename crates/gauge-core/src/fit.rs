//! Needle direction fitting for rays anchored at the dial centre.
//!
//! Two stages:
//! 1. A radius-weighted angular vote picks the dominant direction, which keeps
//!    stray candidates (labels, reflections) from dragging the fit.
//! 2. Total least squares over the inliers of that direction refines it. The
//!    line is constrained through the origin, so the scatter matrix is taken
//!    about the centre rather than the centroid.

use crate::geometry::image_angle;

/// Number of one-degree bins used by the angular vote.
const VOTE_BINS: usize = 360;
/// Neighbouring bins summed on each side when picking the vote peak.
const VOTE_SMOOTHING: usize = 2;

/// Ray from the dial centre, expressed in image angle (clockwise from east).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub angle_deg: f64,
    pub direction: (f64, f64),
}

impl Ray {
    pub fn from_angle(angle_deg: f64) -> Self {
        let rad = angle_deg.to_radians();
        Self {
            angle_deg,
            direction: (rad.cos(), rad.sin()),
        }
    }

    fn from_direction(ux: f64, uy: f64) -> Self {
        Self {
            angle_deg: image_angle(ux, uy),
            direction: (ux, uy),
        }
    }

    /// Signed distance of `(dx, dy)` along the ray.
    pub fn projection(&self, dx: f64, dy: f64) -> f64 {
        dx * self.direction.0 + dy * self.direction.1
    }

    /// Perpendicular distance of `(dx, dy)` from the ray's supporting line.
    pub fn perpendicular_distance(&self, dx: f64, dy: f64) -> f64 {
        (dx * self.direction.1 - dy * self.direction.0).abs()
    }
}

/// Peak of the radius-weighted angular histogram of `offsets`.
pub fn dominant_angle(offsets: &[(f64, f64)]) -> Option<f64> {
    let mut histogram = [0.0f64; VOTE_BINS];
    let bin_width = 360.0 / VOTE_BINS as f64;
    let mut votes = 0usize;
    for &(dx, dy) in offsets {
        let weight = (dx * dx + dy * dy).sqrt();
        if weight <= f64::EPSILON {
            continue;
        }
        let bin = (((image_angle(dx, dy) + 180.0) / bin_width) as usize).min(VOTE_BINS - 1);
        histogram[bin] += weight;
        votes += 1;
    }
    if votes == 0 {
        return None;
    }

    let mut best_bin = 0usize;
    let mut best_score = f64::MIN;
    for bin in 0..VOTE_BINS {
        let score: f64 = (0..=2 * VOTE_SMOOTHING)
            .map(|k| histogram[(bin + VOTE_BINS + k - VOTE_SMOOTHING) % VOTE_BINS])
            .sum();
        if score > best_score {
            best_score = score;
            best_bin = bin;
        }
    }

    // Centre of mass inside the winning window, so a needle that lands on a
    // bin edge is not biased toward whichever window won the tie.
    let mut weighted = 0.0;
    for k in 0..=2 * VOTE_SMOOTHING {
        let weight = histogram[(best_bin + VOTE_BINS + k - VOTE_SMOOTHING) % VOTE_BINS];
        weighted += weight * (k as f64 - VOTE_SMOOTHING as f64);
    }
    let shift = if best_score > 0.0 { weighted / best_score } else { 0.0 };
    Some((best_bin as f64 + 0.5 + shift) * bin_width - 180.0)
}

/// Total-least-squares ray through the origin.
///
/// Returns `None` for fewer than two points or when the scatter has no
/// dominant axis (all points at the origin, or isotropic spread).
pub fn fit_anchored_ray(offsets: &[(f64, f64)]) -> Option<Ray> {
    if offsets.len() < 2 {
        return None;
    }

    let (mut sxx, mut syy, mut sxy) = (0.0f64, 0.0f64, 0.0f64);
    for &(dx, dy) in offsets {
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let total = sxx + syy;
    if total <= f64::EPSILON {
        return None;
    }

    // Eigenvalues of | sxx sxy ; sxy syy |: (sxx + syy)/2 ± disc.
    let disc = (((sxx - syy) / 2.0).powi(2) + sxy * sxy).sqrt();
    if disc <= total * 1e-9 {
        return None;
    }
    let lambda_major = total / 2.0 + disc;

    let (mut ux, mut uy) = if sxy.abs() > f64::EPSILON * total {
        let (ex, ey) = (lambda_major - syy, sxy);
        let norm = (ex * ex + ey * ey).sqrt();
        (ex / norm, ey / norm)
    } else if sxx >= syy {
        (1.0, 0.0)
    } else {
        (0.0, 1.0)
    };

    // The eigenvector only fixes an axis; point it at the bulk of the mass.
    let mass: f64 = offsets.iter().map(|&(dx, dy)| dx * ux + dy * uy).sum();
    if mass < 0.0 {
        ux = -ux;
        uy = -uy;
    }
    Some(Ray::from_direction(ux, uy))
}

/// Vote for a direction, keep candidates within `inlier_width` of it, then
/// refine with [`fit_anchored_ray`].
pub fn fit_needle(offsets: &[(f64, f64)], inlier_width: f64) -> Option<Ray> {
    let coarse = Ray::from_angle(dominant_angle(offsets)?);
    let inliers: Vec<(f64, f64)> = offsets
        .iter()
        .copied()
        .filter(|&(dx, dy)| coarse.projection(dx, dy) > 0.0 && coarse.perpendicular_distance(dx, dy) <= inlier_width)
        .collect();
    match fit_anchored_ray(&inliers) {
        Some(refined) if refined.projection(coarse.direction.0, coarse.direction.1) > 0.0 => Some(refined),
        _ => Some(coarse),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ray_points(angle_deg: f64, from: f64, to: f64) -> Vec<(f64, f64)> {
        let rad = angle_deg.to_radians();
        let mut points = Vec::new();
        let mut r = from;
        while r <= to {
            points.push((r * rad.cos(), r * rad.sin()));
            r += 1.0;
        }
        points
    }

    #[test]
    fn horizontal_ray() {
        let ray = fit_anchored_ray(&ray_points(0.0, 5.0, 40.0)).expect("ray");
        assert_relative_eq!(ray.angle_deg, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn ray_direction_follows_mass() {
        let ray = fit_anchored_ray(&ray_points(180.0, 5.0, 40.0)).expect("ray");
        assert_relative_eq!(ray.angle_deg.abs(), 180.0, epsilon = 1e-6);
    }

    #[test]
    fn diagonal_ray() {
        let ray = fit_anchored_ray(&ray_points(135.0, 5.0, 40.0)).expect("ray");
        assert_relative_eq!(ray.angle_deg, 135.0, epsilon = 1e-6);
    }

    #[test]
    fn degenerate_inputs_have_no_ray() {
        assert!(fit_anchored_ray(&[]).is_none());
        assert!(fit_anchored_ray(&[(3.0, 4.0)]).is_none());
        assert!(fit_anchored_ray(&[(0.0, 0.0), (0.0, 0.0)]).is_none());
        // Symmetric cross: no dominant axis.
        assert!(fit_anchored_ray(&[(1.0, 0.0), (-1.0, 0.0), (0.0, 1.0), (0.0, -1.0)]).is_none());
        assert!(dominant_angle(&[(0.0, 0.0)]).is_none());
    }

    #[test]
    fn vote_ignores_scattered_outliers() {
        let mut points = ray_points(120.0, 5.0, 60.0);
        points.extend([(30.0, 2.0), (-10.0, -25.0), (22.0, -22.0), (5.0, 40.0), (-35.0, 0.0)]);
        let ray = fit_needle(&points, 3.0).expect("needle");
        assert_relative_eq!(ray.angle_deg, 120.0, epsilon = 0.5);
    }

    #[test]
    fn thick_needle_fits_its_axis() {
        let rad = 30.0f64.to_radians();
        let (nx, ny) = (-rad.sin(), rad.cos());
        let mut points = Vec::new();
        for offset in [-1.0, 0.0, 1.0] {
            for (x, y) in ray_points(30.0, 5.0, 50.0) {
                points.push((x + offset * nx, y + offset * ny));
            }
        }
        let ray = fit_needle(&points, 3.0).expect("needle");
        assert_relative_eq!(ray.angle_deg, 30.0, epsilon = 0.1);
    }
}
