//! Pure raster transforms over an immutable RGB frame.
//!
//! Every function here only reads the image: region cropping, disk statistics
//! and the two needle-candidate masks (colour match, contrast fallback).

use image::{Rgb, RgbImage};

use crate::geometry::Point;

/// Axis-aligned pixel window `[x0, x1) × [y0, y1)` inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialRegion {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl DialRegion {
    /// Bounding box of the disk `(center, radius)` grown by `margin` pixels and
    /// clipped to a `width × height` frame. `None` when nothing is left.
    pub fn crop(width: u32, height: u32, center: Point, radius: f64, margin: u32) -> Option<Self> {
        if width == 0 || height == 0 || !center.is_finite() || !radius.is_finite() || radius <= 0.0 {
            return None;
        }
        let reach = radius + f64::from(margin);
        let x0 = (center.x - reach).floor().max(0.0);
        let y0 = (center.y - reach).floor().max(0.0);
        let x1 = ((center.x + reach).ceil() + 1.0).min(f64::from(width));
        let y1 = ((center.y + reach).ceil() + 1.0).min(f64::from(height));
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some(Self {
            x0: x0 as u32,
            y0: y0 as u32,
            x1: x1 as u32,
            y1: y1 as u32,
        })
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= i64::from(self.x0) && x < i64::from(self.x1) && y >= i64::from(self.y0) && y < i64::from(self.y1)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y - self.y0) as usize * self.width() as usize + (x - self.x0) as usize
    }

    fn pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.y0..self.y1).flat_map(move |y| (self.x0..self.x1).map(move |x| (x, y)))
    }
}

/// Dial disk plus the annulus in which needle pixels are searched.
///
/// The annulus skips the hub (caps and counterweights) and stops short of the
/// rim where tick marks live.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DialGeometry {
    pub center: Point,
    pub radius: f64,
    pub inner: f64,
    pub outer: f64,
    pub region: DialRegion,
}

impl DialGeometry {
    pub fn new(
        dimensions: (u32, u32),
        center: Point,
        radius: f64,
        margin: u32,
        hub_fraction: f64,
        reach_fraction: f64,
    ) -> Option<Self> {
        let region = DialRegion::crop(dimensions.0, dimensions.1, center, radius, margin)?;
        let inner = radius * hub_fraction.clamp(0.0, 1.0);
        let outer = radius * reach_fraction.clamp(0.0, 1.0);
        if outer <= inner {
            return None;
        }
        Some(Self {
            center,
            radius,
            inner,
            outer,
            region,
        })
    }

    pub fn in_disk(&self, dx: f64, dy: f64) -> bool {
        dx * dx + dy * dy <= self.radius * self.radius
    }

    pub fn in_annulus(&self, dx: f64, dy: f64) -> bool {
        let d2 = dx * dx + dy * dy;
        d2 >= self.inner * self.inner && d2 <= self.outer * self.outer
    }

    fn offset(&self, x: u32, y: u32) -> (f64, f64) {
        (f64::from(x) - self.center.x, f64::from(y) - self.center.y)
    }
}

/// Mean colour and luminance over the dial disk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskStats {
    pub mean_rgb: [f64; 3],
    pub mean_luma: f64,
}

impl DiskStats {
    pub fn measure(image: &RgbImage, geometry: &DialGeometry) -> Option<Self> {
        let mut sum = [0.0f64; 3];
        let mut pixels = 0usize;
        for (x, y) in geometry.region.pixels() {
            let (dx, dy) = geometry.offset(x, y);
            if !geometry.in_disk(dx, dy) {
                continue;
            }
            let Rgb(px) = *image.get_pixel(x, y);
            for (acc, channel) in sum.iter_mut().zip(px) {
                *acc += f64::from(channel);
            }
            pixels += 1;
        }
        if pixels == 0 {
            return None;
        }
        let n = pixels as f64;
        let mean_rgb = [sum[0] / n, sum[1] / n, sum[2] / n];
        Some(Self {
            mean_rgb,
            mean_luma: luma(mean_rgb),
        })
    }
}

/// Needle candidate pixels of one dial.
#[derive(Debug, Clone)]
pub struct NeedleMask {
    region: DialRegion,
    bits: Vec<bool>,
    offsets: Vec<(f64, f64)>,
}

impl NeedleMask {
    fn empty(region: DialRegion) -> Self {
        Self {
            region,
            bits: vec![false; region.width() as usize * region.height() as usize],
            offsets: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Candidate positions relative to the dial centre.
    pub fn offsets(&self) -> &[(f64, f64)] {
        &self.offsets
    }

    /// Whether the absolute pixel `(x, y)` is a candidate.
    pub fn contains(&self, x: i64, y: i64) -> bool {
        if !self.region.contains(x, y) {
            return false;
        }
        self.bits[self.region.index(x as u32, y as u32)]
    }
}

/// Candidates whose colour sits within `tolerance` of the needle colour and
/// closer to it than to the dial background.
pub fn needle_mask_by_color(
    image: &RgbImage,
    geometry: &DialGeometry,
    needle: [u8; 3],
    tolerance: f64,
    background: [f64; 3],
) -> NeedleMask {
    let needle = needle.map(f64::from);
    build_mask(image, geometry, |px| {
        let to_needle = color_distance(px, needle);
        to_needle <= tolerance && to_needle < color_distance(px, background)
    })
}

/// Fallback candidates: pixels whose luminance stands out from the dial face.
pub fn needle_mask_by_contrast(image: &RgbImage, geometry: &DialGeometry, mean_luma: f64, threshold: f64) -> NeedleMask {
    build_mask(image, geometry, |px| (luma(px) - mean_luma).abs() > threshold)
}

fn build_mask(image: &RgbImage, geometry: &DialGeometry, accept: impl Fn([f64; 3]) -> bool) -> NeedleMask {
    let mut mask = NeedleMask::empty(geometry.region);
    for (x, y) in geometry.region.pixels() {
        let (dx, dy) = geometry.offset(x, y);
        if !geometry.in_annulus(dx, dy) {
            continue;
        }
        let Rgb(px) = *image.get_pixel(x, y);
        if accept(px.map(f64::from)) {
            let idx = geometry.region.index(x, y);
            mask.bits[idx] = true;
            mask.offsets.push((dx, dy));
        }
    }
    mask
}

/// Rec. 601 luma.
pub fn luma(rgb: [f64; 3]) -> f64 {
    0.299 * rgb[0] + 0.587 * rgb[1] + 0.114 * rgb[2]
}

pub fn color_distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> RgbImage {
        RgbImage::from_pixel(64, 64, Rgb([240, 240, 240]))
    }

    #[test]
    fn crop_clips_to_frame() {
        let region = DialRegion::crop(64, 64, Point::new(5.0, 60.0), 10.0, 2).expect("region");
        assert_eq!(region.x0, 0);
        assert_eq!(region.y1, 64);
        assert!(region.contains(0, 63));
        assert!(!region.contains(0, 64));
    }

    #[test]
    fn crop_outside_frame_is_empty() {
        assert!(DialRegion::crop(64, 64, Point::new(200.0, 200.0), 10.0, 2).is_none());
        assert!(DialRegion::crop(64, 64, Point::new(-50.0, 10.0), 10.0, 2).is_none());
        assert!(DialRegion::crop(64, 64, Point::new(10.0, 10.0), 0.0, 2).is_none());
    }

    #[test]
    fn color_mask_ignores_hub_and_rim() {
        let mut image = canvas();
        let geometry = DialGeometry::new((64, 64), Point::new(32.0, 32.0), 20.0, 2, 0.15, 0.8).expect("geometry");
        // Needle pixels along +x, plus a red hub pixel and a red rim pixel.
        for x in 36..=47 {
            image.put_pixel(x, 32, Rgb([255, 0, 0]));
        }
        image.put_pixel(32, 32, Rgb([255, 0, 0]));
        image.put_pixel(32, 51, Rgb([255, 0, 0]));

        let stats = DiskStats::measure(&image, &geometry).expect("stats");
        let mask = needle_mask_by_color(&image, &geometry, [255, 0, 0], 100.0, stats.mean_rgb);
        assert_eq!(mask.len(), 12);
        assert!(mask.contains(40, 32));
        assert!(!mask.contains(32, 32));
        assert!(!mask.contains(32, 51));
    }

    #[test]
    fn contrast_mask_finds_dark_needle() {
        let mut image = canvas();
        let geometry = DialGeometry::new((64, 64), Point::new(32.0, 32.0), 20.0, 2, 0.15, 0.8).expect("geometry");
        for y in 36..=47 {
            image.put_pixel(32, y, Rgb([10, 10, 10]));
        }
        let stats = DiskStats::measure(&image, &geometry).expect("stats");
        let by_color = needle_mask_by_color(&image, &geometry, [255, 0, 0], 100.0, stats.mean_rgb);
        assert!(by_color.is_empty());
        let by_contrast = needle_mask_by_contrast(&image, &geometry, stats.mean_luma, 60.0);
        assert_eq!(by_contrast.len(), 12);
    }
}
