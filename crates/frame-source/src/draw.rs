//! Minimal raster drawing on RGB frames: lines, circles, filled shapes and a
//! 5×7 bitmap font. Used by the dial simulator and by result overlays.

use image::{Rgb, RgbImage};

/// Advance per glyph at scale 1 (5 columns plus one blank).
pub const GLYPH_ADVANCE: i64 = 6;
/// Glyph height at scale 1.
pub const GLYPH_HEIGHT: i64 = 7;

/// Set a pixel if it falls inside the image.
pub fn put_pixel_clipped(image: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x < 0 || y < 0 || x >= i64::from(image.width()) || y >= i64::from(image.height()) {
        return;
    }
    image.put_pixel(x as u32, y as u32, color);
}

pub fn fill_rect(image: &mut RgbImage, left: i64, top: i64, right: i64, bottom: i64, color: Rgb<u8>) {
    for y in top..=bottom {
        for x in left..=right {
            put_pixel_clipped(image, x, y, color);
        }
    }
}

pub fn fill_disk(image: &mut RgbImage, center: (f64, f64), radius: f64, color: Rgb<u8>) {
    let reach = radius.ceil() as i64;
    let (cx, cy) = (center.0.round() as i64, center.1.round() as i64);
    for oy in -reach..=reach {
        for ox in -reach..=reach {
            if ((ox * ox + oy * oy) as f64) <= radius * radius {
                put_pixel_clipped(image, cx + ox, cy + oy, color);
            }
        }
    }
}

/// Ring of the given stroke `thickness` centred on `radius`.
pub fn draw_circle(image: &mut RgbImage, center: (f64, f64), radius: f64, thickness: f64, color: Rgb<u8>) {
    let half = thickness / 2.0;
    let reach = (radius + half).ceil() as i64;
    let (cx, cy) = (center.0.round() as i64, center.1.round() as i64);
    for oy in -reach..=reach {
        for ox in -reach..=reach {
            let dist = ((ox * ox + oy * oy) as f64).sqrt();
            if (dist - radius).abs() <= half {
                put_pixel_clipped(image, cx + ox, cy + oy, color);
            }
        }
    }
}

/// Thick segment drawn by stamping discs every half pixel.
pub fn draw_line(image: &mut RgbImage, from: (f64, f64), to: (f64, f64), thickness: f64, color: Rgb<u8>) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let length = (dx * dx + dy * dy).sqrt();
    let steps = (length * 2.0).ceil().max(1.0) as usize;
    let radius = (thickness / 2.0).max(0.5);
    for step in 0..=steps {
        let t = step as f64 / steps as f64;
        fill_disk(image, (from.0 + dx * t, from.1 + dy * t), radius, color);
    }
}

/// Width in pixels of `text` rendered at `scale`.
pub fn text_width(text: &str, scale: u32) -> i64 {
    text.chars().count() as i64 * GLYPH_ADVANCE * i64::from(scale.max(1))
}

/// Render `text` with its top-left corner at `(x, y)`. Characters outside the
/// font are drawn as `?`.
pub fn draw_text(image: &mut RgbImage, mut x: i64, y: i64, text: &str, scale: u32, color: Rgb<u8>) {
    let scale = i64::from(scale.max(1));
    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        let glyph = glyph_bits(ch).unwrap_or(UNKNOWN_GLYPH);
        for (row, pattern) in glyph.iter().enumerate() {
            for col in 0..5i64 {
                if (pattern >> (4 - col)) & 1 == 1 {
                    let px = x + col * scale;
                    let py = y + row as i64 * scale;
                    fill_rect(image, px, py, px + scale - 1, py + scale - 1, color);
                }
            }
        }
        x += GLYPH_ADVANCE * scale;
    }
}

const UNKNOWN_GLYPH: [u8; 7] = [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0, 0b00100];

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    let rows = match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '%' => [0b10001, 0b10010, 0b00100, 0b01000, 0b10010, 0b10001, 0b00000],
        '-' => [0, 0, 0, 0b11111, 0, 0, 0],
        '_' => [0, 0, 0, 0, 0, 0, 0b11111],
        ':' => [0, 0b01100, 0b01100, 0, 0b01100, 0b01100, 0],
        '/' => [0b00001, 0b00010, 0b00010, 0b00100, 0b01000, 0b01000, 0b10000],
        '.' => [0, 0, 0, 0, 0, 0b00110, 0b00110],
        '?' => UNKNOWN_GLYPH,
        ' ' => [0; 7],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    #[test]
    fn clipped_writes_ignore_out_of_bounds() {
        let mut image = RgbImage::from_pixel(4, 4, WHITE);
        put_pixel_clipped(&mut image, -1, 2, BLACK);
        put_pixel_clipped(&mut image, 4, 0, BLACK);
        fill_rect(&mut image, -3, -3, 0, 0, BLACK);
        assert_eq!(*image.get_pixel(0, 0), BLACK);
        assert_eq!(image.pixels().filter(|p| **p == BLACK).count(), 1);
    }

    #[test]
    fn line_covers_both_endpoints() {
        let mut image = RgbImage::from_pixel(20, 20, WHITE);
        draw_line(&mut image, (2.0, 2.0), (17.0, 9.0), 1.0, BLACK);
        assert_eq!(*image.get_pixel(2, 2), BLACK);
        assert_eq!(*image.get_pixel(17, 9), BLACK);
    }

    #[test]
    fn circle_leaves_centre_untouched() {
        let mut image = RgbImage::from_pixel(30, 30, WHITE);
        draw_circle(&mut image, (15.0, 15.0), 10.0, 2.0, BLACK);
        assert_eq!(*image.get_pixel(15, 15), WHITE);
        assert_eq!(*image.get_pixel(25, 15), BLACK);
        assert_eq!(*image.get_pixel(15, 5), BLACK);
    }

    #[test]
    fn text_width_scales_with_glyphs() {
        assert_eq!(text_width("METER-1", 1), 42);
        assert_eq!(text_width("METER-1", 2), 84);
        let mut image = RgbImage::from_pixel(50, 10, WHITE);
        draw_text(&mut image, 0, 0, "t", 1, BLACK);
        // Top bar of a T.
        assert!((0..5).all(|x| *image.get_pixel(x, 0) == BLACK));
    }

    #[test]
    fn characters_outside_font_draw_a_placeholder() {
        let mut degree = RgbImage::from_pixel(12, 8, WHITE);
        draw_text(&mut degree, 0, 0, "°C", 1, BLACK);
        let mut question = RgbImage::from_pixel(12, 8, WHITE);
        draw_text(&mut question, 0, 0, "?C", 1, BLACK);
        assert!(degree.pixels().any(|p| *p == BLACK));
        assert_eq!(degree, question);
    }

    #[test]
    fn status_labels_render_underscores() {
        let mut image = RgbImage::from_pixel(12, 8, WHITE);
        draw_text(&mut image, 0, 0, "a_", 1, BLACK);
        // Bottom stroke of `_` in the second cell.
        assert!((6..11).all(|x| *image.get_pixel(x, 6) == BLACK));
    }
}
