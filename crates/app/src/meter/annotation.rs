use frame_source::draw::{GLYPH_HEIGHT, draw_line, draw_text, fill_disk, fill_rect, text_width};
use gauge_core::{GaugeCalibration, Reading, ReadingStatus};
use image::{Rgb, RgbImage};

const RAY: Rgb<u8> = Rgb([0, 200, 0]);
const LABEL_BG: Rgb<u8> = Rgb([20, 20, 20]);
const LABEL_OK: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_WARN: Rgb<u8> = Rgb([255, 190, 0]);
const LABEL_MISSING: Rgb<u8> = Rgb([255, 80, 80]);
const FOOTER_FG: Rgb<u8> = Rgb([255, 255, 255]);

/// Text shown under a dial.
pub(crate) fn reading_label(reading: &Reading) -> String {
    match (reading.status, reading.value) {
        (ReadingStatus::Ok, Some(value)) if reading.unit.is_empty() => format!("{} {value:.1}", reading.gauge_id),
        (ReadingStatus::Ok, Some(value)) => format!("{} {value:.1} {}", reading.gauge_id, reading.unit),
        (status, _) => format!("{} {}", reading.gauge_id, status.label()),
    }
}

/// Overlay detected needles, per-dial labels and a footer onto `image`.
///
/// `readings` pair up with `calibrations` by position.
pub(crate) fn annotate_frame(
    image: &mut RgbImage,
    calibrations: &[GaugeCalibration],
    readings: &[Reading],
    frame_number: u64,
    fps: f64,
) {
    for (calibration, reading) in calibrations.iter().zip(readings) {
        let center = calibration.center();
        if let Some(angle) = reading.angle {
            let tip = center.offset_polar(calibration.to_image_angle(angle), calibration.radius() * 0.9);
            draw_line(image, (center.x, center.y), (tip.x, tip.y), 1.0, RAY);
            fill_disk(image, (center.x, center.y), 2.0, RAY);
        }

        let label = reading_label(reading);
        let color = match reading.status {
            ReadingStatus::Ok => LABEL_OK,
            ReadingStatus::OutOfRange => LABEL_WARN,
            ReadingStatus::NotFound => LABEL_MISSING,
        };
        let width = text_width(&label, 1);
        let x = center.x.round() as i64 - width / 2;
        let y = (center.y + calibration.radius()).round() as i64 + 32;
        fill_rect(image, x - 2, y - 2, x + width, y + GLYPH_HEIGHT + 1, LABEL_BG);
        draw_text(image, x, y, &label, 1, color);
    }

    let footer = format!("FRAME {frame_number:06}  FPS {fps:4.1}");
    let width = text_width(&footer, 1).min(i64::from(image.width()));
    let x = (i64::from(image.width()) - width - 4).max(0);
    let y = (i64::from(image.height()) - 12).max(0);
    fill_rect(image, x - 2, y - 2, x + width, y + GLYPH_HEIGHT + 1, LABEL_BG);
    draw_text(image, x, y, &footer, 1, FOOTER_FG);
}
