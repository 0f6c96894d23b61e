use approx::assert_relative_eq;
use frame_source::{SimulatorConfig, needle_angle, render_frame};
use gauge_core::{GaugeCalibration, GaugeReader, Point, ReadingStatus};

fn calibrations(config: &SimulatorConfig) -> Vec<GaugeCalibration> {
    (0..config.dials)
        .map(|dial| {
            let (x, y) = config.dial_center(dial);
            GaugeCalibration::new(
                SimulatorConfig::dial_label(dial),
                Point::new(x, y),
                config.radius,
                (-45.0, 225.0),
                (0.0, 100.0),
            )
        })
        .collect()
}

#[test]
fn reader_recovers_simulated_needles() {
    let config = SimulatorConfig::default();
    let calibrations = calibrations(&config);
    let reader = GaugeReader::default();

    for frame in [0u64, 13, 30, 67, 101] {
        let image = render_frame(&config, frame);
        let readings = reader.detect(&image, &calibrations);
        assert_eq!(readings.len(), config.dials);

        for (dial, reading) in readings.iter().enumerate() {
            let expected = needle_angle(frame, dial);
            assert_eq!(reading.status, ReadingStatus::Ok, "frame {frame} dial {dial}: {reading:?}");
            assert_eq!(reading.gauge_id, SimulatorConfig::dial_label(dial));
            assert_relative_eq!(reading.angle.expect("angle"), expected, epsilon = 1.5);
            assert_relative_eq!(
                reading.value.expect("value"),
                (expected + 45.0) / 270.0 * 100.0,
                epsilon = 1.0
            );
            assert!(reading.confidence > 0.5, "confidence {}", reading.confidence);
        }
    }
}

#[test]
fn dial_missing_from_frame_is_not_found() {
    let config = SimulatorConfig {
        dials: 1,
        ..SimulatorConfig::default()
    };
    let image = render_frame(&config, 10);
    let mut calibrations = calibrations(&SimulatorConfig::default());
    assert_eq!(calibrations.len(), 2);

    let readings = GaugeReader::default().detect(&image, &calibrations);
    assert_eq!(readings[0].status, ReadingStatus::Ok);
    assert_eq!(readings[1].status, ReadingStatus::NotFound);
    assert_eq!(readings[1].value, None);
}
