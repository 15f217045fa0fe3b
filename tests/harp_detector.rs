mod common;

use crate::common::*;

use laserharp_rs::calibration::BeamGrid;
use laserharp_rs::detector::Detector;
use laserharp_rs::settings::Settings;
use laserharp_rs::Error;
use std::sync::Arc;

#[test]
fn grid_coordinates() {
    logging_init("harp_detector");

    let config = test_config();
    let grid = BeamGrid::new(&test_calibration(), &config.camera);

    assert_eq!(grid.y_start(), 0);
    assert_eq!(grid.rows(), 480);
    assert_eq!(grid.beams(), 3);

    // lines evaluated at the top row and 100 rows down
    assert_eq!(
        [grid.x_sample(0, 0), grid.x_sample(0, 1), grid.x_sample(0, 2)],
        [200, 300, 400]
    );
    assert_eq!(
        [
            grid.x_sample(100, 0),
            grid.x_sample(100, 1),
            grid.x_sample(100, 2)
        ],
        [190, 300, 410]
    );

    // the frame center sits at 45 degrees, so the metric length equals the
    // mount distance there
    assert!((grid.y_metric(240) - 0.2).abs() < 1e-4);
}

#[test]
fn grid_clamps_to_frame() {
    logging_init("harp_detector");

    let config = test_config();
    let calibration = laserharp_rs::calibration::Calibration::new(
        0.0,
        480.0,
        vec![5.0, 630.0, 300.0],
        vec![-0.5, 0.5, 0.0],
    )
    .unwrap();
    let grid = BeamGrid::new(&calibration, &config.camera);

    for row in 0..grid.rows() {
        for beam in 0..grid.beams() {
            assert!(grid.x_sample(row, beam) < config.camera.width());
        }
    }
}

#[test]
fn empty_frame_is_all_absent() {
    logging_init("harp_detector");

    let settings = Arc::new(Settings::default());
    let detector = calibrated_detector(settings);

    let raw = detector.detect(&frame_with_blobs(&[])).unwrap();
    assert_eq!(raw.len(), 3);
    assert!(raw.iter().all(|l| l.is_nan()));
}

#[test]
fn beam_length_from_blobs() {
    logging_init("harp_detector");

    let settings = Arc::new(Settings::default());
    let detector = calibrated_detector(settings);

    // center disk on the middle beam at 45 degrees; a second one on the
    // right beam at tan(100/480 * 90deg) * 0.2m ~= 0.0679m
    let frame = frame_with_blobs(&[(300, 240, 10, 255), (410, 100, 10, 255)]);
    let raw = detector.detect(&frame).unwrap();

    assert!(raw[0].is_nan());
    assert!((raw[1] - 0.2).abs() < 0.005, "raw[1] = {}", raw[1]);
    assert!((raw[2] - 0.0679).abs() < 0.003, "raw[2] = {}", raw[2]);
}

#[test]
fn dim_blob_stays_below_threshold() {
    logging_init("harp_detector");

    let settings = Arc::new(Settings::default());
    settings.set_threshold(200);
    let detector = calibrated_detector(settings);

    let frame = frame_with_blobs(&[(300, 240, 10, 150)]);
    let raw = detector.detect(&frame).unwrap();
    assert!(raw[1].is_nan());
}

#[test]
fn length_bounds_reject_extremes() {
    logging_init("harp_detector");

    let settings = Arc::new(Settings::default());
    let detector = calibrated_detector(settings);

    // a spot right above the diode maps to less than length_min
    let frame = frame_with_blobs(&[(300, 4, 4, 255)]);
    let raw = detector.detect(&frame).unwrap();
    assert!(raw[1].is_nan());

    // a spot at the very top of the beam maps beyond length_max
    let frame = frame_with_blobs(&[(300, 478, 4, 255)]);
    let raw = detector.detect(&frame).unwrap();
    assert!(raw[1].is_nan());
}

#[test]
fn equal_interceptions_resolve_to_the_nearer_one() {
    logging_init("harp_detector");

    let settings = Arc::new(Settings::default());
    let detector = calibrated_detector(settings);

    // two identical disks on the center beam: the tie breaks towards the
    // smaller row, the interception closer to the diode
    let frame = frame_with_blobs(&[(300, 150, 10, 255), (300, 300, 10, 255)]);
    let raw = detector.detect(&frame).unwrap();

    let near = (150.0 / 480.0 * std::f32::consts::FRAC_PI_2).tan() * 0.2;
    assert!((raw[1] - near).abs() < 0.005, "raw[1] = {}", raw[1]);
}

#[test]
fn uncalibrated_detector_fails() {
    logging_init("harp_detector");

    let config = test_config();
    let detector = Detector::new(&config.detector, Arc::new(Settings::default())).unwrap();

    let result = detector.detect(&frame_with_blobs(&[]));
    assert!(matches!(result, Err(Error::NotCalibrated)));
}
