/// This module has been created using mod.rs in a subfolder, instead of just
/// creating a common.rs under tests. This is due to the test runner then not
/// searching for runnable tests in mod.rs.
use laserharp_rs::calibration::{BeamGrid, Calibration};
use laserharp_rs::camera::Frame;
use laserharp_rs::config::HarpConfig;
use laserharp_rs::detector::Detector;
use laserharp_rs::settings::Settings;
use std::sync::Arc;

#[allow(dead_code)]
pub fn logging_init(module: &str) {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Error)
        .filter_module(module, log::LevelFilter::Trace)
        .try_init();
}

/// The three-beam reference build most tests run against: 640x480 at 60 fps,
/// camera 0.2 m from the diode row.
#[allow(dead_code)]
pub fn test_config() -> HarpConfig {
    let mut config = HarpConfig::default();
    config.laser_array.size = 3;
    config.camera.resolution = [640, 480];
    config.camera.framerate = 60.0;
    config.camera.mount_distance = 0.2;
    config
}

/// Calibration spanning the whole frame: straight center beam, the outer
/// two leaning slightly outwards.
#[allow(dead_code)]
pub fn test_calibration() -> Calibration {
    Calibration::new(
        0.0,
        480.0,
        vec![200.0, 300.0, 400.0],
        vec![-0.1, 0.0, 0.1],
    )
    .unwrap()
}

#[allow(dead_code)]
pub fn calibrated_detector(settings: Arc<Settings>) -> Detector {
    let config = test_config();
    let mut detector = Detector::new(&config.detector, settings).unwrap();
    detector.set_grid(Arc::new(BeamGrid::new(&test_calibration(), &config.camera)));
    detector
}

/// A dark frame with white disks drawn into it.
#[allow(dead_code)]
pub fn frame_with_blobs(blobs: &[(i32, i32, i32, u8)]) -> Frame {
    let config = test_config();
    let mut frame = Frame::new(config.camera.width(), config.camera.height());
    for (cx, cy, radius, value) in blobs {
        frame.draw_blob(*cx, *cy, *radius, *value);
    }
    frame
}
