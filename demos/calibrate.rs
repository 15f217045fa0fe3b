//! Run the calibration routine against the emulated camera. The emulated
//! controller board applies the brightness frames and renders the lit beam
//! into the scene, so the calibrator has something to fit.

use anyhow::Result;
use laserharp_rs::calibrator::Calibrator;
use laserharp_rs::camera::emulated::EmulatedCamera;
use laserharp_rs::config::HarpConfig;
use laserharp_rs::emulator::EmulatedController;
use laserharp_rs::ipc::ipc_link;
use laserharp_rs::laser_array::LaserArray;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .init();

    let mut config = HarpConfig::default();
    config.laser_array.size = 4;
    config.calibrator.num_base_frames = 3;
    config.calibrator.num_beam_frames = 5;

    // ground truth the emulator renders and the calibrator must recover
    let lines = vec![
        (150.0f32, -0.05f32),
        (280.0, 0.0),
        (390.0, 0.05),
        (500.0, 0.1),
    ];

    let mut camera = EmulatedCamera::new(&config.camera);
    let (local, remote) = tokio::io::duplex(1024);
    tokio::spawn(EmulatedController::new(camera.scene(), lines.clone()).run(remote));

    let (tx, _rx) = ipc_link(local);
    let mut lasers = LaserArray::new(&config.laser_array, tx)?;

    let calibrator = Calibrator::new(&config);
    let calibration = calibrator.calibrate(&mut camera, &mut lasers).await?;

    log::info!("ya = {:.2}, yb = {:.2}", calibration.ya, calibration.yb);
    for (beam, (x0, m)) in calibration.x0.iter().zip(calibration.m.iter()).enumerate() {
        let truth = lines[beam];
        log::info!(
            "beam {beam}: x0 = {x0:8.3} (true {:7.1}), m = {m:7.4} (true {:6.2})",
            truth.0,
            truth.1
        );
    }

    Ok(())
}
