//! Run the full pipeline against the emulated camera: a blob orbits the
//! frame, crossing the beams, and the resulting MIDI egress is logged.

use anyhow::Result;
use laserharp_rs::calibration::{Calibration, CalibrationDocument};
use laserharp_rs::camera::emulated::EmulatedCamera;
use laserharp_rs::config::HarpConfig;
use laserharp_rs::din_midi::MidiEvent;
use laserharp_rs::emulator::EmulatedController;
use laserharp_rs::runtime::LaserHarp;
use std::time::Duration;
use tokio::io::AsyncReadExt;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let mut config = HarpConfig::default();
    config.laser_array.size = 8;

    // a synthetic calibration: beams spread evenly across the frame
    let width = config.camera.width() as f32;
    let height = config.camera.height() as f32;
    let beams = config.laser_array.size;
    let x0: Vec<f32> = (0..beams)
        .map(|i| width * (i + 1) as f32 / (beams + 1) as f32)
        .collect();
    let calibration = Calibration::new(0.0, height, x0, vec![0.0; beams])?;

    let calibration_path = std::env::temp_dir().join("laserharp-demo-calibration.json");
    CalibrationDocument::new(calibration, config.required_config()).save(&calibration_path)?;
    config.calibration_path = Some(calibration_path);

    let camera = EmulatedCamera::new(&config.camera);
    let scene = camera.scene();
    let (midi_local, mut midi_remote) = tokio::io::duplex(4096);
    let (ipc_local, ipc_remote) = tokio::io::duplex(4096);

    // the fake board handles the control-link traffic. It renders beams for
    // the calibrator only; the playing surface below draws its own blob.
    tokio::spawn(EmulatedController::new(scene.clone(), Vec::new()).run(ipc_remote));

    // something for the detector to see: a blob orbiting the frame center
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(16));
        let mut phase = 0.0f32;
        loop {
            ticker.tick().await;
            phase += 0.05;
            scene.draw(|frame| {
                let x = 320.0 + phase.cos() * 300.0;
                let y = 240.0 + phase.sin() * 140.0;
                frame.fill(0);
                frame.draw_blob(x as i32, y as i32, 30, 255);
            });
        }
    });

    // log what comes out of the DIN port
    tokio::spawn(async move {
        let mut bytes = [0u8; 3];
        while midi_remote.read_exact(&mut bytes).await.is_ok() {
            match MidiEvent::parse(&bytes) {
                Ok(event) => log::info!("DIN: {event:?}"),
                Err(_) => log::warn!("DIN: malformed {bytes:02x?}"),
            }
        }
    });

    let harp = LaserHarp::new(config, camera, midi_local, ipc_local)?;
    let handle = harp.handle();
    let runner = tokio::spawn(harp.run());

    tokio::time::sleep(Duration::from_secs(10)).await;
    handle.stop().await;
    runner.await??;

    Ok(())
}
