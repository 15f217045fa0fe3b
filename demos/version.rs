//! Version inquiry round-trip on the control link, against the emulated
//! controller on the far end of a loopback stream.

use anyhow::Result;
use harp_ipc::packet::IpcPkt;
use laserharp_rs::camera::emulated::EmulatedCamera;
use laserharp_rs::config::CameraConfig;
use laserharp_rs::emulator::EmulatedController;
use laserharp_rs::ipc::{ipc_link, request};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .init();

    let camera = EmulatedCamera::new(&CameraConfig::default());
    let (local, remote) = tokio::io::duplex(64);
    tokio::spawn(EmulatedController::new(camera.scene(), Vec::new()).run(remote));

    let (mut tx, mut rx) = ipc_link(local);
    match request(&mut tx, &mut rx, IpcPkt::version_request()).await? {
        Some(reply) => log::info!("controller firmware {}", reply.version()?),
        None => log::warn!("controller did not answer"),
    }

    Ok(())
}
