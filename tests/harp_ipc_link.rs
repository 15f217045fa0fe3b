mod common;

use crate::common::*;

use harp_ipc::packet::IpcPkt;
use laserharp_rs::camera::emulated::EmulatedCamera;
use laserharp_rs::config::CameraConfig;
use laserharp_rs::emulator::{EMULATOR_VERSION, EmulatedController};
use laserharp_rs::ipc::{ipc_link, request};
use laserharp_rs::Error;
use tokio::io::AsyncWriteExt;

#[tokio::test(start_paused = true)]
async fn frames_cross_the_link_intact() {
    logging_init("harp_ipc_link");

    let (local, remote) = tokio::io::duplex(256);
    let (mut tx, _rx_local) = ipc_link(local);
    let (_tx_remote, mut rx) = ipc_link(remote);

    let pkt = IpcPkt::set_single(3, 100, 1.5);
    tx.send(pkt).await.unwrap();
    assert_eq!(rx.read().await.unwrap(), Some(pkt));

    // a quiet line reads as nothing
    assert_eq!(rx.read().await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn a_stray_byte_is_dropped() {
    logging_init("harp_ipc_link");

    let (mut local, remote) = tokio::io::duplex(256);
    let (_tx_remote, mut rx) = ipc_link(remote);

    // one lonely byte: consumed as a command, then timed out and dropped
    local.write_all(&[0xAA]).await.unwrap();
    assert_eq!(rx.read().await.unwrap(), None);

    // the link is aligned again afterwards
    local
        .write_all(IpcPkt::stop_animation().as_bytes())
        .await
        .unwrap();
    assert_eq!(rx.read().await.unwrap(), Some(IpcPkt::stop_animation()));
}

#[tokio::test(start_paused = true)]
async fn closed_stream_kills_the_link() {
    logging_init("harp_ipc_link");

    let (local, remote) = tokio::io::duplex(256);
    let (_tx, mut rx) = ipc_link(local);
    drop(remote);

    assert!(matches!(
        rx.read().await,
        Err(Error::LaserArrayUnavailable)
    ));
}

#[tokio::test(start_paused = true)]
async fn brightness_query_round_trip() {
    logging_init("harp_ipc_link");

    let camera = EmulatedCamera::new(&CameraConfig::default());
    let (local, remote) = tokio::io::duplex(256);
    tokio::spawn(
        EmulatedController::new(camera.scene(), vec![(100.0, 0.0), (200.0, 0.0)]).run(remote),
    );

    let (mut tx, mut rx) = ipc_link(local);

    tx.send(IpcPkt::set_single(1, 64, 0.0)).await.unwrap();
    let reply = request(&mut tx, &mut rx, IpcPkt::query_brightness(1))
        .await
        .unwrap()
        .expect("the controller answers queries");
    assert_eq!(reply.arg0(), 1);
    assert_eq!(reply.arg1(), 64);

    // unknown indices read back dark
    let reply = request(&mut tx, &mut rx, IpcPkt::query_brightness(9))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply.arg1(), 0);
}

#[tokio::test(start_paused = true)]
async fn version_inquiry_round_trip() {
    logging_init("harp_ipc_link");

    let camera = EmulatedCamera::new(&CameraConfig::default());
    let (local, remote) = tokio::io::duplex(256);
    tokio::spawn(EmulatedController::new(camera.scene(), Vec::new()).run(remote));

    let (mut tx, mut rx) = ipc_link(local);
    let reply = request(&mut tx, &mut rx, IpcPkt::version_request())
        .await
        .unwrap()
        .expect("the controller reports its firmware");
    assert_eq!(reply.version().unwrap(), EMULATOR_VERSION);
}
