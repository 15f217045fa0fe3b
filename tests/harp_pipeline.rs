mod common;

use crate::common::*;

use laserharp_rs::calibration::CalibrationDocument;
use laserharp_rs::camera::emulated::EmulatedCamera;
use laserharp_rs::din_midi::MidiEvent;
use laserharp_rs::emulator::EmulatedController;
use laserharp_rs::runtime::{HarpStatus, LaserHarp};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

/// Read egress messages off the DIN remote end until `predicate` matches or
/// the deadline passes.
async fn wait_for_midi(
    remote: &mut DuplexStream,
    collected: &mut Vec<MidiEvent>,
    predicate: impl Fn(&MidiEvent) -> bool,
) -> bool {
    let deadline = Duration::from_secs(5);
    let result = tokio::time::timeout(deadline, async {
        loop {
            let mut bytes = [0u8; 3];
            if remote.read_exact(&mut bytes).await.is_err() {
                return false;
            }
            let event = MidiEvent::parse(&bytes).expect("egress must be well-formed");
            collected.push(event);
            if predicate(collected.last().unwrap()) {
                return true;
            }
        }
    })
    .await;
    matches!(result, Ok(true))
}

#[tokio::test(start_paused = true)]
async fn frames_in_midi_out() {
    logging_init("harp_pipeline");

    let mut config = test_config();
    config.send_standby = true;

    // persist a known calibration so the runtime skips the camera dance
    let calibration_path =
        std::env::temp_dir().join(format!("harp-pipeline-{}.json", std::process::id()));
    CalibrationDocument::new(test_calibration(), config.required_config())
        .save(&calibration_path)
        .unwrap();
    config.calibration_path = Some(calibration_path.clone());

    let camera = EmulatedCamera::new(&config.camera);
    let scene = camera.scene();
    let (midi_local, mut midi_remote) = tokio::io::duplex(4096);
    let (ipc_local, mut ipc_remote) = tokio::io::duplex(4096);

    let harp = LaserHarp::new(config, camera, midi_local, ipc_local).unwrap();
    let handle = harp.handle();
    let runner = tokio::spawn(harp.run());

    // startup fades the strings in before anything else happens on the link
    let mut ipc_bytes = [0u8; 4];
    ipc_remote.read_exact(&mut ipc_bytes).await.unwrap();
    assert_eq!(ipc_bytes, [0x81, 10, 0x05, 0x00]);

    let mut midi = Vec::new();

    // an interception of the middle beam plays its note
    scene.draw(|frame| frame.draw_blob(300, 240, 10, 255));
    assert!(
        wait_for_midi(&mut midi_remote, &mut midi, |event| {
            *event == MidiEvent::note_on(0, 50, 127)
        })
        .await,
        "expected a note-on, got {midi:?}"
    );

    // removing it releases the note
    scene.clear();
    assert!(
        wait_for_midi(&mut midi_remote, &mut midi, |event| {
            *event == MidiEvent::note_off(0, 50)
        })
        .await,
        "expected a note-off, got {midi:?}"
    );

    // an ingress configuration note re-keys the running instrument: the
    // still-intercepted beam moves to its new note, off before on
    scene.draw(|frame| frame.draw_blob(300, 240, 10, 255));
    assert!(
        wait_for_midi(&mut midi_remote, &mut midi, |event| {
            *event == MidiEvent::note_on(0, 50, 127)
        })
        .await
    );
    midi_remote
        .write_all(&MidiEvent::note_on(1, 29, 127).to_bytes())
        .await
        .unwrap();
    assert!(
        wait_for_midi(&mut midi_remote, &mut midi, |event| {
            *event == MidiEvent::note_on(0, 62, 127)
        })
        .await,
        "expected the remapped note-on, got {midi:?}"
    );
    // the release of the old note (the second note-off(50) overall) must
    // precede the note-on of the remapped one
    let off_position = midi
        .iter()
        .rposition(|e| *e == MidiEvent::note_off(0, 50))
        .expect("old note must be released");
    let on_position = midi
        .iter()
        .position(|e| *e == MidiEvent::note_on(0, 62, 127))
        .unwrap();
    assert!(off_position < on_position);

    // a short hardware button press flips the instrument; the runtime
    // acknowledges with the flip animation on the control link
    ipc_remote.write_all(&[0x90, b's', 0x00, 0x00]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // cooperative stop releases the sounding note
    handle.stop().await;
    assert!(
        wait_for_midi(&mut midi_remote, &mut midi, |event| {
            *event == MidiEvent::note_off(0, 62)
        })
        .await,
        "expected the shutdown note-off, got {midi:?}"
    );

    runner.await.unwrap().unwrap();
    assert_eq!(handle.status(), HarpStatus::Stopped);

    // the controller went dark and into standby
    let mut rest = Vec::new();
    loop {
        let mut frame = [0u8; 4];
        match tokio::time::timeout(Duration::from_millis(100), ipc_remote.read_exact(&mut frame))
            .await
        {
            Ok(Ok(_)) => rest.push(frame),
            _ => break,
        }
    }
    assert!(rest.contains(&[0x83, 0x01, 0x05, 0x03]), "flip animation missing: {rest:02x?}");
    assert!(rest.contains(&[0x81, 0x00, 0x00, 0x00]));
    assert_eq!(rest.last(), Some(&[0xf2, 0x64, 0x05, 0x00]));

    let _ = std::fs::remove_file(calibration_path);
}

#[tokio::test(start_paused = true)]
async fn fresh_calibration_runs_on_first_start() {
    logging_init("harp_pipeline");

    let mut config = test_config();
    config.calibrator.num_base_frames = 2;
    config.calibrator.base_interval = 0.01;
    config.calibrator.num_beam_frames = 2;
    config.calibrator.settle = 0.01;

    // no document on disk yet: the runtime must calibrate before playing
    // and persist what it found
    let calibration_path =
        std::env::temp_dir().join(format!("harp-fresh-{}.json", std::process::id()));
    let _ = std::fs::remove_file(&calibration_path);
    config.calibration_path = Some(calibration_path.clone());
    let required = config.required_config();

    let expected = test_calibration();
    let lines: Vec<(f32, f32)> = expected
        .x0
        .iter()
        .zip(expected.m.iter())
        .map(|(x0, m)| (*x0, *m))
        .collect();

    let camera = EmulatedCamera::new(&config.camera);
    let (midi_local, _midi_remote) = tokio::io::duplex(4096);
    let (ipc_local, ipc_remote) = tokio::io::duplex(4096);
    tokio::spawn(EmulatedController::new(camera.scene(), lines).run(ipc_remote));

    let harp = LaserHarp::new(config, camera, midi_local, ipc_local).unwrap();
    let handle = harp.handle();
    let runner = tokio::spawn(harp.run());

    // the document appearing on disk marks the calibration as done
    let persisted = tokio::time::timeout(Duration::from_secs(60), async {
        while !calibration_path.exists() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await;
    assert!(persisted.is_ok(), "startup calibration never finished");

    handle.stop().await;
    let result = tokio::time::timeout(Duration::from_secs(60), runner)
        .await
        .expect("the run loop must not wedge")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(handle.status(), HarpStatus::Stopped);

    // what went to disk is the geometry the emulator drew
    let calibration = CalibrationDocument::load(&calibration_path, &required).unwrap();
    assert_eq!(calibration.len(), 3);
    for beam in 0..3 {
        assert!((calibration.x0[beam] - expected.x0[beam]).abs() < 1.0);
        assert!((calibration.m[beam] - expected.m[beam]).abs() < 0.01);
    }

    let _ = std::fs::remove_file(calibration_path);
}
