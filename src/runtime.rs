//! Task topology of the running instrument.
//!
//! Three long-lived tasks cooperate: the frame pipeline (this module's run
//! loop: capture, detect, filter, orchestrate), the MIDI ingress reader and
//! the control-link ingress reader. Calibration runs as a transient
//! exclusive phase of the run loop itself, so the producer is parked by
//! construction while the calibrator owns the camera and the diodes.
//!
//! Ingress events never interleave with a mid-frame step: the readers only
//! queue events, and the run loop drains the queue right before each frame.
//! Stop is cooperative. Every blocking await is bounded, the loops observe
//! the stop state between iterations, and shutdown releases all sounding
//! notes, recenters the pitch wheel and (when configured) sends the
//! controller to standby.

use crate::buttons::{self, ButtonAction};
use crate::calibration::{BeamGrid, CalibrationDocument};
use crate::calibrator::Calibrator;
use crate::camera::{Camera, FrameRateCounter};
use crate::config::HarpConfig;
use crate::detector::Detector;
use crate::din_midi::{DinMidiRx, DinMidiTx, MidiEvent, din_midi};
use crate::filter::FilterBank;
use crate::ipc::{IpcRx, ipc_link};
use crate::laser_array::LaserArray;
use crate::orchestrator::{LaserCommand, Orchestrator};
use crate::settings::Settings;
use crate::{Error, Result};
use atomic_enum::atomic_enum;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

/// A stuck camera must not wedge the run loop; a capture that takes longer
/// than this just loops back to the command check.
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(1);

#[atomic_enum]
#[derive(PartialEq)]
pub enum HarpStatus {
    Stopped,
    Starting,
    Running,
    Calibrating,
    Stopping,
}

/// Control requests into the run loop.
enum Command {
    Stop,
    Calibrate,
    Flip,
}

/// Cloneable control surface of a running [`LaserHarp`].
#[derive(Clone)]
pub struct Handle {
    commands: mpsc::Sender<Command>,
    settings: Arc<Settings>,
    status: Arc<AtomicHarpStatus>,
}

impl Handle {
    pub fn status(&self) -> HarpStatus {
        self.status.load(Ordering::Relaxed)
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub async fn stop(&self) {
        let _ = self.commands.send(Command::Stop).await;
    }

    pub async fn calibrate(&self) {
        let _ = self.commands.send(Command::Calibrate).await;
    }

    pub async fn flip(&self) {
        let _ = self.commands.send(Command::Flip).await;
    }
}

pub struct LaserHarp<C, M, L>
where
    C: Camera,
    M: AsyncRead + AsyncWrite + Send + 'static,
    L: AsyncRead + AsyncWrite + Send + 'static,
{
    config: HarpConfig,
    settings: Arc<Settings>,
    status: Arc<AtomicHarpStatus>,

    camera: C,
    midi_tx: DinMidiTx<M>,
    laser_array: LaserArray<L>,
    // reader halves, handed to the ingress tasks when run() starts
    midi_rx: Option<DinMidiRx<M>>,
    ipc_rx: Option<IpcRx<L>>,

    detector: Detector,
    filter: FilterBank,
    orchestrator: Orchestrator,

    commands_tx: mpsc::Sender<Command>,
    commands_rx: mpsc::Receiver<Command>,
}

impl<C, M, L> LaserHarp<C, M, L>
where
    C: Camera,
    M: AsyncRead + AsyncWrite + Send + 'static,
    L: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(config: HarpConfig, camera: C, midi: M, ipc: L) -> Result<Self> {
        let settings = Arc::new(Settings::default());
        let status = Arc::new(AtomicHarpStatus::new(HarpStatus::Stopped));

        let (midi_tx, midi_rx) = din_midi(midi);
        let (ipc_tx, ipc_rx) = ipc_link(ipc);
        let laser_array = LaserArray::new(&config.laser_array, ipc_tx)?;

        let beams = config.laser_array.size;
        let detector = Detector::new(&config.detector, settings.clone())?;
        let filter = FilterBank::new(settings.clone(), config.camera.framerate, beams);
        let orchestrator = Orchestrator::new(settings.clone(), beams);

        let (commands_tx, commands_rx) = mpsc::channel(16);

        Ok(Self {
            config,
            settings,
            status,
            camera,
            midi_tx,
            laser_array,
            midi_rx: Some(midi_rx),
            ipc_rx: Some(ipc_rx),
            detector,
            filter,
            orchestrator,
            commands_tx,
            commands_rx,
        })
    }

    pub fn handle(&self) -> Handle {
        Handle {
            commands: self.commands_tx.clone(),
            settings: self.settings.clone(),
            status: self.status.clone(),
        }
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// Run the instrument until a stop request or a fatal error.
    pub async fn run(mut self) -> Result<()> {
        self.status.store(HarpStatus::Starting, Ordering::Relaxed);
        log::info!("starting up");

        // fade the strings in
        self.laser_array
            .set_all(self.settings.unplucked_brightness(), 0.5)
            .await?;

        // load a stored calibration, or demand a fresh one
        let mut calibration_pending = false;
        if let Some(path) = self.config.calibration_path.clone() {
            match CalibrationDocument::load(&path, &self.config.required_config()) {
                Ok(calibration) => {
                    let grid = Arc::new(BeamGrid::new(&calibration, &self.config.camera));
                    self.detector.set_grid(grid);
                    log::info!("loaded calibration from {}", path.display());
                }
                Err(error) => {
                    log::warn!("stored calibration rejected ({error}), running a fresh one");
                    calibration_pending = true;
                }
            }
        } else {
            calibration_pending = true;
        }

        let (ingress_tx, mut ingress_rx) = mpsc::channel::<MidiEvent>(64);
        let midi_rx = self.midi_rx.take().expect("run() consumes the readers once");
        let ipc_rx = self.ipc_rx.take().expect("run() consumes the readers once");
        let midi_reader = tokio::spawn(midi_ingress(
            midi_rx,
            ingress_tx,
            self.commands_tx.clone(),
            self.status.clone(),
        ));
        let control_reader = tokio::spawn(control_ingress(
            ipc_rx,
            self.config.buttons.clone(),
            self.commands_tx.clone(),
            self.status.clone(),
        ));

        self.status.store(HarpStatus::Running, Ordering::Relaxed);

        let mut run_result: Result<()> = Ok(());
        if calibration_pending {
            // the calibrator retries weak captures on its own; an error here
            // means the camera or a link died under it
            if let Err(error) = self.run_calibration().await {
                log::error!("initial calibration failed: {error}");
                run_result = Err(error);
            }
        }

        if run_result.is_ok() {
            run_result = self.frame_loop(&mut ingress_rx).await;
        }

        self.status.store(HarpStatus::Stopping, Ordering::Relaxed);
        log::info!("shutting down");

        // release everything that is still sounding
        for event in self.orchestrator.all_notes_off() {
            let _ = self.midi_tx.send(event).await;
        }

        // best effort: darken the array and put the controller to sleep
        let _ = self.laser_array.set_all(0, 0.0).await;
        if self.config.send_standby {
            let _ = self.laser_array.standby().await;
        }

        self.status.store(HarpStatus::Stopped, Ordering::Relaxed);
        midi_reader.abort();
        control_reader.abort();

        run_result
    }

    /// The producer: capture, detect, filter, orchestrate, one frame at a
    /// time. Within a frame the stages run strictly in that order and all
    /// MIDI goes out before the next frame is consumed.
    async fn frame_loop(&mut self, ingress_rx: &mut mpsc::Receiver<MidiEvent>) -> Result<()> {
        let mut uncalibrated_logged = false;
        let mut frame_counter = FrameRateCounter::new(Duration::from_secs(5));
        loop {
            // control requests take effect between frames
            let mut stop = false;
            let mut fatal = None;
            while let Ok(command) = self.commands_rx.try_recv() {
                match command {
                    Command::Stop => stop = true,
                    Command::Calibrate => {
                        if let Err(error) = self.run_calibration().await {
                            log::error!("calibration failed: {error}");
                            if is_fatal(&error) {
                                fatal = Some(error);
                                break;
                            }
                        }
                    }
                    Command::Flip => {
                        let output = self.orchestrator.flip();
                        if let Err(error) = self.apply_lasers(output.lasers).await {
                            log::error!("flip failed: {error}");
                            fatal = Some(error);
                            break;
                        }
                    }
                }
            }
            if let Some(error) = fatal {
                break Err(error);
            }
            if stop {
                break Ok(());
            }

            let frame = match tokio::time::timeout(CAPTURE_TIMEOUT, self.camera.capture()).await
            {
                Err(_) => continue,
                Ok(Err(error)) => {
                    log::error!("camera failed: {error}");
                    break Err(Error::CameraUnavailable);
                }
                Ok(Ok(frame)) => frame,
            };
            if let Some(rate) = frame_counter.count_frame() {
                log::debug!("camera delivering {rate:.1} fps");
            }

            // queued ingress events apply before the frame is processed
            while let Ok(event) = ingress_rx.try_recv() {
                self.orchestrator.handle_midi_event(event);
            }

            if self.settings.take_filter_dirty() {
                self.filter.redesign();
            }

            let raw_length = match self.detector.detect(&frame) {
                Ok(raw_length) => raw_length,
                Err(Error::NotCalibrated) => {
                    if !uncalibrated_logged {
                        log::warn!("dropping frames until a calibration is in force");
                        uncalibrated_logged = true;
                    }
                    continue;
                }
                Err(error) => break Err(error),
            };
            uncalibrated_logged = false;

            let sample = self.filter.step(&raw_length);
            let output = self.orchestrator.process(&sample);

            let mut failed = None;
            for event in output.midi {
                if let Err(error) = self.midi_tx.send(event).await {
                    failed = Some(error);
                    break;
                }
            }
            if let Some(error) = failed {
                log::error!("midi egress failed: {error}");
                break Err(error);
            }
            if let Err(error) = self.apply_lasers(output.lasers).await {
                log::error!("laser array failed: {error}");
                break Err(error);
            }
        }
    }

    /// Exclusive calibration phase. The frame loop is parked for the
    /// duration, so the calibrator is the only camera and laser user.
    async fn run_calibration(&mut self) -> Result<()> {
        let previous = self.status.swap(HarpStatus::Calibrating, Ordering::Relaxed);

        let calibrator = Calibrator::new(&self.config);
        let result = calibrator
            .calibrate(&mut self.camera, &mut self.laser_array)
            .await;

        self.status.store(previous, Ordering::Relaxed);

        let calibration = result?;
        let grid = Arc::new(BeamGrid::new(&calibration, &self.config.camera));
        self.detector.set_grid(grid);
        self.filter.reset();

        if let Some(path) = &self.config.calibration_path {
            let document =
                CalibrationDocument::new(calibration, self.config.required_config());
            if let Err(error) = document.save(path) {
                log::error!("failed to persist calibration: {error}");
            }
        }
        Ok(())
    }

    async fn apply_lasers(&mut self, commands: Vec<LaserCommand>) -> Result<()> {
        for command in commands {
            match command {
                LaserCommand::Set { index, brightness } => {
                    self.laser_array.set(index, brightness, 0.0).await?;
                }
                LaserCommand::PlayAnimation {
                    animation,
                    duration,
                    follow,
                } => {
                    self.laser_array
                        .play_animation(animation, duration, follow)
                        .await?;
                }
            }
        }
        Ok(())
    }
}

fn is_fatal(error: &Error) -> bool {
    matches!(
        error,
        Error::CameraUnavailable | Error::LaserArrayUnavailable | Error::MidiUnavailable
    )
}

/// MIDI ingress task: drain the DIN UART into the orchestrator's queue.
async fn midi_ingress<M: AsyncRead + AsyncWrite>(
    mut rx: DinMidiRx<M>,
    ingress: mpsc::Sender<MidiEvent>,
    commands: mpsc::Sender<Command>,
    status: Arc<AtomicHarpStatus>,
) {
    loop {
        match status.load(Ordering::Relaxed) {
            HarpStatus::Stopping | HarpStatus::Stopped => break,
            _ => {}
        }
        match rx.read().await {
            // a quiet line; loop back to the status check
            Ok(None) => {}
            Ok(Some(event)) => {
                if ingress.send(event).await.is_err() {
                    break;
                }
            }
            Err(error) => {
                log::error!("midi ingress failed: {error}");
                let _ = commands.send(Command::Stop).await;
                break;
            }
        }
    }
}

/// Control ingress task: drain the microcontroller link and turn hardware
/// button sequences into run-loop commands.
async fn control_ingress<L: AsyncRead + AsyncWrite>(
    mut rx: IpcRx<L>,
    buttons: crate::config::ButtonsConfig,
    commands: mpsc::Sender<Command>,
    status: Arc<AtomicHarpStatus>,
) {
    loop {
        match status.load(Ordering::Relaxed) {
            HarpStatus::Stopping | HarpStatus::Stopped => break,
            _ => {}
        }
        match rx.read().await {
            Ok(None) => {}
            Ok(Some(pkt)) => {
                let command = match buttons::decode(&buttons, &pkt) {
                    Some(ButtonAction::Calibrate) => Command::Calibrate,
                    Some(ButtonAction::Flip) => Command::Flip,
                    // powering the host machine off is the integrator's
                    // business; the core just shuts down cleanly
                    Some(ButtonAction::Poweroff) => Command::Stop,
                    None => {
                        log::debug!("control frame: {pkt:?}");
                        continue;
                    }
                };
                if commands.send(command).await.is_err() {
                    break;
                }
            }
            Err(error) => {
                log::error!("control ingress failed: {error}");
                let _ = commands.send(Command::Stop).await;
                break;
            }
        }
    }
}
