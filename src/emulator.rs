//! Emulated laser-array controller board.
//!
//! Stands in for the microcontroller on the far end of the control link
//! during development and in the test suite. It applies brightness frames
//! to an internal diode state, renders the lit beams into an emulated
//! camera scene, and answers the query and version inquiries the way the
//! firmware does.

use crate::camera::emulated::SceneHandle;
use crate::ipc::{IpcTx, ipc_link};
use harp_globals::SemanticVersion;
use harp_ipc::packet::IpcPkt;
use harp_ipc::{
    IPC_CMD_PLAY_ANIMATION, IPC_CMD_QUERY_BRIGHTNESS, IPC_CMD_REBOOT, IPC_CMD_SET_ALL,
    IPC_CMD_SET_SINGLE, IPC_CMD_STANDBY, IPC_CMD_STOP_ANIMATION, IPC_CMD_VERSION,
};
use tokio::io::{AsyncRead, AsyncWrite};

/// Firmware version the emulator reports.
pub const EMULATOR_VERSION: SemanticVersion = SemanticVersion { major: 1, minor: 0 };

pub struct EmulatedController {
    scene: SceneHandle,
    /// Beam path per diode, as the line `x = x0 + m*y`.
    lines: Vec<(f32, f32)>,
    state: Vec<u8>,
}

impl EmulatedController {
    pub fn new(scene: SceneHandle, lines: Vec<(f32, f32)>) -> Self {
        let state = vec![0; lines.len()];
        Self {
            scene,
            lines,
            state,
        }
    }

    /// Serve the far end of a control-link stream until it closes.
    pub async fn run<S: AsyncRead + AsyncWrite>(mut self, stream: S) {
        let (mut tx, mut rx) = ipc_link(stream);
        loop {
            match rx.read().await {
                Ok(Some(pkt)) => {
                    if !self.handle(pkt, &mut tx).await {
                        break;
                    }
                }
                Ok(None) => {}
                Err(_) => break,
            }
        }
    }

    async fn handle<S: AsyncRead + AsyncWrite>(
        &mut self,
        pkt: IpcPkt,
        tx: &mut IpcTx<S>,
    ) -> bool {
        match pkt.cmd() {
            IPC_CMD_SET_SINGLE => {
                let index = pkt.arg0() as usize;
                if index < self.state.len() {
                    self.state[index] = pkt.arg1();
                } else if pkt.arg0() == harp_globals::BROADCAST_INDEX {
                    self.state.fill(pkt.arg1());
                }
                self.render();
            }
            IPC_CMD_SET_ALL => {
                self.state.fill(pkt.arg0());
                self.render();
            }
            IPC_CMD_QUERY_BRIGHTNESS => {
                let index = pkt.arg0() as usize;
                let brightness = self.state.get(index).copied().unwrap_or(0);
                let reply = IpcPkt::brightness_reply(pkt.arg0(), brightness);
                if tx.send(reply).await.is_err() {
                    return false;
                }
            }
            IPC_CMD_PLAY_ANIMATION | IPC_CMD_STOP_ANIMATION => {
                log::debug!("emulator: animation frame {pkt:?}");
            }
            IPC_CMD_VERSION => {
                if tx.send(IpcPkt::version_reply(EMULATOR_VERSION)).await.is_err() {
                    return false;
                }
            }
            IPC_CMD_REBOOT => {
                log::info!("emulator: reboot");
                self.state.fill(0);
                self.render();
            }
            IPC_CMD_STANDBY => {
                log::info!("emulator: standby");
            }
            _ => {
                log::warn!("emulator: unknown frame {pkt}");
            }
        }
        true
    }

    /// Redraw every lit beam into the scene. Full brightness maps to a near
    /// saturated pixel so the calibrator's difference images stay strong.
    /// A controller with no beams wired up leaves the scene alone.
    fn render(&self) {
        if self.lines.is_empty() {
            return;
        }
        let state = self.state.clone();
        let lines = self.lines.clone();
        self.scene.draw(move |frame| {
            frame.fill(0);
            for (i, (x0, m)) in lines.iter().enumerate() {
                if state[i] > 0 {
                    let value = (state[i] as u32 * 2).min(255) as u8;
                    frame.draw_beam(*x0, *m, value);
                }
            }
        });
    }
}
