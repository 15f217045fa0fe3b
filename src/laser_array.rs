//! Brightness state of the diode array.
//!
//! Owns the sending half of the control link. Brightness writes are deduped
//! against the mirrored state so per-frame feedback does not flood the
//! UART. A state stack lets the calibrator take the array over and restore
//! whatever was showing before, byte for byte.

use crate::config::LaserArrayConfig;
use crate::ipc::IpcTx;
use crate::{Error, Result};
use harp_globals::{BRIGHTNESS_MAX, BROADCAST_INDEX};
use harp_ipc::packet::IpcPkt;
use harp_ipc::{Animation, FollowAction};
use tokio::io::{AsyncRead, AsyncWrite};

pub struct LaserArray<S> {
    tx: IpcTx<S>,
    state: Vec<u8>,
    translation_table: Option<Vec<u8>>,
    state_stack: Vec<Vec<u8>>,
}

impl<S: AsyncRead + AsyncWrite> LaserArray<S> {
    pub fn new(config: &LaserArrayConfig, tx: IpcTx<S>) -> Result<Self> {
        if let Some(table) = &config.translation_table {
            if table.len() != config.size {
                return Err(Error::Argument(
                    "translation table must have one entry per laser",
                ));
            }
        }
        Ok(Self {
            tx,
            state: vec![0; config.size],
            translation_table: config.translation_table.clone(),
            state_stack: Vec::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Mirrored brightness of every laser.
    pub fn state(&self) -> &[u8] {
        &self.state
    }

    pub fn brightness(&self, index: usize) -> Option<u8> {
        self.state.get(index).copied()
    }

    /// Set one laser, optionally fading over `fade` seconds. No-op when the
    /// laser already shows that brightness.
    pub async fn set(&mut self, index: usize, brightness: u8, fade: f32) -> Result<()> {
        if index >= self.state.len() {
            return Err(Error::Argument("laser index out of range"));
        }
        if brightness > BRIGHTNESS_MAX {
            return Err(Error::Argument("brightness must be within 0..128"));
        }
        if self.state[index] == brightness {
            return Ok(());
        }
        self.state[index] = brightness;

        // the wire index may differ from the logical one
        let wire_index = match &self.translation_table {
            Some(table) => table[index],
            None => index as u8,
        };
        debug_assert_ne!(wire_index, BROADCAST_INDEX);
        self.tx.send(IpcPkt::set_single(wire_index, brightness, fade)).await
    }

    /// Set every laser in one frame.
    pub async fn set_all(&mut self, brightness: u8, fade: f32) -> Result<()> {
        if brightness > BRIGHTNESS_MAX {
            return Err(Error::Argument("brightness must be within 0..128"));
        }
        self.state.fill(brightness);
        self.tx.send(IpcPkt::set_all(brightness, fade)).await
    }

    /// Remember the current brightness state.
    pub fn push_state(&mut self) {
        self.state_stack.push(self.state.clone());
    }

    /// Restore the most recently pushed state, laser by laser.
    pub async fn pop_state(&mut self) -> Result<()> {
        let state = self
            .state_stack
            .pop()
            .ok_or(Error::Argument("laser state stack is empty"))?;
        for (index, brightness) in state.into_iter().enumerate() {
            self.set(index, brightness, 0.0).await?;
        }
        Ok(())
    }

    pub async fn play_animation(
        &mut self,
        animation: Animation,
        duration: f32,
        follow: FollowAction,
    ) -> Result<()> {
        self.tx
            .send(IpcPkt::play_animation(animation, duration, follow))
            .await
    }

    pub async fn stop_animation(&mut self) -> Result<()> {
        self.tx.send(IpcPkt::stop_animation()).await
    }

    /// Put the controller into standby. Best effort on shutdown.
    pub async fn standby(&mut self) -> Result<()> {
        self.tx.send(IpcPkt::standby()).await
    }
}
