//! Hardware button handling.
//!
//! The controller board carries a single button and reports press sequences
//! over the control link as `0x90` frames ("s" short, "l" long, "ll" two
//! long presses, and so on). Which sequence triggers which action is
//! configurable; unknown sequences are logged and ignored.

use crate::config::ButtonsConfig;
use harp_ipc::IPC_CMD_BUTTON;
use harp_ipc::packet::IpcPkt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAction {
    Calibrate,
    Flip,
    Poweroff,
}

/// Resolve a control-link frame to a configured button action.
pub fn decode(config: &ButtonsConfig, pkt: &IpcPkt) -> Option<ButtonAction> {
    if pkt.cmd() != IPC_CMD_BUTTON {
        return None;
    }

    let sequence = match pkt.button_sequence() {
        Ok(sequence) => sequence,
        Err(_) => {
            log::warn!("undecodable button frame {pkt}");
            return None;
        }
    };

    match config.sequences.get(&sequence) {
        Some(action) => {
            log::debug!("button sequence {sequence:?} -> {action:?}");
            Some(*action)
        }
        None => {
            log::warn!("button message for unregistered sequence {sequence:?}");
            None
        }
    }
}
