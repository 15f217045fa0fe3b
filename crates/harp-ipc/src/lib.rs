//! Host <-> laser-array controller packet format.
//!
//! The controller board listens on a UART (115200 8N1) for fixed-size
//! four-byte frames. The first byte selects the command, the remaining three
//! carry its arguments; unused argument bytes are set to zero. Replies reuse
//! the command byte of the request.

pub mod packet;

use harp_globals::Error;

/// Set a single laser: `0x80 idx brightness fade_tenths`.
pub const IPC_CMD_SET_SINGLE: u8 = 0x80;
/// Set every laser at once: `0x81 brightness fade_tenths 0x00`.
pub const IPC_CMD_SET_ALL: u8 = 0x81;
/// Query a laser's brightness: `0x82 idx 0x00 0x00`, reply `0x82 idx brightness 0x00`.
pub const IPC_CMD_QUERY_BRIGHTNESS: u8 = 0x82;
/// Play an animation: `0x83 animation_id duration_tenths follow_action`.
pub const IPC_CMD_PLAY_ANIMATION: u8 = 0x83;
/// Stop the running animation: `0x84 0x00 0x00 0x00`.
pub const IPC_CMD_STOP_ANIMATION: u8 = 0x84;
/// Version inquiry: `0xF0 0x00 0x00 0x00`, reply `0xF0 major minor 0x00`.
pub const IPC_CMD_VERSION: u8 = 0xF0;
/// Reboot the controller: `0xF1 0x00 0x00 0x00`.
pub const IPC_CMD_REBOOT: u8 = 0xF1;
/// Put the controller into standby: `0xF2 0x64 0x05 0x00`.
pub const IPC_CMD_STANDBY: u8 = 0xF2;
/// Hardware button press (controller -> host): `0x90 seq0 seq1 seq2`, the
/// press sequence as ASCII, NUL padded (e.g. `"s"`, `"ll"`).
pub const IPC_CMD_BUTTON: u8 = 0x90;

/// Magic argument bytes of the standby command. The controller ignores a
/// standby frame that does not carry them.
pub const IPC_STANDBY_ARGS: [u8; 2] = [0x64, 0x05];

/// Animations baked into the controller firmware.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Animation {
    Boot = 0,
    Flip = 1,
    Test = 2,
}

impl TryFrom<u8> for Animation {
    type Error = Error;
    fn try_from(value: u8) -> harp_globals::Result<Self> {
        match value {
            0 => Ok(Animation::Boot),
            1 => Ok(Animation::Flip),
            2 => Ok(Animation::Test),
            _ => {
                log::error!("unknown animation id {value}");
                Err(Error::Invalid)
            }
        }
    }
}

/// What the controller does once an animation has played through.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowAction {
    /// Start the animation over.
    Loop = 0,
    /// Keep showing the animation's last frame.
    Freeze = 1,
    /// Turn all diodes off.
    Off = 2,
    /// Restore the brightness state from before the animation.
    Restore = 3,
}

impl TryFrom<u8> for FollowAction {
    type Error = Error;
    fn try_from(value: u8) -> harp_globals::Result<Self> {
        match value {
            0 => Ok(FollowAction::Loop),
            1 => Ok(FollowAction::Freeze),
            2 => Ok(FollowAction::Off),
            3 => Ok(FollowAction::Restore),
            _ => {
                log::error!("unknown follow action {value}");
                Err(Error::Invalid)
            }
        }
    }
}
