//! Typed view over a four-byte control frame.
//!
//! ```text
//!                              Frame
//!                      ----------------------
//!
//! +================+=========================================================+
//! |  Byte offset   |                       Description                       |
//! +================+=========================================================+
//! |        0       | Command byte (see the IPC_CMD_* values)                 |
//! +----------------+---------------------------------------------------------+
//! |        1       | First argument                                          |
//! +----------------+---------------------------------------------------------+
//! |        2       | Second argument                                         |
//! +----------------+---------------------------------------------------------+
//! |        3       | Third argument. Set to 0x00 when unused.                |
//! +----------------+---------------------------------------------------------+
//! ```
//!
//! Requests and replies share the layout; a reply echoes the command byte of
//! the request it answers. Durations on the wire are tenths of a second,
//! saturated at 25.5 s.

use crate::{
    Animation, FollowAction, IPC_CMD_BUTTON, IPC_CMD_PLAY_ANIMATION, IPC_CMD_QUERY_BRIGHTNESS,
    IPC_CMD_REBOOT, IPC_CMD_SET_ALL, IPC_CMD_SET_SINGLE, IPC_CMD_STANDBY, IPC_CMD_STOP_ANIMATION,
    IPC_CMD_VERSION, IPC_STANDBY_ARGS,
};
use harp_globals::{Error, Result, SemanticVersion};
use std::fmt::{Debug, Display, Formatter};

/// Every frame on the control link is exactly this long.
pub const IPC_PKT_LEN: usize = 4;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct IpcPkt {
    buf: [u8; IPC_PKT_LEN],
}

impl IpcPkt {
    pub const IDX_CMD: usize = 0;
    pub const IDX_ARG0: usize = 1;
    pub const IDX_ARG1: usize = 2;
    pub const IDX_ARG2: usize = 3;

    pub fn new(cmd: u8, arg0: u8, arg1: u8, arg2: u8) -> Self {
        Self {
            buf: [cmd, arg0, arg1, arg2],
        }
    }

    /// `0x80 idx brightness fade_tenths`
    pub fn set_single(index: u8, brightness: u8, fade: f32) -> Self {
        Self::new(IPC_CMD_SET_SINGLE, index, brightness, fade_tenths(fade))
    }

    /// `0x81 brightness fade_tenths 0x00`
    pub fn set_all(brightness: u8, fade: f32) -> Self {
        Self::new(IPC_CMD_SET_ALL, brightness, fade_tenths(fade), 0x00)
    }

    /// `0x82 idx 0x00 0x00`
    pub fn query_brightness(index: u8) -> Self {
        Self::new(IPC_CMD_QUERY_BRIGHTNESS, index, 0x00, 0x00)
    }

    /// `0x82 idx brightness 0x00` (controller -> host)
    pub fn brightness_reply(index: u8, brightness: u8) -> Self {
        Self::new(IPC_CMD_QUERY_BRIGHTNESS, index, brightness, 0x00)
    }

    /// `0x83 animation_id duration_tenths follow_action`
    pub fn play_animation(animation: Animation, duration: f32, follow: FollowAction) -> Self {
        Self::new(
            IPC_CMD_PLAY_ANIMATION,
            animation as u8,
            fade_tenths(duration),
            follow as u8,
        )
    }

    /// `0x84 0x00 0x00 0x00`
    pub fn stop_animation() -> Self {
        Self::new(IPC_CMD_STOP_ANIMATION, 0x00, 0x00, 0x00)
    }

    /// `0xF0 0x00 0x00 0x00`
    pub fn version_request() -> Self {
        Self::new(IPC_CMD_VERSION, 0x00, 0x00, 0x00)
    }

    /// `0xF0 major minor 0x00` (controller -> host)
    pub fn version_reply(version: SemanticVersion) -> Self {
        Self::new(IPC_CMD_VERSION, version.major, version.minor, 0x00)
    }

    /// `0xF1 0x00 0x00 0x00`
    pub fn reboot() -> Self {
        Self::new(IPC_CMD_REBOOT, 0x00, 0x00, 0x00)
    }

    /// `0xF2 0x64 0x05 0x00`
    pub fn standby() -> Self {
        Self::new(
            IPC_CMD_STANDBY,
            IPC_STANDBY_ARGS[0],
            IPC_STANDBY_ARGS[1],
            0x00,
        )
    }

    /// `0x90 seq0 seq1 seq2` (controller -> host). Sequences shorter than
    /// three presses are NUL padded.
    pub fn button(sequence: &str) -> Result<Self> {
        let bytes = sequence.as_bytes();
        if bytes.len() > 3 || !sequence.is_ascii() {
            return Err(Error::Argument("button sequence must be up to 3 ascii bytes"));
        }
        let mut pkt = Self::new(IPC_CMD_BUTTON, 0x00, 0x00, 0x00);
        pkt.buf[Self::IDX_ARG0..Self::IDX_ARG0 + bytes.len()].copy_from_slice(bytes);
        Ok(pkt)
    }

    /// The press sequence of a `0x90` frame, NUL padding stripped.
    pub fn button_sequence(&self) -> Result<String> {
        if self.cmd() != IPC_CMD_BUTTON {
            return Err(Error::Invalid);
        }
        let raw: Vec<u8> = self.buf[Self::IDX_ARG0..]
            .iter()
            .copied()
            .take_while(|b| *b != 0x00)
            .collect();
        String::from_utf8(raw)
            .map(|s| s.to_ascii_lowercase())
            .map_err(|_| Error::Invalid)
    }

    pub fn cmd(&self) -> u8 {
        self.buf[Self::IDX_CMD]
    }
    pub fn arg0(&self) -> u8 {
        self.buf[Self::IDX_ARG0]
    }
    pub fn arg1(&self) -> u8 {
        self.buf[Self::IDX_ARG1]
    }
    pub fn arg2(&self) -> u8 {
        self.buf[Self::IDX_ARG2]
    }

    pub fn set_cmd(&mut self, cmd: u8) -> &mut Self {
        self.buf[Self::IDX_CMD] = cmd;
        self
    }
    pub fn set_arg0(&mut self, arg: u8) -> &mut Self {
        self.buf[Self::IDX_ARG0] = arg;
        self
    }
    pub fn set_arg1(&mut self, arg: u8) -> &mut Self {
        self.buf[Self::IDX_ARG1] = arg;
        self
    }
    pub fn set_arg2(&mut self, arg: u8) -> &mut Self {
        self.buf[Self::IDX_ARG2] = arg;
        self
    }

    /// Version carried by a `0xF0` reply.
    pub fn version(&self) -> Result<SemanticVersion> {
        if self.cmd() != IPC_CMD_VERSION {
            return Err(Error::Invalid);
        }
        Ok(SemanticVersion {
            major: self.arg0(),
            minor: self.arg1(),
        })
    }

    pub fn as_bytes(&self) -> &[u8; IPC_PKT_LEN] {
        &self.buf
    }
}

/// Encode a duration in seconds as wire tenths, saturating at 255.
pub fn fade_tenths(duration: f32) -> u8 {
    (duration * 10.0).clamp(0.0, 255.0) as u8
}

impl From<[u8; IPC_PKT_LEN]> for IpcPkt {
    fn from(buf: [u8; IPC_PKT_LEN]) -> Self {
        Self { buf }
    }
}

impl From<IpcPkt> for [u8; IPC_PKT_LEN] {
    fn from(pkt: IpcPkt) -> Self {
        pkt.buf
    }
}

impl TryFrom<&[u8]> for IpcPkt {
    type Error = Error;
    fn try_from(value: &[u8]) -> Result<Self> {
        let buf: [u8; IPC_PKT_LEN] = value.try_into().map_err(|_| Error::Truncated {
            actual: value.len(),
            expected: IPC_PKT_LEN,
        })?;
        Ok(Self { buf })
    }
}

impl Debug for IpcPkt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let cmd = match self.cmd() {
            IPC_CMD_SET_SINGLE => "SET_SINGLE",
            IPC_CMD_SET_ALL => "SET_ALL",
            IPC_CMD_QUERY_BRIGHTNESS => "QUERY_BRIGHTNESS",
            IPC_CMD_PLAY_ANIMATION => "PLAY_ANIMATION",
            IPC_CMD_STOP_ANIMATION => "STOP_ANIMATION",
            IPC_CMD_VERSION => "VERSION",
            IPC_CMD_REBOOT => "REBOOT",
            IPC_CMD_STANDBY => "STANDBY",
            IPC_CMD_BUTTON => "BUTTON",
            _ => "UNKNOWN",
        };
        f.debug_struct("IpcPkt")
            .field("cmd", &String::from(cmd))
            .field("arg0", &format_args!("{:#04x}", self.arg0()))
            .field("arg1", &format_args!("{:#04x}", self.arg1()))
            .field("arg2", &format_args!("{:#04x}", self.arg2()))
            .finish()
    }
}

impl Display for IpcPkt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        for elem in self.buf.iter() {
            f.write_fmt(format_args!("{elem:02x} "))?;
        }
        f.write_str("]")?;
        Ok(())
    }
}
