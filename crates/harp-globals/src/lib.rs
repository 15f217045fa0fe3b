//! Constants and small shared types used across the laser harp workspace.
//!
//! Everything in here must stay free of I/O and of heavyweight dependencies,
//! as it is pulled in by both the protocol crate and the main crate.

pub mod scale;

use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Baud rate of the DIN MIDI UART (fixed by the MIDI standard).
pub const DIN_MIDI_BAUDRATE: u32 = 31250;

/// Baud rate of the laser-array control UART (8N1).
pub const IPC_BAUDRATE: u32 = 115200;

/// Number of addressable MIDI notes.
pub const MIDI_NOTE_COUNT: usize = 128;

/// Laser index that addresses every diode at once on the control link.
pub const BROADCAST_INDEX: u8 = 127;

/// Maximum brightness value accepted by the laser-array controller.
pub const BRIGHTNESS_MAX: u8 = 127;

/// Logical ingress channel carrying laser brightness overrides.
pub const CHANNEL_BRIGHTNESS: u8 = 0;
/// Logical ingress channel carrying key/mode/octave configuration.
pub const CHANNEL_CONFIG: u8 = 1;
/// Logical ingress channel carrying simulated interceptions.
pub const CHANNEL_EMULATE: u8 = 2;

/// Pitch bend limits of a 14-bit MIDI pitch wheel, centered at zero.
pub const PITCH_BEND_MIN: i16 = -8192;
pub const PITCH_BEND_MAX: i16 = 8191;

/// Default timeout for blocking reads on either UART.
pub const TIMEOUT: Duration = Duration::from_millis(500);

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    /// Invalid value provided.
    #[error("invalid")]
    Invalid,
    /// A frame was shorter than the protocol requires.
    #[error("frame truncated")]
    Truncated {
        /// Actual number of bytes available.
        actual: usize,
        /// Expected number of bytes.
        expected: usize,
    },
    /// Invalid argument provided.
    #[error("{0}")]
    Argument(&'static str),
}

/// Result type for operations that may return an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Firmware version as reported by the laser-array controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemanticVersion {
    pub major: u8,
    pub minor: u8,
}

impl Display for SemanticVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}.{}", self.major, self.minor)
    }
}
