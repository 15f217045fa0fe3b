//! DIN MIDI UART link.
//!
//! Egress writes raw three-byte short messages, one status byte per message
//! (no running status), flushed before the frame loop continues. Ingress
//! reads short messages with a per-byte timeout and drops anything
//! malformed. The actual UART is any async byte stream; opening the device
//! node and configuring 31250 Bd is the caller's business.

use crate::{Error, Result};
use harp_globals::{PITCH_BEND_MAX, PITCH_BEND_MIN};
use midly::live::LiveEvent;
use midly::num::{u4, u7, u14};
use midly::MidiMessage;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

/// Follow-up data bytes must arrive within this window once a status byte
/// has been seen.
const BYTE_TIMEOUT: Duration = Duration::from_millis(30);

/// A short MIDI message, the only kind this instrument speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    PitchBend { channel: u8, bend: i16 },
}

impl MidiEvent {
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::NoteOn {
            channel,
            note,
            velocity,
        }
    }

    pub fn note_off(channel: u8, note: u8) -> Self {
        Self::NoteOff { channel, note }
    }

    pub fn pitch_bend(channel: u8, bend: i16) -> Self {
        Self::PitchBend { channel, bend }
    }

    pub fn channel(&self) -> u8 {
        match self {
            Self::NoteOn { channel, .. }
            | Self::NoteOff { channel, .. }
            | Self::PitchBend { channel, .. } => *channel,
        }
    }

    fn to_live(self) -> LiveEvent<'static> {
        match self {
            Self::NoteOn {
                channel,
                note,
                velocity,
            } => LiveEvent::Midi {
                channel: u4::new(channel),
                message: MidiMessage::NoteOn {
                    key: u7::new(note),
                    vel: u7::new(velocity),
                },
            },
            Self::NoteOff { channel, note } => LiveEvent::Midi {
                channel: u4::new(channel),
                message: MidiMessage::NoteOff {
                    key: u7::new(note),
                    vel: u7::new(0),
                },
            },
            Self::PitchBend { channel, bend } => {
                let wire = (bend.clamp(PITCH_BEND_MIN, PITCH_BEND_MAX) + 8192) as u16;
                LiveEvent::Midi {
                    channel: u4::new(channel),
                    message: MidiMessage::PitchBend {
                        bend: midly::PitchBend(u14::new(wire)),
                    },
                }
            }
        }
    }

    /// Wire form of the message, always three bytes.
    pub fn to_bytes(self) -> [u8; 3] {
        let mut buf = Vec::with_capacity(3);
        // writing a short message into a Vec cannot fail
        self.to_live().write_std(&mut buf).unwrap();
        [buf[0], buf[1], buf[2]]
    }

    /// Decode a three-byte short message. A note-on with velocity zero comes
    /// back as the note-off it means.
    pub fn parse(bytes: &[u8; 3]) -> Result<Self> {
        let event = LiveEvent::parse(bytes).map_err(|_| Error::InvalidMidi)?;
        let LiveEvent::Midi { channel, message } = event else {
            return Err(Error::InvalidMidi);
        };
        let channel = channel.as_int();

        match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => Ok(Self::NoteOff {
                channel,
                note: key.as_int(),
            }),
            MidiMessage::NoteOn { key, vel } => Ok(Self::NoteOn {
                channel,
                note: key.as_int(),
                velocity: vel.as_int(),
            }),
            MidiMessage::NoteOff { key, .. } => Ok(Self::NoteOff {
                channel,
                note: key.as_int(),
            }),
            MidiMessage::PitchBend { bend } => Ok(Self::PitchBend {
                channel,
                bend: bend.0.as_int() as i16 - 8192,
            }),
            _ => Err(Error::InvalidMidi),
        }
    }
}

/// Split a byte stream into the two halves of the DIN link.
pub fn din_midi<S: AsyncRead + AsyncWrite>(stream: S) -> (DinMidiTx<S>, DinMidiRx<S>) {
    let (reader, writer) = tokio::io::split(stream);
    (
        DinMidiTx { writer },
        DinMidiRx {
            reader,
            timeout: harp_globals::TIMEOUT,
        },
    )
}

pub struct DinMidiTx<S> {
    writer: WriteHalf<S>,
}

impl<S: AsyncRead + AsyncWrite> DinMidiTx<S> {
    pub async fn send(&mut self, event: MidiEvent) -> Result<()> {
        let data = event.to_bytes();
        log::debug!("RPI -> DIN: {:02x} {:02x} {:02x}", data[0], data[1], data[2]);
        self.writer
            .write_all(&data)
            .await
            .map_err(|_| Error::MidiUnavailable)?;
        self.writer.flush().await.map_err(|_| Error::MidiUnavailable)?;
        Ok(())
    }
}

pub struct DinMidiRx<S> {
    reader: ReadHalf<S>,
    timeout: Duration,
}

impl<S: AsyncRead + AsyncWrite> DinMidiRx<S> {
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Read one short message. `Ok(None)` on a quiet line or after dropping
    /// a malformed message; `Err(MidiUnavailable)` once the stream is gone.
    pub async fn read(&mut self) -> Result<Option<MidiEvent>> {
        let mut status = [0u8; 1];
        match tokio::time::timeout(self.timeout, self.reader.read_exact(&mut status)).await {
            Err(_) => return Ok(None),
            Ok(Err(_)) => return Err(Error::MidiUnavailable),
            Ok(Ok(_)) => {}
        }

        let status = status[0];
        if !(0x80..0xF0).contains(&status) {
            log::warn!("invalid/unsupported status byte: {status:#04x}");
            return Ok(None);
        }

        let mut data = [0u8; 2];
        match tokio::time::timeout(BYTE_TIMEOUT, self.reader.read_exact(&mut data)).await {
            Err(_) => {
                log::warn!("timeout while reading MIDI message");
                return Ok(None);
            }
            Ok(Err(_)) => return Err(Error::MidiUnavailable),
            Ok(Ok(_)) => {}
        }

        log::debug!("DIN -> RPI: {status:02x} {:02x} {:02x}", data[0], data[1]);
        match MidiEvent::parse(&[status, data[0], data[1]]) {
            Ok(event) => Ok(Some(event)),
            Err(_) => {
                log::warn!("dropping unsupported MIDI message");
                Ok(None)
            }
        }
    }
}
