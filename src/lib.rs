//! Control core of a laser-harp musical instrument.
//!
//! An array of upward-pointing laser diodes forms a plane of "strings"; an
//! angled camera watches that plane and detects where a hand intercepts each
//! beam. Interceptions are turned into MIDI note-on/note-off and pitch-bend
//! messages on a DIN MIDI UART. A second UART carries a private four-byte
//! protocol to the microcontroller driving the diodes (see [`harp_ipc`]).
//!
//! ## Usage overview
//!
//! The processing pipeline is plain owning composition: a camera frame goes
//! through the [`detector::Detector`] (per-beam grid lookup), the
//! [`filter::FilterBank`] (low-pass split into beam length and vibrato
//! modulation) and the [`orchestrator::Orchestrator`] (note tracking, pitch
//! bend, laser brightness feedback). [`runtime::LaserHarp`] wires those into
//! the task topology and runs them against the two UARTs and the camera:
//!
//! ```no_run
//! use laserharp_rs::camera::emulated::EmulatedCamera;
//! use laserharp_rs::config::HarpConfig;
//! use laserharp_rs::runtime::LaserHarp;
//!
//! # async fn demo() -> laserharp_rs::Result<()> {
//! let config = HarpConfig::default();
//! let camera = EmulatedCamera::new(&config.camera);
//! let (midi, _midi_remote) = tokio::io::duplex(256);
//! let (ipc, _ipc_remote) = tokio::io::duplex(256);
//!
//! let harp = LaserHarp::new(config, camera, midi, ipc)?;
//! harp.run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Geometry is established once by the [`calibrator::Calibrator`], which
//! lights the diodes one at a time, fits a line per beam to the captured
//! image and produces a [`calibration::Calibration`]. The record is persisted
//! next to a digest of the configuration it was taken under and refused on
//! load when that configuration changed.

pub mod buttons;
pub mod calibration;
pub mod calibrator;
pub mod camera;
pub mod config;
pub mod detector;
pub mod din_midi;
pub mod emulator;
pub mod filter;
pub mod image;
pub mod ipc;
pub mod laser_array;
pub mod notes;
pub mod orchestrator;
pub mod runtime;
pub mod settings;

pub use harp_globals::SemanticVersion;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O error occurred.
    #[error("io")]
    Io(#[from] std::io::Error),
    /// Calibration document could not be encoded or decoded.
    #[error("json")]
    Json(#[from] serde_json::Error),
    /// Control-link protocol error.
    #[error("protocol")]
    Protocol(#[from] harp_globals::Error),
    /// The detector was invoked without a calibration in force.
    #[error("not calibrated")]
    NotCalibrated,
    /// A persisted calibration was taken under a different configuration.
    #[error("config mismatch")]
    ConfigMismatch,
    /// The camera stopped delivering frames.
    #[error("camera unavailable")]
    CameraUnavailable,
    /// The laser-array control link is down.
    #[error("laser array unavailable")]
    LaserArrayUnavailable,
    /// The DIN MIDI link is down.
    #[error("midi unavailable")]
    MidiUnavailable,
    /// A blocking read hit its deadline.
    #[error("read timeout")]
    ReadTimeout,
    /// A malformed MIDI message arrived on the ingress UART.
    #[error("invalid midi")]
    InvalidMidi,
    /// Invalid argument provided.
    #[error("{0}")]
    Argument(&'static str),
    /// Invalid value provided.
    #[error("invalid")]
    Invalid,
}

/// Result type for operations that may return an `Error`.
pub type Result<T> = std::result::Result<T, Error>;
