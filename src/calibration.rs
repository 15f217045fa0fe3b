//! Geometric calibration: per-beam line parameters and the sampling grid
//! derived from them.
//!
//! A [`Calibration`] pins the 0 and 90 degree elevation angles to pixel rows
//! (`ya`, `yb`) and stores one line `x = x0 + m*y` per beam. The
//! [`BeamGrid`] precomputes, for every usable pixel row, the metric beam
//! length seen at that row and the column to sample per beam, so the
//! per-frame detector is nothing but table lookups.

use crate::config::{CameraConfig, RequiredConfig};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

/// Steepest per-beam slope accepted at calibration time.
pub const MAX_BEAM_SLOPE: f32 = 0.8;

/// Keeps the elevation angle clear of 90 degrees, where tan() blows up.
const ANGLE_EPSILON: f32 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Pixel row of the 0 degree elevation line.
    pub ya: f32,
    /// Pixel row of the 90 degree elevation line.
    pub yb: f32,
    /// Per-beam line offset.
    pub x0: Vec<f32>,
    /// Per-beam line slope.
    pub m: Vec<f32>,
}

impl Calibration {
    pub fn new(ya: f32, yb: f32, x0: Vec<f32>, m: Vec<f32>) -> Result<Self> {
        if ya >= yb {
            return Err(Error::Argument("ya must lie above yb"));
        }
        if x0.len() != m.len() {
            return Err(Error::Argument("x0 and m must have one entry per beam"));
        }
        Ok(Self { ya, yb, x0, m })
    }

    /// Number of calibrated beams.
    pub fn len(&self) -> usize {
        self.x0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x0.is_empty()
    }
}

/// Persisted form of a calibration: the record plus the digest of the
/// configuration it was taken under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationDocument {
    required_config: RequiredConfig,
    calibration: Calibration,
}

impl CalibrationDocument {
    pub fn new(calibration: Calibration, required_config: RequiredConfig) -> Self {
        Self {
            required_config,
            calibration,
        }
    }

    pub fn save_to(&self, writer: impl Write) -> Result<()> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Load a calibration, refusing it when the stored configuration digest
    /// does not match the live one.
    pub fn load_from(reader: impl Read, live: &RequiredConfig) -> Result<Calibration> {
        let document: CalibrationDocument = serde_json::from_reader(reader)?;
        if &document.required_config != live {
            log::warn!("stored calibration does not match the current configuration");
            return Err(Error::ConfigMismatch);
        }
        Calibration::new(
            document.calibration.ya,
            document.calibration.yb,
            document.calibration.x0,
            document.calibration.m,
        )
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.save_to(std::fs::File::create(path)?)
    }

    pub fn load(path: impl AsRef<Path>, live: &RequiredConfig) -> Result<Calibration> {
        Self::load_from(std::fs::File::open(path)?, live)
    }
}

/// Precomputed sampling grid. Immutable while a calibration is in force.
pub struct BeamGrid {
    y_start: u32,
    rows: usize,
    beams: usize,
    /// Metric beam length seen at each grid row.
    y_metric: Vec<f32>,
    /// Sample column per row and beam, row-major.
    x_sample: Vec<u32>,
}

impl BeamGrid {
    pub fn new(calibration: &Calibration, camera: &CameraConfig) -> Self {
        let width = camera.width();
        let height = camera.height();

        let y_start = calibration.ya.max(0.0).ceil() as u32;
        let y_end = (calibration.yb.min(height as f32).ceil() as u32).max(y_start);
        let rows = (y_end - y_start) as usize;
        let beams = calibration.len();

        let mut y_metric = Vec::with_capacity(rows);
        let mut x_sample = Vec::with_capacity(rows * beams);

        for y in y_start..y_end {
            // map the row to an elevation angle, then to a metric length
            let angle = (y as f32 - calibration.ya) / (calibration.yb - calibration.ya)
                * std::f32::consts::FRAC_PI_2;
            let angle = angle.clamp(0.0, std::f32::consts::FRAC_PI_2 - ANGLE_EPSILON);
            y_metric.push(angle.tan() * camera.mount_distance);

            for beam in 0..beams {
                let x = calibration.x0[beam] + calibration.m[beam] * y as f32;
                x_sample.push(x.round().clamp(0.0, (width - 1) as f32) as u32);
            }
        }

        Self {
            y_start,
            rows,
            beams,
            y_metric,
            x_sample,
        }
    }

    /// First frame row covered by the grid.
    pub fn y_start(&self) -> u32 {
        self.y_start
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn beams(&self) -> usize {
        self.beams
    }

    /// Metric beam length at grid row `row`.
    #[inline]
    pub fn y_metric(&self, row: usize) -> f32 {
        self.y_metric[row]
    }

    /// Frame column to sample for `beam` at grid row `row`. Pre-clamped to
    /// the frame.
    #[inline]
    pub fn x_sample(&self, row: usize, beam: usize) -> u32 {
        self.x_sample[row * self.beams + beam]
    }
}
