//! Per-frame interception detection.
//!
//! One pass over the precomputed sampling grid: blur the frame, walk each
//! beam's sample column, take the brightest row. A beam reports its metric
//! length when that maximum clears the luminance threshold and the length
//! lies within the configured bounds, and NaN ("absent") otherwise.

use crate::calibration::BeamGrid;
use crate::camera::Frame;
use crate::config::DetectorConfig;
use crate::image::gaussian_blur;
use crate::settings::Settings;
use crate::{Error, Result};
use std::sync::Arc;

pub struct Detector {
    settings: Arc<Settings>,
    preblur: u32,
    grid: Option<Arc<BeamGrid>>,
}

impl Detector {
    pub fn new(config: &DetectorConfig, settings: Arc<Settings>) -> Result<Self> {
        if config.preblur % 2 == 0 {
            return Err(Error::Argument("preblur kernel size must be odd"));
        }
        Ok(Self {
            settings,
            preblur: config.preblur,
            grid: None,
        })
    }

    /// Put a new calibration's grid in force. Replaces the previous grid
    /// atomically from the detector's point of view.
    pub fn set_grid(&mut self, grid: Arc<BeamGrid>) {
        self.grid = Some(grid);
    }

    pub fn is_calibrated(&self) -> bool {
        self.grid.is_some()
    }

    /// Raw per-beam length in meters, NaN where the beam is not intercepted.
    ///
    /// Ties between equally bright rows resolve to the smallest row, i.e.
    /// the interception closest to the diode.
    pub fn detect(&self, frame: &Frame) -> Result<Vec<f32>> {
        let grid = self.grid.as_ref().ok_or(Error::NotCalibrated)?;
        if grid.rows() == 0 {
            return Ok(vec![f32::NAN; grid.beams()]);
        }

        let blurred = gaussian_blur(frame, self.preblur);

        let threshold = self.settings.threshold();
        let length_min = self.settings.length_min();
        let length_max = self.settings.length_max();

        let mut raw_length = Vec::with_capacity(grid.beams());
        for beam in 0..grid.beams() {
            let mut strength = 0u8;
            let mut position = 0usize;
            for row in 0..grid.rows() {
                let x = grid.x_sample(row, beam);
                let y = grid.y_start() + row as u32;
                let brightness = blurred.get(x, y);
                if brightness > strength {
                    strength = brightness;
                    position = row;
                }
            }

            let length = grid.y_metric(position);
            let valid =
                strength >= threshold && length >= length_min && length <= length_max;
            raw_length.push(if valid { length } else { f32::NAN });
        }

        Ok(raw_length)
    }
}
