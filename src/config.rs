//! Static configuration of one harp build.
//!
//! Everything in here describes the physical build (optics, geometry, diode
//! count, wiring) and is fixed for the lifetime of the process. Operator
//! adjustable values live in [`crate::settings`] instead.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Frame size in pixels, width first.
    pub resolution: [u32; 2],
    /// Nominal frame rate in Hz. Also the sampling rate of the filter bank.
    pub framerate: f32,
    /// Field of view in degrees, horizontal first.
    pub fov: [f32; 2],
    /// Angle between the camera's optical axis and the laser plane, degrees.
    pub mount_angle: f32,
    /// Distance between the camera and the diode row, meters.
    pub mount_distance: f32,
    /// Sensor rotation in degrees. Only 0 and 180 are supported.
    pub rotation: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            resolution: [640, 480],
            framerate: 60.0,
            fov: [62.2, 48.8],
            mount_angle: 30.0,
            mount_distance: 0.2,
            rotation: 0,
        }
    }
}

impl CameraConfig {
    pub fn width(&self) -> u32 {
        self.resolution[0]
    }

    pub fn height(&self) -> u32 {
        self.resolution[1]
    }

    /// Vertical field of view in radians.
    pub fn fov_y(&self) -> f32 {
        self.fov[1].to_radians()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaserArrayConfig {
    /// Number of diodes.
    pub size: usize,
    /// Optional remap from logical beam index to physical diode index,
    /// applied right before a frame goes out on the control link.
    pub translation_table: Option<Vec<u8>>,
}

impl Default for LaserArrayConfig {
    fn default() -> Self {
        Self {
            size: 16,
            translation_table: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Gaussian blur kernel size applied to each frame before sampling. Odd.
    pub preblur: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self { preblur: 23 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratorConfig {
    /// Frames max-combined into the base image.
    pub num_base_frames: u32,
    /// Pause between base image captures, seconds.
    pub base_interval: f32,
    /// Frames max-combined per beam capture.
    pub num_beam_frames: u32,
    /// Row weight cutoff, relative to the brightest row of the difference
    /// image.
    pub threshold: f32,
    /// Minimum fraction of rows that must clear the cutoff before a line is
    /// fitted.
    pub min_coverage: f32,
    /// Pause after switching a beam off, seconds.
    pub settle: f32,
}

impl Default for CalibratorConfig {
    fn default() -> Self {
        Self {
            num_base_frames: 10,
            base_interval: 0.1,
            num_beam_frames: 30,
            threshold: 0.5,
            min_coverage: 0.4,
            settle: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonsConfig {
    /// Press sequence -> action, lowercase ("s" short, "l" long, ...).
    pub sequences: std::collections::HashMap<String, crate::buttons::ButtonAction>,
}

impl Default for ButtonsConfig {
    fn default() -> Self {
        use crate::buttons::ButtonAction;
        let sequences = [
            ("s".to_string(), ButtonAction::Flip),
            ("l".to_string(), ButtonAction::Calibrate),
            ("lll".to_string(), ButtonAction::Poweroff),
        ]
        .into_iter()
        .collect();
        Self { sequences }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HarpConfig {
    pub camera: CameraConfig,
    pub laser_array: LaserArrayConfig,
    pub detector: DetectorConfig,
    pub calibrator: CalibratorConfig,
    pub buttons: ButtonsConfig,
    /// Where the calibration document lives. None keeps it in memory only,
    /// forcing a fresh calibration on every start.
    pub calibration_path: Option<std::path::PathBuf>,
    /// Issue the controller standby command when the harp stops.
    pub send_standby: bool,
}

impl HarpConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    /// The subset of the configuration a calibration depends on. A persisted
    /// calibration is only accepted when this matches the live value.
    pub fn required_config(&self) -> RequiredConfig {
        RequiredConfig {
            fov: self.camera.fov,
            mount_angle: self.camera.mount_angle,
            mount_distance: self.camera.mount_distance,
            resolution: self.camera.resolution,
            rotation: self.camera.rotation,
            size: self.laser_array.size,
            translation_table: self.laser_array.translation_table.clone(),
        }
    }
}

/// Configuration digest stored alongside a calibration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredConfig {
    pub fov: [f32; 2],
    pub mount_angle: f32,
    pub mount_distance: f32,
    pub resolution: [u32; 2],
    pub rotation: u32,
    pub size: usize,
    pub translation_table: Option<Vec<u8>>,
}
