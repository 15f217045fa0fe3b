//! Geometric calibration routine.
//!
//! With the room dark apart from the diodes themselves, each beam's path is
//! recovered by differencing: capture a base image with every laser off,
//! then light one diode at a time and fit a line through the bright column
//! of the difference image. The camera's mounting geometry pins the 0 and
//! 90 degree elevation rows; together with the per-beam lines that is the
//! whole [`Calibration`].
//!
//! A capture that fails its coverage or slope gate is retried on the same
//! beam, indefinitely, without advancing; only a dead camera or control
//! link aborts the routine.

use crate::calibration::{Calibration, MAX_BEAM_SLOPE};
use crate::camera::{Camera, Frame};
use crate::config::{CalibratorConfig, CameraConfig, DetectorConfig, HarpConfig};
use crate::image::{gaussian_blur, max_combine, subtract_clip};
use crate::laser_array::LaserArray;
use crate::Result;
use harp_globals::BRIGHTNESS_MAX;
use std::f32::consts::FRAC_PI_2;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

/// Why a captured beam image was rejected. Local to the retry loop, never
/// propagated.
enum FitRejection {
    CoverageTooLow,
    SlopeTooSteep,
}

pub struct Calibrator {
    camera_config: CameraConfig,
    detector_config: DetectorConfig,
    config: CalibratorConfig,
    beams: usize,
}

impl Calibrator {
    pub fn new(config: &HarpConfig) -> Self {
        Self {
            camera_config: config.camera.clone(),
            detector_config: config.detector.clone(),
            config: config.calibrator.clone(),
            beams: config.laser_array.size,
        }
    }

    /// Run the full routine. The laser state found on entry is restored
    /// byte for byte before returning, successful or not.
    pub async fn calibrate<C, S>(
        &self,
        camera: &mut C,
        lasers: &mut LaserArray<S>,
    ) -> Result<Calibration>
    where
        C: Camera,
        S: AsyncRead + AsyncWrite,
    {
        log::info!("starting calibration");
        lasers.push_state();

        let result = self.calibrate_inner(camera, lasers).await;

        // best-effort restore; the routine's own outcome is what counts
        if let Err(error) = lasers.set_all(0, 0.0).await {
            log::warn!("failed to clear the array after calibration: {error}");
        }
        if let Err(error) = lasers.pop_state().await {
            log::warn!("failed to restore the laser state: {error}");
        }

        match &result {
            Ok(_) => log::info!("calibration complete"),
            Err(error) => log::warn!("calibration failed: {error}"),
        }
        result
    }

    async fn calibrate_inner<C, S>(
        &self,
        camera: &mut C,
        lasers: &mut LaserArray<S>,
    ) -> Result<Calibration>
    where
        C: Camera,
        S: AsyncRead + AsyncWrite,
    {
        let height = self.camera_config.height() as f32;

        // pin the 0 and 90 degree elevation angles to pixel rows
        let fov_y = self.camera_config.fov_y();
        let mount_angle = self.camera_config.mount_angle.to_radians();
        let camera_bottom = FRAC_PI_2 - mount_angle - fov_y / 2.0;
        let ya = -camera_bottom / fov_y * height;
        let yb = (FRAC_PI_2 - camera_bottom) / fov_y * height;

        log::info!("capturing base image");
        lasers.set_all(0, 0.0).await?;
        let base = self
            .combined_capture(
                camera,
                self.config.num_base_frames,
                Duration::from_secs_f32(self.config.base_interval),
            )
            .await?;

        let mut x0 = Vec::with_capacity(self.beams);
        let mut m = Vec::with_capacity(self.beams);

        for beam in 0..self.beams {
            log::info!("capturing laser {beam}");
            lasers.set(beam, BRIGHTNESS_MAX, 0.0).await?;

            let mut combined = Frame::new(base.width(), base.height());
            let (beam_m, beam_x0) = loop {
                let capture = self
                    .combined_capture(camera, self.config.num_beam_frames, Duration::ZERO)
                    .await?;
                max_combine(&mut combined, &subtract_clip(&capture, &base));

                match self.fit_line(&combined) {
                    Ok(fit) => break fit,
                    Err(FitRejection::CoverageTooLow) => {
                        log::warn!("beam too weak, retrying");
                    }
                    Err(FitRejection::SlopeTooSteep) => {
                        log::warn!("beam gradient too high, retrying");
                    }
                }
            };

            x0.push(beam_x0);
            m.push(beam_m);

            lasers.set(beam, 0, 0.0).await?;
            tokio::time::sleep(Duration::from_secs_f32(self.config.settle)).await;
        }

        Calibration::new(ya, yb, x0, m)
    }

    /// Max-combine `count` captures, `interval` apart.
    async fn combined_capture<C: Camera>(
        &self,
        camera: &mut C,
        count: u32,
        interval: Duration,
    ) -> Result<Frame> {
        let mut result = camera.capture().await?;
        for _ in 1..count {
            if !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
            max_combine(&mut result, &camera.capture().await?);
        }
        Ok(result)
    }

    /// Weighted least-squares fit of `col = m*row + x0` through the
    /// brightest column of each row. Rows dimmer than `threshold` times the
    /// image maximum carry no weight; beams are near vertical, hence the
    /// swapped fit axes.
    fn fit_line(&self, image: &Frame) -> std::result::Result<(f32, f32), FitRejection> {
        let blurred = gaussian_blur(image, self.detector_config.preblur);

        let height = blurred.height();
        let mut row_max = Vec::with_capacity(height as usize);
        let mut row_argmax = Vec::with_capacity(height as usize);
        for y in 0..height {
            let row = blurred.row(y);
            let mut best = 0u8;
            let mut best_x = 0usize;
            for (x, value) in row.iter().enumerate() {
                if *value > best {
                    best = *value;
                    best_x = x;
                }
            }
            row_max.push(best);
            row_argmax.push(best_x);
        }

        let global_max = row_max.iter().copied().max().unwrap_or(0);
        let cutoff = self.config.threshold * global_max as f32;

        // weighted sums for the closed-form least squares solution
        let mut n = 0.0f64;
        let mut sum_r = 0.0f64;
        let mut sum_c = 0.0f64;
        let mut sum_rr = 0.0f64;
        let mut sum_rc = 0.0f64;
        for y in 0..height as usize {
            if row_max[y] as f32 > cutoff && row_max[y] > 0 {
                let row = y as f64;
                let col = row_argmax[y] as f64;
                n += 1.0;
                sum_r += row;
                sum_c += col;
                sum_rr += row * row;
                sum_rc += row * col;
            }
        }

        if n / (height as f64) < self.config.min_coverage as f64 {
            return Err(FitRejection::CoverageTooLow);
        }

        let denominator = n * sum_rr - sum_r * sum_r;
        if denominator.abs() < f64::EPSILON {
            return Err(FitRejection::CoverageTooLow);
        }
        let slope = (n * sum_rc - sum_r * sum_c) / denominator;
        let offset = (sum_c - slope * sum_r) / n;

        if slope.abs() > MAX_BEAM_SLOPE as f64 {
            return Err(FitRejection::SlopeTooSteep);
        }

        Ok((slope as f32, offset as f32))
    }
}
