//! Temporal filtering of raw beam lengths.
//!
//! Each beam runs through a tapped FIR low-pass. The low-frequency output is
//! the beam length a note is derived from; the residual between the raw
//! length and that output is the player's vibrato, reported as modulation in
//! [-1, 1]. NaN marks an absent interception and doubles as the tap reset
//! sentinel: a rising edge primes every tap with the first raw sample, so a
//! fresh pluck starts clean instead of ramping up from stale state.

use crate::settings::Settings;
use std::sync::Arc;

/// Filtered view of one frame's interceptions.
#[derive(Debug, Clone, PartialEq)]
pub struct InterceptionSample {
    pub active: Vec<bool>,
    /// Smoothed metric length, NaN where inactive.
    pub length: Vec<f32>,
    /// Vibrato residual in [-1, 1], zero where inactive.
    pub modulation: Vec<f32>,
}

impl InterceptionSample {
    pub fn empty(beams: usize) -> Self {
        Self {
            active: vec![false; beams],
            length: vec![f32::NAN; beams],
            modulation: vec![0.0; beams],
        }
    }
}

pub struct FilterBank {
    settings: Arc<Settings>,
    f_sampling: f32,
    beams: usize,
    coeff: Vec<f32>,
    /// Tap-major ring: `taps[k * beams + i]` is tap `k` of beam `i`.
    taps: Vec<f32>,
    was_active: Vec<bool>,
    /// Seconds since each beam's rising edge, zero while inactive.
    active_duration: Vec<f32>,
}

impl FilterBank {
    pub fn new(settings: Arc<Settings>, f_sampling: f32, beams: usize) -> Self {
        let coeff = design_coefficients(
            settings.filter_size(),
            settings.filter_cutoff(),
            f_sampling,
        );
        let taps = vec![0.0; coeff.len() * beams];
        Self {
            settings,
            f_sampling,
            beams,
            coeff,
            taps,
            was_active: vec![false; beams],
            active_duration: vec![0.0; beams],
        }
    }

    /// Number of taps per beam.
    pub fn size(&self) -> usize {
        self.coeff.len()
    }

    /// Drop all temporal state. Called when a new calibration takes effect.
    pub fn reset(&mut self) {
        self.taps.fill(0.0);
        self.was_active.fill(false);
        self.active_duration.fill(0.0);
    }

    /// Re-derive the coefficients from the current settings and start over.
    pub fn redesign(&mut self) {
        self.coeff = design_coefficients(
            self.settings.filter_size(),
            self.settings.filter_cutoff(),
            self.f_sampling,
        );
        self.taps = vec![0.0; self.coeff.len() * self.beams];
        self.was_active.fill(false);
        self.active_duration.fill(0.0);
    }

    pub fn step(&mut self, raw_length: &[f32]) -> InterceptionSample {
        debug_assert_eq!(raw_length.len(), self.beams);
        let beams = self.beams;
        let size = self.coeff.len();

        let active: Vec<bool> = raw_length.iter().map(|l| l.is_finite()).collect();
        let rising: Vec<bool> = active
            .iter()
            .zip(self.was_active.iter())
            .map(|(now, was)| *now && !*was)
            .collect();

        for i in 0..beams {
            self.active_duration[i] = if active[i] {
                self.active_duration[i] + 1.0 / self.f_sampling
            } else {
                0.0
            };
        }

        // shift the ring by one and insert the new raw sample at tap 0
        self.taps.copy_within(0..(size - 1) * beams, beams);
        self.taps[..beams].copy_from_slice(raw_length);

        for i in 0..beams {
            if !active[i] {
                // flush, so a partial window never mixes in stale samples
                for k in 0..size {
                    self.taps[k * beams + i] = f32::NAN;
                }
            } else if rising[i] {
                // prime the whole window with the first sample of the pluck
                for k in 0..size {
                    self.taps[k * beams + i] = raw_length[i];
                }
            }
        }

        let modulation_gain = self.settings.modulation_gain();
        let modulation_delay = self.settings.modulation_delay();

        let mut length = Vec::with_capacity(beams);
        let mut modulation = Vec::with_capacity(beams);
        for i in 0..beams {
            let mut sum = 0.0;
            for (k, c) in self.coeff.iter().enumerate() {
                let tap = self.taps[k * beams + i];
                if tap.is_finite() {
                    sum += c * tap;
                }
            }
            let smoothed = if active[i] { sum } else { f32::NAN };
            length.push(smoothed);

            let mut m = if active[i] {
                (modulation_gain * (raw_length[i] - smoothed)).tanh()
            } else {
                0.0
            };
            // fade the vibrato in once the interception has settled
            m *= 0.5 + 0.5 * (10.0 * (self.active_duration[i] - modulation_delay)).tanh();
            modulation.push(m);
        }

        self.was_active.copy_from_slice(&active);

        InterceptionSample {
            active,
            length,
            modulation,
        }
    }
}

/// Blackman-windowed sinc low-pass, normalized to unity DC gain. `size` must
/// be odd so the filter delay lands on a whole frame.
pub fn design_coefficients(size: usize, cutoff: f32, f_sampling: f32) -> Vec<f32> {
    if size <= 1 {
        return vec![1.0];
    }

    let center = (size - 1) as f32 / 2.0;
    let mut coeff: Vec<f32> = (0..size)
        .map(|k| {
            let x = 2.0 * cutoff / f_sampling * (k as f32 - center);
            sinc(x) * blackman(k, size)
        })
        .collect();

    let sum: f32 = coeff.iter().sum();
    for c in coeff.iter_mut() {
        *c /= sum;
    }
    coeff
}

/// Normalized sinc, `sin(pi x) / (pi x)`.
fn sinc(x: f32) -> f32 {
    if x.abs() < 1e-6 {
        1.0
    } else {
        let px = std::f32::consts::PI * x;
        px.sin() / px
    }
}

fn blackman(k: usize, size: usize) -> f32 {
    let phase = 2.0 * std::f32::consts::PI * k as f32 / (size - 1) as f32;
    0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
}
