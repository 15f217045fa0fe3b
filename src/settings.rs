//! Operator-settable state, shared between the frame pipeline and the
//! ingress tasks.
//!
//! Every value is individually atomic. A reader may observe a mix of old and
//! new values across two settings, which is acceptable; what it never sees
//! is a torn single value. Changes that invalidate derived state (the note
//! table, the filter coefficients) additionally raise a dirty flag that the
//! pipeline honors at the next frame boundary instead of mid-step.

use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

/// Store an f32 in an AtomicU32 by bit pattern.
#[inline]
fn f32_to_u32(f: f32) -> u32 {
    f.to_bits()
}

/// Load an f32 back out of an AtomicU32.
#[inline]
fn u32_to_f32(u: u32) -> f32 {
    f32::from_bits(u)
}

pub struct Settings {
    key: AtomicU8,
    mode: AtomicU8,
    octave: AtomicU8,
    flipped: AtomicBool,

    unplucked_brightness: AtomicU8,
    plucked_brightness: AtomicU8,

    threshold: AtomicU8,
    length_min: AtomicU32,
    length_max: AtomicU32,

    filter_size: AtomicU32,
    filter_cutoff: AtomicU32,
    modulation_gain: AtomicU32,
    modulation_delay: AtomicU32,

    /// The note table must be rebuilt before the next frame.
    note_table_dirty: AtomicBool,
    /// The filter coefficients must be redesigned before the next frame.
    filter_dirty: AtomicBool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            key: AtomicU8::new(0),
            mode: AtomicU8::new(0),
            octave: AtomicU8::new(4),
            flipped: AtomicBool::new(false),
            unplucked_brightness: AtomicU8::new(10),
            plucked_brightness: AtomicU8::new(127),
            threshold: AtomicU8::new(10),
            length_min: AtomicU32::new(f32_to_u32(0.05)),
            length_max: AtomicU32::new(f32_to_u32(2.0)),
            filter_size: AtomicU32::new(23),
            filter_cutoff: AtomicU32::new(f32_to_u32(6.0)),
            modulation_gain: AtomicU32::new(f32_to_u32(15.0)),
            modulation_delay: AtomicU32::new(f32_to_u32(0.5)),
            // both start dirty so the pipeline derives its state on frame one
            note_table_dirty: AtomicBool::new(true),
            filter_dirty: AtomicBool::new(true),
        }
    }
}

impl Settings {
    pub fn key(&self) -> u8 {
        self.key.load(Ordering::Relaxed)
    }

    pub fn set_key(&self, key: u8) -> Result<()> {
        if key > 11 {
            return Err(Error::Argument("key must be within 0..12"));
        }
        self.key.store(key, Ordering::Relaxed);
        self.note_table_dirty.store(true, Ordering::Relaxed);
        Ok(())
    }

    pub fn mode(&self) -> u8 {
        self.mode.load(Ordering::Relaxed)
    }

    pub fn set_mode(&self, mode: u8) -> Result<()> {
        if mode > 6 {
            return Err(Error::Argument("mode must be within 0..7"));
        }
        self.mode.store(mode, Ordering::Relaxed);
        self.note_table_dirty.store(true, Ordering::Relaxed);
        Ok(())
    }

    pub fn octave(&self) -> u8 {
        self.octave.load(Ordering::Relaxed)
    }

    pub fn set_octave(&self, octave: u8) -> Result<()> {
        if octave > 9 {
            return Err(Error::Argument("octave must be within 0..10"));
        }
        self.octave.store(octave, Ordering::Relaxed);
        self.note_table_dirty.store(true, Ordering::Relaxed);
        Ok(())
    }

    pub fn flipped(&self) -> bool {
        self.flipped.load(Ordering::Relaxed)
    }

    pub fn set_flipped(&self, flipped: bool) {
        self.flipped.store(flipped, Ordering::Relaxed);
        self.note_table_dirty.store(true, Ordering::Relaxed);
    }

    pub fn unplucked_brightness(&self) -> u8 {
        self.unplucked_brightness.load(Ordering::Relaxed)
    }

    pub fn set_unplucked_brightness(&self, brightness: u8) -> Result<()> {
        if brightness > harp_globals::BRIGHTNESS_MAX {
            return Err(Error::Argument("brightness must be within 0..128"));
        }
        self.unplucked_brightness.store(brightness, Ordering::Relaxed);
        Ok(())
    }

    pub fn plucked_brightness(&self) -> u8 {
        self.plucked_brightness.load(Ordering::Relaxed)
    }

    pub fn set_plucked_brightness(&self, brightness: u8) -> Result<()> {
        if brightness > harp_globals::BRIGHTNESS_MAX {
            return Err(Error::Argument("brightness must be within 0..128"));
        }
        self.plucked_brightness.store(brightness, Ordering::Relaxed);
        Ok(())
    }

    pub fn threshold(&self) -> u8 {
        self.threshold.load(Ordering::Relaxed)
    }

    pub fn set_threshold(&self, threshold: u8) {
        self.threshold.store(threshold, Ordering::Relaxed);
    }

    pub fn length_min(&self) -> f32 {
        u32_to_f32(self.length_min.load(Ordering::Relaxed))
    }

    pub fn set_length_min(&self, length: f32) {
        self.length_min.store(f32_to_u32(length), Ordering::Relaxed);
    }

    pub fn length_max(&self) -> f32 {
        u32_to_f32(self.length_max.load(Ordering::Relaxed))
    }

    pub fn set_length_max(&self, length: f32) {
        self.length_max.store(f32_to_u32(length), Ordering::Relaxed);
    }

    pub fn filter_size(&self) -> usize {
        self.filter_size.load(Ordering::Relaxed) as usize
    }

    pub fn set_filter_size(&self, size: usize) -> Result<()> {
        if size == 0 || size % 2 == 0 {
            return Err(Error::Argument("filter size must be odd"));
        }
        self.filter_size.store(size as u32, Ordering::Relaxed);
        self.filter_dirty.store(true, Ordering::Relaxed);
        Ok(())
    }

    pub fn filter_cutoff(&self) -> f32 {
        u32_to_f32(self.filter_cutoff.load(Ordering::Relaxed))
    }

    pub fn set_filter_cutoff(&self, cutoff: f32) -> Result<()> {
        if cutoff <= 0.0 {
            return Err(Error::Argument("filter cutoff must be positive"));
        }
        self.filter_cutoff.store(f32_to_u32(cutoff), Ordering::Relaxed);
        self.filter_dirty.store(true, Ordering::Relaxed);
        Ok(())
    }

    pub fn modulation_gain(&self) -> f32 {
        u32_to_f32(self.modulation_gain.load(Ordering::Relaxed))
    }

    pub fn set_modulation_gain(&self, gain: f32) {
        self.modulation_gain.store(f32_to_u32(gain), Ordering::Relaxed);
    }

    pub fn modulation_delay(&self) -> f32 {
        u32_to_f32(self.modulation_delay.load(Ordering::Relaxed))
    }

    pub fn set_modulation_delay(&self, delay: f32) {
        self.modulation_delay.store(f32_to_u32(delay), Ordering::Relaxed);
    }

    /// Reset the musical configuration (ingress config channel, note 127).
    pub fn reset_musical(&self) {
        self.key.store(0, Ordering::Relaxed);
        self.mode.store(0, Ordering::Relaxed);
        self.octave.store(4, Ordering::Relaxed);
        self.note_table_dirty.store(true, Ordering::Relaxed);
    }

    /// Consume the note-table dirty flag. Returns true at most once per
    /// raise.
    pub fn take_note_table_dirty(&self) -> bool {
        self.note_table_dirty.swap(false, Ordering::Relaxed)
    }

    /// Consume the filter dirty flag.
    pub fn take_filter_dirty(&self) -> bool {
        self.filter_dirty.swap(false, Ordering::Relaxed)
    }
}
