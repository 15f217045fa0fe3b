//! The note table: which MIDI note each laser plays.
//!
//! Lasers are diatonic steps. The table walks the steps from the configured
//! octave upwards, mapping each step through the key-rotated major scale,
//! and keeps the reverse map so ingress messages addressed by note can find
//! their laser. Flipping mirrors the assignment so the player's leftmost
//! beam carries the lowest note either way round.

use harp_globals::scale::rotated_scale;

/// Marker for an unmapped entry in either direction.
pub const UNMAPPED: i8 = -1;

pub struct NoteTable {
    note_of_laser: Vec<i8>,
    laser_of_note: [i8; harp_globals::MIDI_NOTE_COUNT],
}

impl NoteTable {
    pub fn new(beams: usize) -> Self {
        Self {
            note_of_laser: vec![UNMAPPED; beams],
            laser_of_note: [UNMAPPED; harp_globals::MIDI_NOTE_COUNT],
        }
    }

    pub fn beams(&self) -> usize {
        self.note_of_laser.len()
    }

    pub fn rebuild(&mut self, key: u8, mode: u8, octave: u8, flipped: bool) {
        self.note_of_laser.fill(UNMAPPED);
        self.laser_of_note.fill(UNMAPPED);

        let scale = rotated_scale(key);
        let beams = self.note_of_laser.len();

        for i in 0..beams {
            let step = i + mode as usize;
            let octave_offset = step / 7;
            let s = step % 7;

            let note = (octave as i32 + octave_offset as i32) * 12 + scale[s] as i32;
            if note <= 0 || note > 127 {
                continue;
            }

            let j = if flipped { beams - 1 - i } else { i };
            self.note_of_laser[j] = note as i8;
            self.laser_of_note[note as usize] = j as i8;
        }
    }

    pub fn note_of_laser(&self, laser: usize) -> Option<u8> {
        match self.note_of_laser.get(laser) {
            Some(&note) if note >= 0 => Some(note as u8),
            _ => None,
        }
    }

    pub fn laser_of_note(&self, note: u8) -> Option<usize> {
        match self.laser_of_note.get(note as usize) {
            Some(&laser) if laser >= 0 => Some(laser as usize),
            _ => None,
        }
    }
}
