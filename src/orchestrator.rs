//! Interceptions in, MIDI and brightness feedback out.
//!
//! Once per frame the orchestrator diffs the intercepted-note set against
//! the previous frame and emits the difference: all note-offs first, then
//! note-ons, then a pitch-bend trail derived from the average vibrato. In
//! parallel it tracks three logical ingress channels: brightness overrides,
//! key/mode/octave configuration, and interception emulation.
//!
//! Everything the orchestrator wants the hardware to do comes back as
//! values ([`MidiEvent`]s and [`LaserCommand`]s, in emission order); the
//! runtime owns the links and applies them.

use crate::din_midi::MidiEvent;
use crate::filter::InterceptionSample;
use crate::notes::NoteTable;
use crate::settings::Settings;
use harp_globals::scale::scale_step;
use harp_globals::{
    BRIGHTNESS_MAX, CHANNEL_BRIGHTNESS, CHANNEL_CONFIG, CHANNEL_EMULATE, MIDI_NOTE_COUNT,
    PITCH_BEND_MAX, PITCH_BEND_MIN,
};
use harp_ipc::{Animation, FollowAction};
use std::sync::Arc;

/// MIDI channel all egress messages go out on.
const EGRESS_CHANNEL: u8 = 0;

/// Length reported for an emulated interception at full velocity, meters.
const EMULATE_LENGTH_MAX: f32 = 0.5;

/// Brightness side effects of one frame, applied by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum LaserCommand {
    Set {
        index: usize,
        brightness: u8,
    },
    PlayAnimation {
        animation: Animation,
        duration: f32,
        follow: FollowAction,
    },
}

/// Everything one frame produced, in emission order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FrameOutput {
    pub midi: Vec<MidiEvent>,
    pub lasers: Vec<LaserCommand>,
}

pub struct Orchestrator {
    settings: Arc<Settings>,
    beams: usize,
    note_table: NoteTable,

    velocities: [u8; MIDI_NOTE_COUNT],
    prev_velocities: [u8; MIDI_NOTE_COUNT],
    prev_pitch_bend: i16,

    /// Laser that last answered a brightness override note-on, by note.
    brightness_override_cache: [i8; MIDI_NOTE_COUNT],
    /// Laser that last answered an emulation note-on, by note.
    emulate_override_cache: [i8; MIDI_NOTE_COUNT],

    /// Ingress brightness override per laser, None when released.
    brightness_override: Vec<Option<u8>>,
    /// Emulated interception length per laser, infinity when released.
    emulate_length: Vec<f32>,
}

impl Orchestrator {
    pub fn new(settings: Arc<Settings>, beams: usize) -> Self {
        let mut orchestrator = Self {
            settings,
            beams,
            note_table: NoteTable::new(beams),
            velocities: [0; MIDI_NOTE_COUNT],
            prev_velocities: [0; MIDI_NOTE_COUNT],
            prev_pitch_bend: 0,
            brightness_override_cache: [-1; MIDI_NOTE_COUNT],
            emulate_override_cache: [-1; MIDI_NOTE_COUNT],
            brightness_override: vec![None; beams],
            emulate_length: vec![f32::INFINITY; beams],
        };
        orchestrator.rebuild_note_table();
        orchestrator
    }

    pub fn note_table(&self) -> &NoteTable {
        &self.note_table
    }

    /// Re-derive the note maps from the current key/mode/octave/flipped.
    /// The override caches survive; their entries die with the note-off
    /// that releases them, so a pluck straddling a key change still resolves
    /// to the laser it started on.
    pub fn rebuild_note_table(&mut self) {
        self.note_table.rebuild(
            self.settings.key(),
            self.settings.mode(),
            self.settings.octave(),
            self.settings.flipped(),
        );
    }

    /// Process one filtered frame.
    pub fn process(&mut self, sample: &InterceptionSample) -> FrameOutput {
        debug_assert_eq!(sample.active.len(), self.beams);

        if self.settings.take_note_table_dirty() {
            self.rebuild_note_table();
        }

        // infinity stands in for "not intercepted" so emulated interceptions
        // merge in naturally
        let mut intersection_length = vec![f32::INFINITY; self.beams];
        for i in 0..self.beams {
            if self.emulate_length[i].is_finite() {
                intersection_length[i] = self.emulate_length[i];
            } else if sample.active[i] {
                intersection_length[i] = sample.length[i];
            }
        }

        self.velocities.fill(0);
        for (i, length) in intersection_length.iter().enumerate() {
            if length.is_finite() {
                if let Some(note) = self.note_table.note_of_laser(i) {
                    self.velocities[note as usize] = 127;
                }
            }
        }

        let mut midi = Vec::new();

        // note-offs strictly before note-ons, so a fast re-pluck of the same
        // note cannot invert into on-then-off
        for note in 0..MIDI_NOTE_COUNT {
            if self.prev_velocities[note] > 0 && self.velocities[note] == 0 {
                midi.push(MidiEvent::note_off(EGRESS_CHANNEL, note as u8));
            }
        }
        for note in 0..MIDI_NOTE_COUNT {
            if self.prev_velocities[note] == 0 && self.velocities[note] > 0 {
                midi.push(MidiEvent::note_on(
                    EGRESS_CHANNEL,
                    note as u8,
                    self.velocities[note],
                ));
            }
        }

        // average the vibrato of every intercepted beam into one pitch wheel
        let active_count = sample.active.iter().filter(|a| **a).count();
        let modulation_sum: f32 = sample
            .modulation
            .iter()
            .zip(sample.active.iter())
            .filter(|(_, active)| **active)
            .map(|(m, _)| *m)
            .sum();
        let modulation_avg = modulation_sum / active_count.max(1) as f32;
        let pitch_bend = ((modulation_avg * 8192.0).round() as i32)
            .clamp(PITCH_BEND_MIN as i32, PITCH_BEND_MAX as i32) as i16;
        if pitch_bend != self.prev_pitch_bend {
            midi.push(MidiEvent::pitch_bend(EGRESS_CHANNEL, pitch_bend));
        }

        let mut lasers = Vec::with_capacity(self.beams);
        let unplucked = self.settings.unplucked_brightness();
        let plucked = self.settings.plucked_brightness();
        for i in 0..self.beams {
            let brightness = match self.brightness_override[i] {
                Some(brightness) => brightness,
                None if intersection_length[i].is_finite() => plucked,
                None => unplucked,
            };
            lasers.push(LaserCommand::Set {
                index: i,
                brightness,
            });
        }

        self.prev_velocities = self.velocities;
        self.prev_pitch_bend = pitch_bend;

        FrameOutput { midi, lasers }
    }

    /// Toggle the playing direction. The note table mirrors at the next
    /// frame; the array acknowledges with a short animation.
    pub fn flip(&mut self) -> FrameOutput {
        self.settings.set_flipped(!self.settings.flipped());
        FrameOutput {
            midi: Vec::new(),
            lasers: vec![LaserCommand::PlayAnimation {
                animation: Animation::Flip,
                duration: 0.5,
                follow: FollowAction::Restore,
            }],
        }
    }

    /// Release every sounding note and recenter the pitch wheel. Called on
    /// shutdown and before the producer parks for a calibration.
    pub fn all_notes_off(&mut self) -> Vec<MidiEvent> {
        let mut midi = Vec::new();
        for note in 0..MIDI_NOTE_COUNT {
            if self.prev_velocities[note] > 0 {
                midi.push(MidiEvent::note_off(EGRESS_CHANNEL, note as u8));
            }
        }
        self.prev_velocities.fill(0);
        self.velocities.fill(0);
        if self.prev_pitch_bend != 0 {
            midi.push(MidiEvent::pitch_bend(EGRESS_CHANNEL, 0));
            self.prev_pitch_bend = 0;
        }
        midi
    }

    /// Apply one ingress MIDI event. Runs between frames, never mid-step.
    pub fn handle_midi_event(&mut self, event: MidiEvent) {
        match event.channel() {
            CHANNEL_BRIGHTNESS => self.handle_brightness_event(event),
            CHANNEL_CONFIG => self.handle_config_event(event),
            CHANNEL_EMULATE => self.handle_emulate_event(event),
            channel => {
                log::debug!("ignoring ingress event on channel {channel}");
            }
        }
    }

    fn handle_brightness_event(&mut self, event: MidiEvent) {
        match event {
            MidiEvent::NoteOn {
                note, velocity, ..
            } => {
                let Some(laser) = self.note_table.laser_of_note(note) else {
                    log::debug!("brightness override for unmapped note {note}");
                    return;
                };
                self.brightness_override_cache[note as usize] = laser as i8;
                let brightness = velocity.clamp(
                    self.settings.unplucked_brightness(),
                    BRIGHTNESS_MAX,
                );
                self.brightness_override[laser] = Some(brightness);
            }
            MidiEvent::NoteOff { note, .. } => {
                let laser = resolve_override(
                    &self.brightness_override_cache,
                    &self.note_table,
                    note,
                );
                self.brightness_override_cache[note as usize] = -1;
                let Some(laser) = laser else { return };
                self.brightness_override[laser] = None;
            }
            _ => {}
        }
    }

    fn handle_config_event(&mut self, event: MidiEvent) {
        let MidiEvent::NoteOn { note, .. } = event else {
            return;
        };

        let result = match note {
            0..=11 => self.settings.set_key(note),
            12..=23 => self.settings.set_mode(scale_step(note - 12)),
            24..=33 => self.settings.set_octave(note - 24),
            127 => {
                self.settings.reset_musical();
                self.clear_overrides();
                Ok(())
            }
            _ => {
                log::debug!("ignoring config note {note}");
                Ok(())
            }
        };
        if let Err(error) = result {
            log::warn!("config event rejected: {error}");
        }
    }

    fn handle_emulate_event(&mut self, event: MidiEvent) {
        match event {
            MidiEvent::NoteOn {
                note, velocity, ..
            } => {
                let Some(laser) = self.note_table.laser_of_note(note) else {
                    log::debug!("emulated interception for unmapped note {note}");
                    return;
                };
                self.emulate_override_cache[note as usize] = laser as i8;
                self.emulate_length[laser] =
                    (velocity as f32 * 0.01).min(EMULATE_LENGTH_MAX);
            }
            MidiEvent::NoteOff { note, .. } => {
                let laser =
                    resolve_override(&self.emulate_override_cache, &self.note_table, note);
                self.emulate_override_cache[note as usize] = -1;
                let Some(laser) = laser else { return };
                self.emulate_length[laser] = f32::INFINITY;
            }
            _ => {}
        }
    }

    fn clear_overrides(&mut self) {
        self.brightness_override_cache.fill(-1);
        self.emulate_override_cache.fill(-1);
        self.brightness_override.fill(None);
        self.emulate_length.fill(f32::INFINITY);
    }
}

/// Note-off routing: prefer the laser cached at note-on time, so a release
/// still lands after a key/mode change remapped the note.
fn resolve_override(
    cache: &[i8; MIDI_NOTE_COUNT],
    table: &NoteTable,
    note: u8,
) -> Option<usize> {
    let cached = cache[note as usize];
    if cached >= 0 {
        return Some(cached as usize);
    }
    table.laser_of_note(note)
}
