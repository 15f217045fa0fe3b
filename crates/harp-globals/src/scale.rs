//! Diatonic scale math shared by the orchestrator and its tests.
//!
//! The instrument assigns one diatonic step per laser. A "key" rotates the
//! major scale so that the rotated scale still starts on pitch class 0's
//! step; a "mode" offsets the step a laser starts on.

/// Pitch classes of the major scale.
pub const MAJOR_SCALE: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Inverse of [`MAJOR_SCALE`]: chromatic pitch class -> nearest diatonic step
/// at or below it.
pub const MAJOR_SCALE_INV: [u8; 12] = [0, 0, 1, 1, 2, 3, 3, 4, 4, 5, 5, 6];

/// Diatonic step of a chromatic pitch class.
pub fn scale_step(pitch_class: u8) -> u8 {
    MAJOR_SCALE_INV[(pitch_class % 12) as usize]
}

/// Rotate the major scale to `key` (a chromatic pitch class in `0..12`).
///
/// The result maps a diatonic step `s` to a chromatic pitch class such that
/// the scale contains `key` on the step `inv(key)`:
/// `scale[s] = (MAJOR[(s + 7 - inv(key)) % 7] + key) % 12`.
pub fn rotated_scale(key: u8) -> [u8; 7] {
    let key = key % 12;
    let inv = scale_step(key);
    let mut scale = [0u8; 7];
    for (s, out) in scale.iter_mut().enumerate() {
        let idx = (s + 7 - inv as usize) % 7;
        *out = (MAJOR_SCALE[idx] + key) % 12;
    }
    scale
}
