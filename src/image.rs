//! Grayscale image operations for the detector and the calibrator.
//!
//! Just enough of an image pipeline for this instrument: a separable
//! Gaussian blur and the max-combine / background-subtract steps the
//! calibrator builds its difference images from.

use crate::camera::Frame;

/// 1D Gaussian kernel of odd length, normalized to sum 1. Sigma follows the
/// same size heuristic OpenCV uses when none is given.
pub fn gaussian_kernel(ksize: u32) -> Vec<f32> {
    let sigma = 0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (ksize / 2) as i32;

    let mut kernel: Vec<f32> = (0..ksize as i32)
        .map(|i| {
            let d = (i - center) as f32;
            (-d * d / (2.0 * sigma * sigma)).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    for k in kernel.iter_mut() {
        *k /= sum;
    }
    kernel
}

/// Blur a frame with a `ksize` x `ksize` Gaussian. `ksize` must be odd.
/// Borders replicate the edge pixel.
pub fn gaussian_blur(frame: &Frame, ksize: u32) -> Frame {
    if ksize < 3 {
        return frame.clone();
    }

    let kernel = gaussian_kernel(ksize);
    let center = (ksize / 2) as i32;
    let width = frame.width() as i32;
    let height = frame.height() as i32;

    // horizontal pass into floats, vertical pass back to bytes
    let mut horizontal = vec![0.0f32; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (i, k) in kernel.iter().enumerate() {
                let xi = (x + i as i32 - center).clamp(0, width - 1);
                acc += k * frame.get(xi as u32, y as u32) as f32;
            }
            horizontal[(y * width + x) as usize] = acc;
        }
    }

    let mut out = Frame::new(frame.width(), frame.height());
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (i, k) in kernel.iter().enumerate() {
                let yi = (y + i as i32 - center).clamp(0, height - 1);
                acc += k * horizontal[(yi * width + x) as usize];
            }
            out.set(x as u32, y as u32, acc.round().clamp(0.0, 255.0) as u8);
        }
    }
    out
}

/// Fold `frame` into `acc` by per-pixel maximum.
pub fn max_combine(acc: &mut Frame, frame: &Frame) {
    debug_assert_eq!(acc.width(), frame.width());
    debug_assert_eq!(acc.height(), frame.height());
    for y in 0..acc.height() {
        for x in 0..acc.width() {
            let value = acc.get(x, y).max(frame.get(x, y));
            acc.set(x, y, value);
        }
    }
}

/// Per-pixel `a - b`, clipped at zero.
pub fn subtract_clip(a: &Frame, b: &Frame) -> Frame {
    debug_assert_eq!(a.width(), b.width());
    debug_assert_eq!(a.height(), b.height());
    let mut out = Frame::new(a.width(), a.height());
    for y in 0..a.height() {
        for x in 0..a.width() {
            out.set(x, y, a.get(x, y).saturating_sub(b.get(x, y)));
        }
    }
    out
}
