mod common;

use crate::common::*;

use laserharp_rs::camera::{Frame, FrameRateCounter};
use laserharp_rs::image::{gaussian_blur, gaussian_kernel, max_combine, subtract_clip};
use std::time::Duration;

#[test]
fn kernel_is_normalized_and_symmetric() {
    logging_init("harp_image");

    for ksize in [3u32, 5, 11, 23] {
        let kernel = gaussian_kernel(ksize);
        assert_eq!(kernel.len(), ksize as usize);

        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);

        for i in 0..kernel.len() / 2 {
            assert!((kernel[i] - kernel[kernel.len() - 1 - i]).abs() < 1e-6);
        }

        // the center tap dominates
        let center = kernel[ksize as usize / 2];
        assert!(kernel.iter().all(|k| *k <= center));
    }
}

#[test]
fn blur_preserves_flat_frames() {
    logging_init("harp_image");

    let mut frame = Frame::new(64, 48);
    frame.fill(200);

    let blurred = gaussian_blur(&frame, 11);
    for y in 0..48 {
        for x in 0..64 {
            let value = blurred.get(x, y) as i32;
            assert!((value - 200).abs() <= 1, "({x},{y}) = {value}");
        }
    }
}

#[test]
fn blur_keeps_the_peak_where_it_was() {
    logging_init("harp_image");

    let mut frame = Frame::new(64, 64);
    frame.draw_blob(32, 20, 4, 255);

    let blurred = gaussian_blur(&frame, 9);
    let mut best = (0u32, 0u32, 0u8);
    for y in 0..64 {
        for x in 0..64 {
            if blurred.get(x, y) > best.2 {
                best = (x, y, blurred.get(x, y));
            }
        }
    }
    assert_eq!((best.0, best.1), (32, 20));
    assert!(best.2 > 100);
}

#[test]
fn tiny_kernels_are_a_no_op() {
    logging_init("harp_image");

    let mut frame = Frame::new(16, 16);
    frame.draw_blob(8, 8, 2, 255);
    assert_eq!(gaussian_blur(&frame, 1), frame);
}

#[test]
fn max_combine_and_subtract() {
    logging_init("harp_image");

    let mut a = Frame::new(8, 8);
    a.draw_blob(2, 2, 1, 100);
    let mut b = Frame::new(8, 8);
    b.draw_blob(5, 5, 1, 50);

    let mut combined = a.clone();
    max_combine(&mut combined, &b);
    assert_eq!(combined.get(2, 2), 100);
    assert_eq!(combined.get(5, 5), 50);

    // subtracting the first image leaves only the second blob
    let difference = subtract_clip(&combined, &a);
    assert_eq!(difference.get(2, 2), 0);
    assert_eq!(difference.get(5, 5), 50);
}

#[test]
fn luminance_plane_from_yuv420() {
    logging_init("harp_image");

    let (width, height) = (4u32, 2u32);
    let luminance: Vec<u8> = (0..8).collect();
    let mut buffer = luminance.clone();
    buffer.extend_from_slice(&[0xCC; 4]); // chroma planes, ignored

    let frame = Frame::from_yuv420(width, height, &buffer).unwrap();
    assert_eq!(frame.get(0, 0), 0);
    assert_eq!(frame.get(3, 1), 7);
    assert_eq!(frame.as_slice(), &luminance[..]);

    assert!(Frame::from_yuv420(width, height, &luminance).is_err());
}

#[test]
fn frame_counter_accumulates() {
    logging_init("harp_image");

    let mut counter = FrameRateCounter::new(Duration::ZERO);
    assert_eq!(counter.frame_count(), 0);

    // with a zero interval every frame refreshes the rate
    assert!(counter.count_frame().is_some());
    assert!(counter.count_frame().is_some());
    assert_eq!(counter.frame_count(), 2);
    assert!(counter.frame_rate() >= 0.0);
}
