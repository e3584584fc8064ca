//! Synthetic image fixtures shared by the integration tests

#![allow(dead_code)]

use bgcutout::{Mask, PixelBuffer};

pub const WHITE: [u8; 4] = [255, 255, 255, 255];
pub const BLUE: [u8; 4] = [0, 0, 255, 255];
pub const RED: [u8; 4] = [255, 0, 0, 255];

/// `size` x `size` image of `background` with a centered `inner` x `inner` square of `subject`
pub fn framed(size: u32, inner: u32, background: [u8; 4], subject: [u8; 4]) -> PixelBuffer {
    PixelBuffer::from_fn(size, size, |x, y| {
        if in_subject(size, inner, x, y) {
            subject
        } else {
            background
        }
    })
    .unwrap()
}

/// Whether `(x, y)` lies in the centered square of [`framed`]
pub fn in_subject(size: u32, inner: u32, x: u32, y: u32) -> bool {
    let start = (size - inner) / 2;
    (start..start + inner).contains(&x) && (start..start + inner).contains(&y)
}

/// The 50x50 white frame with a 20x20 blue center
pub fn uniform_scene() -> PixelBuffer {
    framed(50, 20, WHITE, BLUE)
}

/// Busy image without a clean background: gradients, stripes and a warm blob
pub fn textured(width: u32, height: u32) -> PixelBuffer {
    PixelBuffer::from_fn(width, height, |x, y| {
        let stripe = ((x / 4 + y / 3) % 5) as u8;
        let dx = x as i32 - width as i32 / 2;
        let dy = y as i32 - height as i32 / 2;
        if dx * dx + dy * dy < (width.min(height) as i32 / 4).pow(2) {
            [220, 120 + stripe * 10, 40, 255]
        } else {
            [
                (x * 255 / width.max(1)) as u8,
                stripe * 50,
                (y * 255 / height.max(1)) as u8,
                255,
            ]
        }
    })
    .unwrap()
}

/// Every value finite and inside [0,1]
pub fn assert_unit_range(mask: &Mask) {
    assert!(
        mask.as_slice()
            .iter()
            .all(|v| v.is_finite() && (0.0..=1.0).contains(v)),
        "mask values out of range"
    );
}

/// RGB untouched between `before` and `after`
pub fn assert_rgb_preserved(before: &PixelBuffer, after: &PixelBuffer) {
    assert_eq!(before.dimensions(), after.dimensions());
    for (a, b) in before
        .as_raw()
        .chunks_exact(4)
        .zip(after.as_raw().chunks_exact(4))
    {
        assert_eq!(a[..3], b[..3]);
    }
}
