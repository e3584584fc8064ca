//! Mask fusion for the hybrid strategy
//!
//! A learned mask is blended with a cheap border-similarity mask so that gross model
//! errors near the image border are damped.

use crate::error::{BgRemovalError, Result};
use crate::features::clustering::border_sample_indices;
use crate::features::compute_edge_map;
use crate::types::{Color, Mask, PixelBuffer};

/// Binary border-similarity mask
///
/// Each pixel scores `0.6 * similarity + 0.3 * position + 0.1 * calm`, where similarity
/// is the best match against raw border samples, position grows towards the border and
/// calm is set when the Sobel edge strength is below 0.1. A score above 0.4 is background.
#[must_use]
pub fn traditional_mask(pixels: &PixelBuffer) -> Mask {
    let (width, height) = pixels.dimensions();
    let sample_count = (((width + height) / 4) as usize).clamp(4, 50);
    let samples: Vec<Color> = border_sample_indices(width, height, sample_count)
        .into_iter()
        .map(|idx| pixels.color_at(idx))
        .collect();
    let edges = compute_edge_map(pixels);
    let short_side = width.min(height).max(1) as f32;

    Mask::from_fn(width, height, |x, y| {
        let color = pixels.color_xy(x, y);
        let similarity = samples
            .iter()
            .map(|s| s.similarity(&color))
            .fold(0.0_f32, f32::max);

        let edge_distance = x.min(y).min(width - 1 - x).min(height - 1 - y) as f32;
        let position = (1.0 - edge_distance / short_side * 4.0).max(0.0);
        let calm = if edges.get(x, y) < 0.1 { 0.1 } else { 0.0 };

        if similarity * 0.6 + position * 0.3 + calm > 0.4 {
            0.0
        } else {
            1.0
        }
    })
}

/// `0.7 * learned + 0.3 * traditional`, or an even split where they differ by more than 0.5
///
/// # Errors
/// - `InvalidImage` when the masks differ in size
pub fn fuse_masks(learned: &Mask, traditional: &Mask) -> Result<Mask> {
    ensure_same_size(learned, traditional)?;
    let data = learned
        .as_slice()
        .iter()
        .zip(traditional.as_slice())
        .map(|(&ai, &trad)| {
            if (ai - trad).abs() > 0.5 {
                ai * 0.5 + trad * 0.5
            } else {
                ai * 0.7 + trad * 0.3
            }
        })
        .collect();
    Ok(Mask::from_vec_unchecked(learned.width(), learned.height(), data))
}

/// Per-pixel mean of two masks
///
/// # Errors
/// - `InvalidImage` when the masks differ in size
pub fn average_masks(a: &Mask, b: &Mask) -> Result<Mask> {
    ensure_same_size(a, b)?;
    let data = a
        .as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(&x, &y)| (x + y) / 2.0)
        .collect();
    Ok(Mask::from_vec_unchecked(a.width(), a.height(), data))
}

fn ensure_same_size(a: &Mask, b: &Mask) -> Result<()> {
    if a.dimensions() == b.dimensions() {
        Ok(())
    } else {
        Err(BgRemovalError::dimension_mismatch(a.dimensions(), b.dimensions()))
    }
}
