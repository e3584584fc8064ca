//! Grab-cut style builder
//!
//! A centered box seeds the foreground. Each pass relabels pixels on the current
//! foreground/background boundary by comparing their color to the mean color of their
//! foreground and background 8-neighbors.

use super::{ensure_non_empty, MaskBuilder};
use crate::config::GrabCutOptions;
use crate::error::Result;
use crate::types::{Color, Mask, PixelBuffer};
use crate::utils::parallel;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Default)]
pub struct GrabCutBuilder {
    options: GrabCutOptions,
}

impl GrabCutBuilder {
    #[must_use]
    pub fn new(options: GrabCutOptions) -> Self {
        Self { options }
    }

    /// Initial labels: `true` within `box_fraction / 2` of the center on both axes
    fn seed_labels(&self, width: usize, height: usize) -> Vec<bool> {
        let fraction = self.options.box_fraction.clamp(0.0, 1.0);
        let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
        let (half_w, half_h) = (width as f32 * fraction / 2.0, height as f32 * fraction / 2.0);

        let mut labels = vec![false; width * height];
        for (idx, label) in labels.iter_mut().enumerate() {
            let (x, y) = ((idx % width) as f32, (idx / width) as f32);
            *label = (x - cx).abs() < half_w && (y - cy).abs() < half_h;
        }
        labels
    }
}

/// One relabeling pass over interior pixels that have both foreground and background
/// neighbors; a pixel equally close to both means goes to the background
fn relabel(pixels: &PixelBuffer, labels: &[bool]) -> (Vec<bool>, usize) {
    let w = pixels.width() as usize;
    let h = pixels.height() as usize;
    let mut next = labels.to_vec();

    parallel::fill_rows(w, 1, &mut next, |y, row| {
        if y == 0 || y + 1 >= h {
            return;
        }
        for (x, label) in row.iter_mut().enumerate().take(w - 1).skip(1) {
            let mut sums = [[0_u64; 3]; 2];
            let mut counts = [0_u64; 2];
            for yy in y - 1..=y + 1 {
                for xx in x - 1..=x + 1 {
                    if xx == x && yy == y {
                        continue;
                    }
                    let idx = yy * w + xx;
                    let side = usize::from(labels[idx]);
                    let c = pixels.color_at(idx);
                    sums[side][0] += u64::from(c.r);
                    sums[side][1] += u64::from(c.g);
                    sums[side][2] += u64::from(c.b);
                    counts[side] += 1;
                }
            }

            let (Some(bg), Some(fg)) = (
                Color::from_sums(sums[0], counts[0]),
                Color::from_sums(sums[1], counts[1]),
            ) else {
                continue;
            };
            let color = pixels.color_at(y * w + x);
            *label = color.distance(&fg) < color.distance(&bg);
        }
    });

    let changed = next.iter().zip(labels).filter(|(a, b)| a != b).count();
    (next, changed)
}

impl MaskBuilder for GrabCutBuilder {
    fn name(&self) -> &'static str {
        "grab_cut"
    }

    #[instrument(skip(self, pixels), fields(width = pixels.width(), height = pixels.height(), iterations = self.options.iterations))]
    fn build(&self, pixels: &PixelBuffer) -> Result<Mask> {
        ensure_non_empty(pixels)?;
        let (width, height) = pixels.dimensions();
        let mut labels = self.seed_labels(width as usize, height as usize);

        for pass in 0..self.options.iterations {
            let (next, changed) = relabel(pixels, &labels);
            labels = next;
            debug!(pass, changed, "grab cut pass");
            if changed == 0 {
                break;
            }
        }

        let data = labels
            .into_iter()
            .map(|fg| if fg { 1.0 } else { 0.0 })
            .collect();
        Ok(Mask::from_vec_unchecked(width, height, data))
    }
}
