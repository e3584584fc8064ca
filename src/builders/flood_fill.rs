//! Flood-fill ("magic wand") builder
//!
//! Grows 4-connected background regions from border seeds. A pixel joins a fill when
//! its distance to that fill's seed color is within the tolerance. Everything the fills
//! reach becomes background, the rest stays foreground.

use super::{ensure_non_empty, mask_from_background, MaskBuilder};
use crate::config::{FloodFillOptions, FloodSeeds};
use crate::error::Result;
use crate::features::border_indices;
use crate::types::{Mask, PixelBuffer};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Default)]
pub struct FloodFillBuilder {
    options: FloodFillOptions,
}

impl FloodFillBuilder {
    #[must_use]
    pub fn new(options: FloodFillOptions) -> Self {
        Self { options }
    }

    fn seeds(&self, width: u32, height: u32) -> Vec<usize> {
        match self.options.seeds {
            FloodSeeds::Corners => {
                let (w, h) = (width as usize, height as usize);
                let mut seeds = Vec::with_capacity(4);
                for corner in [0, w - 1, (h - 1) * w, (h - 1) * w + w - 1] {
                    if !seeds.contains(&corner) {
                        seeds.push(corner);
                    }
                }
                seeds
            },
            FloodSeeds::AllBorder => border_indices(width, height),
        }
    }
}

/// Run one fill per seed over a shared background flag
///
/// `stamp[i]` holds the last fill that examined pixel `i`, so each fill visits a pixel at
/// most once and rejected pixels stay available to later fills with other seed colors.
fn fill_from_seeds(pixels: &PixelBuffer, seeds: &[usize], tolerance: f32) -> Vec<bool> {
    let (w, h) = (pixels.width() as usize, pixels.height() as usize);
    let mut background = vec![false; w * h];
    let mut stamp = vec![0_u32; w * h];
    let mut stack = Vec::new();

    for (fill, &seed) in seeds.iter().enumerate() {
        if background[seed] {
            continue;
        }
        let generation = fill as u32 + 1;
        let seed_color = pixels.color_at(seed);
        stack.push(seed);

        while let Some(idx) = stack.pop() {
            if background[idx] || stamp[idx] == generation {
                continue;
            }
            stamp[idx] = generation;
            if pixels.color_at(idx).distance(&seed_color) > tolerance {
                continue;
            }
            background[idx] = true;

            let (x, y) = (idx % w, idx / w);
            if x > 0 {
                stack.push(idx - 1);
            }
            if x + 1 < w {
                stack.push(idx + 1);
            }
            if y > 0 {
                stack.push(idx - w);
            }
            if y + 1 < h {
                stack.push(idx + w);
            }
        }
    }
    background
}

impl MaskBuilder for FloodFillBuilder {
    fn name(&self) -> &'static str {
        "flood_fill"
    }

    #[instrument(skip(self, pixels), fields(width = pixels.width(), height = pixels.height(), tolerance = self.options.tolerance))]
    fn build(&self, pixels: &PixelBuffer) -> Result<Mask> {
        ensure_non_empty(pixels)?;
        let (width, height) = pixels.dimensions();
        let seeds = self.seeds(width, height);
        let background = fill_from_seeds(pixels, &seeds, self.options.tolerance.max(0.0));

        let removed = background.iter().filter(|&&bg| bg).count();
        debug!(seeds = seeds.len(), removed, "flood fill complete");
        Ok(mask_from_background(width, height, &background))
    }
}
