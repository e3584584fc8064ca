//! Pixel-aware mask corrections
//!
//! Both passes read the source pixels alongside the mask: fine-detail protection keeps
//! dark, low-contrast strands (hair) from being erased, and color-aware edge refinement
//! nudges uncertain edge pixels towards the side they resemble.

use super::morphology::is_interior;
use crate::error::Result;
use crate::types::{Mask, PixelBuffer};
use crate::utils::{parallel, NumericValidator};
use serde::{Deserialize, Serialize};

/// Region-aware protection for fine, dark detail such as hair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FineDetailProtection {
    /// Protected band, as a fraction of the height measured from the top
    pub region_fraction: f32,
    /// Only pixels darker than this `(r + g + b) / 3` level are protected
    pub max_brightness: f32,
    /// Only pixels with a mask value above this are protected
    pub min_value: f32,
    /// Neighborhood radius (2 gives a 5x5 window)
    pub window_radius: u32,
    /// Window pixels above `neighbor_value` required to protect
    pub min_neighbors: usize,
    /// Mask value counting a window pixel as confident foreground
    pub neighbor_value: f32,
    /// Protected pixels are raised to at least this value
    pub floor: f32,
}

impl Default for FineDetailProtection {
    fn default() -> Self {
        Self {
            region_fraction: 0.4,
            max_brightness: 80.0,
            min_value: 0.3,
            window_radius: 2,
            min_neighbors: 8,
            neighbor_value: 0.7,
            floor: 0.8,
        }
    }
}

impl FineDetailProtection {
    /// # Errors
    /// - `InvalidConfig` for a fraction or mask level outside [0,1] or an oversized window
    pub fn validate(&self) -> Result<()> {
        NumericValidator::validate_percentage(self.region_fraction, "region_fraction")?;
        NumericValidator::validate_range(self.max_brightness, 0.0, 255.0, "max_brightness")?;
        NumericValidator::validate_percentage(self.min_value, "min_value")?;
        NumericValidator::validate_range(self.window_radius, 1, 8, "window_radius")?;
        NumericValidator::validate_percentage(self.neighbor_value, "neighbor_value")?;
        NumericValidator::validate_percentage(self.floor, "floor")?;
        Ok(())
    }

    /// Raise protected pixels to `floor`
    ///
    /// A pixel in the top band qualifies when it is darker than `max_brightness`, already
    /// above `min_value`, and at least `min_neighbors` pixels of its window (itself
    /// included, clipped at the image edge) are above `neighbor_value`. All decisions read
    /// the input mask.
    #[must_use]
    pub fn apply(&self, mask: &Mask, pixels: &PixelBuffer) -> Mask {
        let (width, height) = mask.dimensions();
        let (w, h) = (width as usize, height as usize);
        let r = self.window_radius as usize;
        let band = (height as f32 * self.region_fraction).floor() as usize;
        let src = mask.as_slice();

        let data = parallel::map_pixels(w, h, |x, y| {
            let idx = y * w + x;
            let v = src[idx];
            if y >= band || v <= self.min_value || pixels.color_at(idx).brightness() >= self.max_brightness {
                return v;
            }
            let mut confident = 0;
            for yy in y.saturating_sub(r)..=(y + r).min(h - 1) {
                for xx in x.saturating_sub(r)..=(x + r).min(w - 1) {
                    if src[yy * w + xx] > self.neighbor_value {
                        confident += 1;
                    }
                }
            }
            if confident >= self.min_neighbors {
                v.max(self.floor)
            } else {
                v
            }
        });
        Mask::from_vec_unchecked(width, height, data)
    }
}

/// Color-aware refinement of uncertain edge pixels
///
/// Interior pixels with a mask value in (0.2, 0.8) compare themselves against confident
/// neighbors within `radius` (foreground above 0.7, background below 0.3). The side with
/// the larger share of color-similar neighbors (similarity above 0.7) pulls the pixel by
/// 0.2. Pixels without confident neighbors on both sides are left alone.
#[must_use]
pub fn color_aware_edges(mask: &Mask, pixels: &PixelBuffer, radius: u32) -> Mask {
    let (width, height) = mask.dimensions();
    let (w, h, r) = (width as usize, height as usize, radius as usize);
    let src = mask.as_slice();

    let data = parallel::map_pixels(w, h, |x, y| {
        let idx = y * w + x;
        let v = src[idx];
        if r == 0 || !is_interior(x, y, r, w, h) || v <= 0.2 || v >= 0.8 {
            return v;
        }
        let color = pixels.color_at(idx);
        let (mut fg_total, mut fg_similar, mut bg_total, mut bg_similar) = (0_u32, 0_u32, 0_u32, 0_u32);
        for yy in y - r..=y + r {
            for xx in x - r..=x + r {
                if xx == x && yy == y {
                    continue;
                }
                let n = yy * w + xx;
                let similar = pixels.color_at(n).similarity(&color) > 0.7;
                if src[n] > 0.7 {
                    fg_total += 1;
                    fg_similar += u32::from(similar);
                } else if src[n] < 0.3 {
                    bg_total += 1;
                    bg_similar += u32::from(similar);
                }
            }
        }
        if fg_total == 0 || bg_total == 0 {
            return v;
        }
        let fg_ratio = fg_similar as f32 / fg_total as f32;
        let bg_ratio = bg_similar as f32 / bg_total as f32;
        if fg_ratio > bg_ratio {
            (v + 0.2).min(1.0)
        } else if bg_ratio > fg_ratio {
            (v - 0.2).max(0.0)
        } else {
            v
        }
    });
    Mask::from_vec_unchecked(width, height, data)
}
