//! Color-range builder
//!
//! Frequent border colors that are also frequent across the whole image define the
//! background palette; pixels within range of that palette are removed.

use super::{ensure_non_empty, MaskBuilder};
use crate::config::ColorRangeOptions;
use crate::error::Result;
use crate::features::{border_indices, quantized_histogram};
use crate::features::clustering::sorted_counts;
use crate::types::{Color, Mask, PixelBuffer};
use std::collections::HashMap;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Default)]
pub struct ColorRangeBuilder {
    options: ColorRangeOptions,
}

impl ColorRangeBuilder {
    #[must_use]
    pub fn new(options: ColorRangeOptions) -> Self {
        Self { options }
    }

    /// Background palette for `pixels`
    ///
    /// Border colors are kept when a frequent image color lies within `confirm_distance`.
    /// When none is confirmed the most frequent border color is used alone.
    #[must_use]
    pub fn background_palette(&self, pixels: &PixelBuffer) -> Vec<Color> {
        let opts = &self.options;
        let step = opts.quantization.max(1);

        let mut border_counts: HashMap<Color, usize> = HashMap::new();
        for idx in border_indices(pixels.width(), pixels.height()) {
            *border_counts
                .entry(pixels.color_at(idx).bucket(step))
                .or_insert(0) += 1;
        }
        let border: Vec<Color> = sorted_counts(border_counts)
            .into_iter()
            .take(opts.top_border_colors.max(1))
            .map(|entry| entry.color)
            .collect();

        let frequent: Vec<Color> = quantized_histogram(pixels, step, opts.histogram_stride, 0.0)
            .into_iter()
            .take(opts.histogram_top)
            .map(|entry| entry.color)
            .collect();

        let confirmed: Vec<Color> = border
            .iter()
            .copied()
            .filter(|color| {
                frequent
                    .iter()
                    .any(|f| f.distance(color) < opts.confirm_distance)
            })
            .collect();

        if confirmed.is_empty() {
            border.into_iter().take(1).collect()
        } else {
            confirmed
        }
    }
}

impl MaskBuilder for ColorRangeBuilder {
    fn name(&self) -> &'static str {
        "color_range"
    }

    #[instrument(skip(self, pixels), fields(width = pixels.width(), height = pixels.height()))]
    fn build(&self, pixels: &PixelBuffer) -> Result<Mask> {
        ensure_non_empty(pixels)?;
        let palette = self.background_palette(pixels);
        debug!(palette = palette.len(), "background palette");

        let range = self.options.distance;
        Ok(Mask::from_fn(pixels.width(), pixels.height(), |x, y| {
            let color = pixels.color_xy(x, y);
            if palette.iter().any(|bg| bg.distance(&color) < range) {
                0.0
            } else {
                1.0
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_border_palette() {
        let pixels = PixelBuffer::from_fn(32, 32, |x, y| {
            if (10..22).contains(&x) && (10..22).contains(&y) {
                [30, 30, 200, 255]
            } else if (x + y) % 2 == 0 {
                [250, 250, 250, 255]
            } else {
                [244, 246, 248, 255]
            }
        })
        .unwrap();
        let mask = ColorRangeBuilder::default().build(&pixels).unwrap();
        assert_eq!(mask.get(0, 0), 0.0);
        assert_eq!(mask.get(1, 0), 0.0);
        assert_eq!(mask.get(15, 15), 1.0);
    }

    #[test]
    fn test_palette_falls_back_to_most_frequent_border_color() {
        // border is a thin frame, so its color never ranks among frequent image colors
        let options = ColorRangeOptions {
            histogram_top: 1,
            ..ColorRangeOptions::default()
        };
        let pixels = PixelBuffer::from_fn(40, 40, |x, y| {
            if x == 0 || y == 0 || x == 39 || y == 39 {
                [0, 120, 0, 255]
            } else {
                [200, 200, 0, 255]
            }
        })
        .unwrap();
        let palette = ColorRangeBuilder::new(options).background_palette(&pixels);
        assert_eq!(palette, vec![Color::new(0, 120, 0).bucket(8)]);
    }
}
