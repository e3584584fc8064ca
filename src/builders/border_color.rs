//! Border-sampled color-distance builder
//!
//! Background colors are inferred from border samples. A pixel is background when it is
//! close to one of them, sits in a calm (low local contrast) area and does not match a
//! dominant color from the image center.

use super::{ensure_non_empty, MaskBuilder};
use crate::config::BorderColorOptions;
use crate::error::Result;
use crate::features::{detect_border_colors, local_contrast_map, quantized_histogram};
use crate::types::{Color, ColorClusterSet, Mask, PixelBuffer};
use tracing::{debug, instrument};

/// Center histogram bucket width (16 levels per channel)
const CENTER_BUCKET: u8 = 16;
/// Center region excludes this fraction of the shorter side on every edge
const CENTER_MARGIN: f32 = 0.1;
/// Number of dominant center colors treated as subject colors
const FOREGROUND_COLORS: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct BorderColorBuilder {
    options: BorderColorOptions,
}

impl BorderColorBuilder {
    #[must_use]
    pub fn new(options: BorderColorOptions) -> Self {
        Self { options }
    }

    /// Dominant center colors that are not themselves background-like
    fn foreground_colors(&self, pixels: &PixelBuffer, background: &ColorClusterSet) -> Vec<Color> {
        if !self.options.exclude_foreground_colors {
            return Vec::new();
        }
        quantized_histogram(pixels, CENTER_BUCKET, 1, CENTER_MARGIN)
            .into_iter()
            .take(FOREGROUND_COLORS)
            .map(|entry| entry.color)
            .filter(|color| {
                background
                    .min_distance(color)
                    .map_or(true, |d| d >= self.options.color_threshold)
            })
            .collect()
    }
}

impl MaskBuilder for BorderColorBuilder {
    fn name(&self) -> &'static str {
        "border_color"
    }

    #[instrument(skip(self, pixels), fields(width = pixels.width(), height = pixels.height()))]
    fn build(&self, pixels: &PixelBuffer) -> Result<Mask> {
        ensure_non_empty(pixels)?;
        let opts = &self.options;

        let background = detect_border_colors(
            pixels,
            opts.sample_points,
            opts.clusters,
            opts.iterations,
        );
        let foreground = self.foreground_colors(pixels, &background);
        let edges = local_contrast_map(pixels);
        debug!(
            background_clusters = background.len(),
            foreground_colors = foreground.len(),
            "border color model ready"
        );

        let width = pixels.width();
        Ok(Mask::from_fn(width, pixels.height(), |x, y| {
            let idx = pixels.index(x, y);
            let color = pixels.color_at(idx);
            let near_background = background
                .min_distance(&color)
                .is_some_and(|d| d < opts.color_threshold);
            let calm = edges.as_slice()[idx] < opts.edge_threshold;
            let subject_color = foreground
                .iter()
                .any(|fg| fg.distance(&color) < opts.foreground_color_distance);

            if near_background && calm && !subject_color {
                0.0
            } else {
                1.0
            }
        }))
    }
}
