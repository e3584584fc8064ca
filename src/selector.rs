//! Feature-driven strategy selection
//!
//! Samples border and center pixels with a seeded generator, measures how uniform the
//! border is and how far the center departs from it, and picks a heuristic builder:
//! flood fill for uniform backgrounds, border-color distance for well separated
//! subjects, region growing otherwise.

use crate::config::{SelectorOptions, Strategy};
use crate::types::PixelBuffer;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Statistics measured by the selector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageFeatures {
    /// RMS distance of border samples from their mean color
    pub edge_variance: f32,
    /// RMS distance of center samples from their mean color
    pub center_variance: f32,
    /// Distance between the mean border and mean center colors
    pub contrast: f32,
    /// Mean border color
    pub border_mean: [f32; 3],
    /// Mean center color
    pub center_mean: [f32; 3],
}

/// Selector decision
#[derive(Debug, Clone, PartialEq)]
pub struct StrategySelection {
    pub strategy: Strategy,
    /// Flood-fill tolerance to use instead of the configured one
    pub flood_tolerance: Option<f32>,
    pub features: ImageFeatures,
}

/// Deterministic feature-driven selector
#[derive(Debug, Clone)]
pub struct StrategySelector {
    options: SelectorOptions,
}

impl StrategySelector {
    #[must_use]
    pub fn new(options: SelectorOptions) -> Self {
        Self { options }
    }

    /// Measure border/center statistics for `pixels`
    ///
    /// The same seed and pixels always produce the same features.
    #[must_use]
    pub fn analyze(&self, pixels: &PixelBuffer) -> ImageFeatures {
        let (width, height) = pixels.dimensions();
        let mut rng = StdRng::seed_from_u64(self.options.seed);

        let border: Vec<[f32; 3]> = (0..self.options.border_samples)
            .map(|_| {
                let (x, y) = border_point(&mut rng, width, height);
                rgb(pixels, x, y)
            })
            .collect();

        let center: Vec<[f32; 3]> = (0..self.options.center_samples)
            .map(|_| {
                let x = center_coordinate(&mut rng, width);
                let y = center_coordinate(&mut rng, height);
                rgb(pixels, x, y)
            })
            .collect();

        let border_mean = mean_color(&border);
        let center_mean = mean_color(&center);
        ImageFeatures {
            edge_variance: spread(&border, border_mean),
            center_variance: spread(&center, center_mean),
            contrast: if border.is_empty() || center.is_empty() {
                0.0
            } else {
                distance(border_mean, center_mean)
            },
            border_mean,
            center_mean,
        }
    }

    /// Pick a heuristic builder; the first matching rule wins
    #[instrument(skip(self, pixels), fields(width = pixels.width(), height = pixels.height()))]
    pub fn select(&self, pixels: &PixelBuffer) -> StrategySelection {
        let features = self.analyze(pixels);
        let selection = if features.edge_variance < self.options.uniform_variance {
            StrategySelection {
                strategy: Strategy::FloodFill,
                flood_tolerance: Some(self.options.uniform_tolerance),
                features,
            }
        } else if features.contrast > self.options.high_contrast {
            StrategySelection {
                strategy: Strategy::BorderColor,
                flood_tolerance: None,
                features,
            }
        } else {
            StrategySelection {
                strategy: Strategy::RegionGrowing,
                flood_tolerance: None,
                features,
            }
        };
        debug!(
            strategy = %selection.strategy,
            edge_variance = features.edge_variance,
            contrast = features.contrast,
            "strategy selected"
        );
        selection
    }
}

impl Default for StrategySelector {
    fn default() -> Self {
        Self::new(SelectorOptions::default())
    }
}

/// A uniformly chosen side, then a uniform position along it
fn border_point(rng: &mut StdRng, width: u32, height: u32) -> (u32, u32) {
    match rng.random_range(0..4_u8) {
        0 => (rng.random_range(0..width), 0),
        1 => (rng.random_range(0..width), height - 1),
        2 => (0, rng.random_range(0..height)),
        _ => (width - 1, rng.random_range(0..height)),
    }
}

/// Position inside the middle 40% of an axis
fn center_coordinate(rng: &mut StdRng, extent: u32) -> u32 {
    let offset = extent as f32 * 0.3 + rng.random::<f32>() * extent as f32 * 0.4;
    (offset as u32).min(extent - 1)
}

fn rgb(pixels: &PixelBuffer, x: u32, y: u32) -> [f32; 3] {
    let c = pixels.color_xy(x, y);
    [f32::from(c.r), f32::from(c.g), f32::from(c.b)]
}

fn mean_color(colors: &[[f32; 3]]) -> [f32; 3] {
    if colors.is_empty() {
        return [0.0; 3];
    }
    let n = colors.len() as f32;
    let mut sum = [0.0_f32; 3];
    for c in colors {
        for (s, v) in sum.iter_mut().zip(c) {
            *s += v;
        }
    }
    sum.map(|s| s / n)
}

fn distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    a.iter()
        .zip(&b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn spread(colors: &[[f32; 3]], mean: [f32; 3]) -> f32 {
    if colors.is_empty() {
        return 0.0;
    }
    let sum: f32 = colors
        .iter()
        .map(|&c| {
            let d = distance(c, mean);
            d * d
        })
        .sum();
    (sum / colors.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(size: u32, from: u32, to: u32, outer: [u8; 4], inner: [u8; 4]) -> PixelBuffer {
        PixelBuffer::from_fn(size, size, |x, y| {
            if (from..to).contains(&x) && (from..to).contains(&y) {
                inner
            } else {
                outer
            }
        })
        .unwrap()
    }

    #[test]
    fn test_uniform_background_selects_flood_fill() {
        let pixels = framed(50, 15, 35, [255, 255, 255, 255], [0, 0, 255, 255]);
        let selection = StrategySelector::default().select(&pixels);
        assert_eq!(selection.strategy, Strategy::FloodFill);
        assert_eq!(selection.flood_tolerance, Some(25.0));
        assert!(selection.features.edge_variance < 1e-3);
        assert!(selection.features.contrast > 80.0);
    }

    #[test]
    fn test_noisy_border_with_distinct_subject_selects_border_color() {
        // checkered border, flat subject far from both checker colors
        let pixels = PixelBuffer::from_fn(60, 60, |x, y| {
            if (18..42).contains(&x) && (18..42).contains(&y) {
                [250, 250, 250, 255]
            } else if (x / 3 + y / 3) % 2 == 0 {
                [0, 0, 0, 255]
            } else {
                [120, 0, 0, 255]
            }
        })
        .unwrap();
        let selection = StrategySelector::default().select(&pixels);
        assert!(selection.features.edge_variance >= 30.0);
        assert_eq!(selection.strategy, Strategy::BorderColor);
        assert_eq!(selection.flood_tolerance, None);
    }

    #[test]
    fn test_low_contrast_busy_image_selects_region_growing() {
        let pixels = PixelBuffer::from_fn(40, 40, |x, y| {
            if (x + y) % 2 == 0 {
                [40, 40, 40, 255]
            } else {
                [140, 140, 140, 255]
            }
        })
        .unwrap();
        let selection = StrategySelector::default().select(&pixels);
        assert_eq!(selection.strategy, Strategy::RegionGrowing);
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let pixels = PixelBuffer::from_fn(31, 17, |x, y| [(x * 8) as u8, (y * 15) as u8, 77, 255]).unwrap();
        let selector = StrategySelector::default();
        assert_eq!(selector.analyze(&pixels), selector.analyze(&pixels));
    }

    #[test]
    fn test_single_pixel_image() {
        let pixels = PixelBuffer::filled(1, 1, [9, 9, 9, 255]).unwrap();
        let features = StrategySelector::default().analyze(&pixels);
        assert_eq!(features.edge_variance, 0.0);
        assert_eq!(features.contrast, 0.0);
    }
}
