//! Deterministic k-means color clustering and color histograms
//!
//! Centroids are seeded from the first `k` distinct samples, so repeated runs over the
//! same pixels return identical clusters.

use super::perimeter_indices;
use crate::types::{Color, ColorClusterSet, PixelBuffer};
use std::collections::HashMap;

/// Border samples are snapped to buckets of this width before clustering
const BORDER_BUCKET: u8 = 8;

/// A histogram bucket and its population
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorCount {
    pub color: Color,
    pub count: usize,
}

/// Cluster `samples` into at most `k` centroids
///
/// Centroids start at the first `k` distinct samples. Each iteration assigns every
/// sample to its nearest centroid (lowest index on ties) and moves centroids to the
/// rounded mean of their members. A centroid with no members keeps its position.
/// With fewer than `k` distinct samples, the distinct samples are returned unclustered.
#[must_use]
pub fn kmeans(samples: &[Color], k: usize, iterations: usize) -> ColorClusterSet {
    if samples.is_empty() || k == 0 {
        return ColorClusterSet::default();
    }

    let mut centroids: Vec<Color> = Vec::with_capacity(k);
    for sample in samples {
        if !centroids.contains(sample) {
            centroids.push(*sample);
            if centroids.len() == k {
                break;
            }
        }
    }
    if centroids.len() < k {
        return ColorClusterSet::new(centroids);
    }

    for _ in 0..iterations {
        let current = ColorClusterSet::new(centroids.clone());
        let mut sums = vec![[0_u64; 3]; k];
        let mut counts = vec![0_u64; k];
        for sample in samples {
            if let Some((idx, _)) = current.nearest(sample) {
                sums[idx][0] += u64::from(sample.r);
                sums[idx][1] += u64::from(sample.g);
                sums[idx][2] += u64::from(sample.b);
                counts[idx] += 1;
            }
        }

        let mut changed = false;
        for (idx, centroid) in centroids.iter_mut().enumerate() {
            if let Some(mean) = Color::from_sums(sums[idx], counts[idx]) {
                if mean != *centroid {
                    *centroid = mean;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }

    ColorClusterSet::new(centroids)
}

/// Sample positions along the border: the four corners, then evenly spaced points
/// walking clockwise around the perimeter
#[must_use]
pub fn border_sample_indices(width: u32, height: u32, sample_count: usize) -> Vec<usize> {
    let perimeter = perimeter_indices(width, height);
    if perimeter.is_empty() || sample_count == 0 {
        return Vec::new();
    }

    let (w, h) = (width as usize, height as usize);
    let mut indices = Vec::with_capacity(sample_count);
    for corner in [0, w - 1, (h - 1) * w, (h - 1) * w + w - 1] {
        if indices.len() < sample_count && !indices.contains(&corner) {
            indices.push(corner);
        }
    }

    let remaining = sample_count.saturating_sub(indices.len());
    for i in 0..remaining {
        let pos = ((2 * i + 1) * perimeter.len()) / (2 * remaining);
        indices.push(perimeter[pos.min(perimeter.len() - 1)]);
    }
    indices
}

/// Background colors from `sample_count` border samples clustered into `k` groups
#[must_use]
pub fn detect_border_colors(
    pixels: &PixelBuffer,
    sample_count: usize,
    k: usize,
    iterations: usize,
) -> ColorClusterSet {
    let samples: Vec<Color> = border_sample_indices(pixels.width(), pixels.height(), sample_count)
        .into_iter()
        .map(|idx| pixels.color_at(idx).bucket(BORDER_BUCKET))
        .collect();
    kmeans(&samples, k, iterations)
}

/// Margin in pixels for a fraction of the shorter side, or 0 when it would leave nothing
fn margin_for(width: u32, height: u32, margin_fraction: f32) -> u32 {
    let margin = (width.min(height) as f32 * margin_fraction.max(0.0)) as u32;
    if margin.saturating_mul(2) >= width || margin.saturating_mul(2) >= height {
        0
    } else {
        margin
    }
}

fn inside_margin(x: u32, y: u32, width: u32, height: u32, margin: u32) -> bool {
    x >= margin && y >= margin && x < width - margin && y < height - margin
}

/// Dominant colors from every `stride`-th pixel, skipping a border margin of
/// `margin_fraction * min(width, height)`
#[must_use]
pub fn detect_dominant_colors(
    pixels: &PixelBuffer,
    stride: usize,
    k: usize,
    iterations: usize,
    margin_fraction: f32,
) -> ColorClusterSet {
    let (width, height) = pixels.dimensions();
    let margin = margin_for(width, height, margin_fraction);
    let samples: Vec<Color> = (0..pixels.pixel_count())
        .step_by(stride.max(1))
        .filter(|&idx| {
            let x = (idx % width as usize) as u32;
            let y = (idx / width as usize) as u32;
            inside_margin(x, y, width, height, margin)
        })
        .map(|idx| pixels.color_at(idx))
        .collect();
    kmeans(&samples, k, iterations)
}

/// Histogram of bucketed colors over every `stride`-th pixel inside the margin,
/// most frequent first
///
/// Ties are ordered by (r, g, b) so the result does not depend on hash order.
#[must_use]
pub fn quantized_histogram(
    pixels: &PixelBuffer,
    bucket: u8,
    stride: usize,
    margin_fraction: f32,
) -> Vec<ColorCount> {
    let (width, height) = pixels.dimensions();
    let margin = margin_for(width, height, margin_fraction);
    let mut counts: HashMap<Color, usize> = HashMap::new();
    for idx in (0..pixels.pixel_count()).step_by(stride.max(1)) {
        let x = (idx % width as usize) as u32;
        let y = (idx / width as usize) as u32;
        if inside_margin(x, y, width, height, margin) {
            *counts.entry(pixels.color_at(idx).bucket(bucket)).or_insert(0) += 1;
        }
    }
    sorted_counts(counts)
}

/// Turn a color-count map into a list ordered by descending count, then color
pub(crate) fn sorted_counts(counts: HashMap<Color, usize>) -> Vec<ColorCount> {
    let mut entries: Vec<ColorCount> = counts
        .into_iter()
        .map(|(color, count)| ColorCount { color, count })
        .collect();
    entries.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| (a.color.r, a.color.g, a.color.b).cmp(&(b.color.r, b.color.g, b.color.b)))
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kmeans_separates_two_groups() {
        let mut samples = Vec::new();
        for i in 0..10 {
            samples.push(Color::new(10 + i, 10, 10));
            samples.push(Color::new(240 - i, 240, 240));
        }
        let clusters = kmeans(&samples, 2, 10);
        assert_eq!(clusters.len(), 2);
        let dark = clusters.nearest(&Color::new(0, 0, 0)).unwrap();
        let light = clusters.nearest(&Color::new(255, 255, 255)).unwrap();
        assert_ne!(dark.0, light.0);
        assert!(dark.1 < 30.0);
        assert!(light.1 < 30.0);
    }

    #[test]
    fn test_kmeans_fewer_unique_samples_than_k() {
        let samples = vec![Color::new(1, 2, 3); 20];
        let clusters = kmeans(&samples, 5, 10);
        assert_eq!(clusters.colors(), &[Color::new(1, 2, 3)]);
        assert!(kmeans(&[], 3, 5).is_empty());
    }

    #[test]
    fn test_kmeans_is_deterministic() {
        let samples: Vec<Color> = (0..200_u32)
            .map(|i| Color::new((i * 37 % 256) as u8, (i * 91 % 256) as u8, (i * 13 % 256) as u8))
            .collect();
        assert_eq!(kmeans(&samples, 8, 10), kmeans(&samples, 8, 10));
    }

    #[test]
    fn test_border_sample_indices_start_with_corners() {
        let indices = border_sample_indices(10, 8, 12);
        assert_eq!(indices.len(), 12);
        assert_eq!(&indices[..4], &[0, 9, 70, 79]);
        for idx in indices {
            let (x, y) = (idx % 10, idx / 10);
            assert!(x == 0 || y == 0 || x == 9 || y == 7);
        }
    }

    #[test]
    fn test_detect_border_colors_uniform_border() {
        let pixels = PixelBuffer::from_fn(20, 20, |x, y| {
            if (5..15).contains(&x) && (5..15).contains(&y) {
                [0, 0, 255, 255]
            } else {
                [255, 255, 255, 255]
            }
        })
        .unwrap();
        let colors = detect_border_colors(&pixels, 12, 3, 5);
        assert_eq!(colors.len(), 1);
        assert!(colors.colors()[0].distance(&Color::new(255, 255, 255)) < 10.0);
    }

    #[test]
    fn test_dominant_colors_margin_biases_to_center() {
        let pixels = PixelBuffer::from_fn(40, 40, |x, y| {
            if (8..32).contains(&x) && (8..32).contains(&y) {
                [200, 30, 30, 255]
            } else {
                [20, 200, 20, 255]
            }
        })
        .unwrap();
        let colors = detect_dominant_colors(&pixels, 1, 2, 5, 0.25);
        assert_eq!(colors.colors(), &[Color::new(200, 30, 30)]);
    }

    #[test]
    fn test_quantized_histogram_order() {
        let pixels = PixelBuffer::from_fn(10, 1, |x, _| {
            if x < 7 {
                [100, 100, 100, 255]
            } else {
                [0, 0, 0, 255]
            }
        })
        .unwrap();
        let hist = quantized_histogram(&pixels, 16, 1, 0.0);
        assert_eq!(hist.len(), 2);
        assert_eq!(hist[0].count, 7);
        assert_eq!(hist[0].color, Color::new(104, 104, 104));
        assert_eq!(hist[1].count, 3);
    }
}
