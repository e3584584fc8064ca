//! Region-growing ("universal") builder
//!
//! The image is contrast-boosted, then regions grow from border seeds through pixels
//! that stay close to the seed's dominant color cluster and away from strong edges.
//! The largest border region, and any border region of comparable size, is background.

use super::{ensure_non_empty, mask_from_background, MaskBuilder};
use crate::config::RegionGrowingOptions;
use crate::error::Result;
use crate::features::{border_indices, detect_dominant_colors, enhance_contrast, fused_edge_map};
use crate::types::{Color, ColorClusterSet, Mask, PixelBuffer, RegionMap};
use tracing::{debug, instrument, span, Level};

/// A grown region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionInfo {
    /// Id written into the [`RegionMap`]
    pub id: i32,
    /// Pixel count
    pub size: usize,
    /// Index of the border pixel the region grew from
    pub seed_index: usize,
    /// Cluster color the region's pixels were compared against
    pub target: Color,
}

#[derive(Debug, Clone, Default)]
pub struct RegionGrowingBuilder {
    options: RegionGrowingOptions,
}

impl RegionGrowingBuilder {
    #[must_use]
    pub fn new(options: RegionGrowingOptions) -> Self {
        Self { options }
    }
}

/// Grow 4-connected regions from every unclaimed border pixel
///
/// A pixel joins a region when its distance to the region's target color is below
/// `color_distance` and its edge strength is below `edge_limit`. Pixels are claimed when
/// pushed, so no pixel belongs to two regions. Seeds that fail the test themselves start
/// no region.
#[must_use]
pub fn grow_regions(
    pixels: &PixelBuffer,
    edges: &Mask,
    clusters: &ColorClusterSet,
    options: &RegionGrowingOptions,
) -> (RegionMap, Vec<RegionInfo>) {
    let (width, height) = pixels.dimensions();
    let w = width as usize;
    let h = height as usize;
    let edge = edges.as_slice();
    let mut map = RegionMap::new(width, height);
    let mut regions = Vec::new();
    let mut stack = Vec::new();

    let accepts = |idx: usize, target: &Color| {
        pixels.color_at(idx).distance(target) < options.color_distance
            && edge[idx] < options.edge_limit
    };

    for seed in border_indices(width, height) {
        if map.is_assigned(seed) {
            continue;
        }
        let seed_color = pixels.color_at(seed);
        let target = clusters
            .nearest(&seed_color)
            .map_or(seed_color, |(i, _)| clusters.colors()[i]);
        if !accepts(seed, &target) {
            continue;
        }

        let id = regions.len() as i32;
        let mut size = 0;
        map.assign(seed, id);
        stack.push(seed);
        while let Some(idx) = stack.pop() {
            size += 1;
            let (x, y) = (idx % w, idx / w);
            let mut visit = |n: usize| {
                if !map.is_assigned(n) && accepts(n, &target) {
                    map.assign(n, id);
                    stack.push(n);
                }
            };
            if x > 0 {
                visit(idx - 1);
            }
            if x + 1 < w {
                visit(idx + 1);
            }
            if y > 0 {
                visit(idx - w);
            }
            if y + 1 < h {
                visit(idx + w);
            }
        }

        regions.push(RegionInfo {
            id,
            size,
            seed_index: seed,
            target,
        });
    }

    (map, regions)
}

/// Background flag per region, indexed by region id
///
/// The largest region (lowest id on ties) is background when it holds more than
/// `total * min_size_factor * (1 - sensitivity)` pixels. Every other region larger than
/// `largest * (companion_base + companion_slope * sensitivity)` then joins it.
#[must_use]
pub fn classify_background(
    regions: &[RegionInfo],
    total_pixels: usize,
    options: &RegionGrowingOptions,
) -> Vec<bool> {
    let mut background = vec![false; regions.len()];
    let Some(largest) = regions
        .iter()
        .fold(None::<&RegionInfo>, |best, r| match best {
            Some(b) if b.size >= r.size => Some(b),
            _ => Some(r),
        })
    else {
        return background;
    };

    let sensitivity = options.sensitivity.clamp(0.0, 1.0);
    let min_size = total_pixels as f32 * options.min_size_factor * (1.0 - sensitivity);
    if largest.size as f32 <= min_size {
        return background;
    }

    let companion_min =
        largest.size as f32 * (options.companion_base + options.companion_slope * sensitivity);
    for (flag, region) in background.iter_mut().zip(regions) {
        *flag = region.id == largest.id || region.size as f32 > companion_min;
    }
    background
}

impl MaskBuilder for RegionGrowingBuilder {
    fn name(&self) -> &'static str {
        "region_growing"
    }

    #[instrument(skip(self, pixels), fields(width = pixels.width(), height = pixels.height(), sensitivity = self.options.sensitivity))]
    fn build(&self, pixels: &PixelBuffer) -> Result<Mask> {
        ensure_non_empty(pixels)?;
        let opts = &self.options;

        let enhanced = enhance_contrast(pixels, opts.contrast_boost);
        let edges = fused_edge_map(&enhanced);
        let clusters = detect_dominant_colors(
            &enhanced,
            opts.sample_stride,
            opts.clusters,
            opts.iterations,
            0.0,
        );

        let (map, regions) = {
            let _span = span!(Level::DEBUG, "grow_regions", clusters = clusters.len()).entered();
            grow_regions(&enhanced, &edges, &clusters, opts)
        };
        let is_background = classify_background(&regions, pixels.pixel_count(), opts);
        debug!(
            regions = regions.len(),
            background_regions = is_background.iter().filter(|&&bg| bg).count(),
            "regions classified"
        );

        let background: Vec<bool> = map
            .ids()
            .iter()
            .map(|&id| {
                usize::try_from(id)
                    .ok()
                    .and_then(|id| is_background.get(id).copied())
                    .unwrap_or(false)
            })
            .collect();
        Ok(mask_from_background(pixels.width(), pixels.height(), &background))
    }
}
