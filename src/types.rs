//! Core data types: pixel buffers, masks, colors, region maps and results

use crate::config::{OutputFormat, QualityMode, Strategy};
use crate::error::{BgRemovalError, Result};
use crate::selector::ImageFeatures;
use crate::utils::parallel;
use chrono::{DateTime, Utc};
use image::{DynamicImage, GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest possible Euclidean distance between two RGB colors (`sqrt(3) * 255`)
pub const MAX_RGB_DISTANCE: f32 = 441.672_96;

/// Dense row-major RGBA8 image owned by the caller
///
/// The pipeline only reads it; compositing works on a copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA samples
    ///
    /// # Errors
    /// - `InvalidImage` for a zero-area image or a sample count other than `width * height * 4`
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(BgRemovalError::invalid_image(format!(
                "zero-area image ({width}x{height})"
            )));
        }
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(BgRemovalError::invalid_image(format!(
                "expected {expected} RGBA bytes for {width}x{height}, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Image where every pixel has the same RGBA value
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        Self::from_fn(width, height, |_, _| rgba)
    }

    /// Image built by evaluating `f(x, y)` for every pixel
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Result<Self>
    where
        F: FnMut(u32, u32) -> [u8; 4],
    {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self::new(width, height, data)
    }

    /// Convert any decoded image to RGBA8
    pub fn from_dynamic_image(image: &DynamicImage) -> Result<Self> {
        Self::from_rgba_image(image.to_rgba8())
    }

    /// Take ownership of an `RgbaImage`
    pub fn from_rgba_image(image: RgbaImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw())
    }

    /// Copy into an `RgbaImage` for encoding
    pub fn to_rgba_image(&self) -> Result<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| BgRemovalError::internal("pixel buffer length out of sync"))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of pixels (`width * height`)
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Raw RGBA samples
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Linear pixel index of `(x, y)`
    #[must_use]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// RGB of the pixel at linear index `index`
    #[must_use]
    pub fn color_at(&self, index: usize) -> Color {
        let offset = index * 4;
        Color::new(
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        )
    }

    /// RGB of the pixel at `(x, y)`
    #[must_use]
    pub fn color_xy(&self, x: u32, y: u32) -> Color {
        self.color_at(self.index(x, y))
    }

    /// Alpha of the pixel at linear index `index`
    #[must_use]
    pub fn alpha_at(&self, index: usize) -> u8 {
        self.data[index * 4 + 3]
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// An (r, g, b) triple without alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Euclidean RGB distance
    #[must_use]
    pub fn distance(&self, other: &Color) -> f32 {
        self.distance_squared(other).sqrt()
    }

    #[must_use]
    pub fn distance_squared(&self, other: &Color) -> f32 {
        let dr = f32::from(self.r) - f32::from(other.r);
        let dg = f32::from(self.g) - f32::from(other.g);
        let db = f32::from(self.b) - f32::from(other.b);
        dr * dr + dg * dg + db * db
    }

    /// Plain channel average `(r + g + b) / 3`, the gray level used by the edge extractors
    #[must_use]
    pub fn brightness(&self) -> f32 {
        (f32::from(self.r) + f32::from(self.g) + f32::from(self.b)) / 3.0
    }

    /// Similarity in [0,1]: `1 - distance / MAX_RGB_DISTANCE`
    #[must_use]
    pub fn similarity(&self, other: &Color) -> f32 {
        (1.0 - self.distance(other) / MAX_RGB_DISTANCE).clamp(0.0, 1.0)
    }

    /// Center of the `step`-wide bucket holding each channel
    #[must_use]
    pub fn bucket(&self, step: u8) -> Self {
        if step <= 1 {
            return *self;
        }
        let snap = |c: u8| (c / step * step).saturating_add(step / 2);
        Self::new(snap(self.r), snap(self.g), snap(self.b))
    }

    /// Rounded mean of accumulated channel sums, `None` for an empty accumulator
    #[must_use]
    pub fn from_sums(sums: [u64; 3], count: u64) -> Option<Self> {
        if count == 0 {
            return None;
        }
        let mean = |sum: u64| ((sum as f64 / count as f64).round()).clamp(0.0, 255.0) as u8;
        Some(Self::new(mean(sums[0]), mean(sums[1]), mean(sums[2])))
    }
}

/// Ordered list of cluster centroids
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColorClusterSet {
    colors: Vec<Color>,
}

impl ColorClusterSet {
    #[must_use]
    pub fn new(colors: Vec<Color>) -> Self {
        Self { colors }
    }

    #[must_use]
    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Color> {
        self.colors.iter()
    }

    /// Index of and distance to the closest centroid; ties resolve to the lowest index
    #[must_use]
    pub fn nearest(&self, color: &Color) -> Option<(usize, f32)> {
        let mut best: Option<(usize, f32)> = None;
        for (i, centroid) in self.colors.iter().enumerate() {
            let d = centroid.distance_squared(color);
            match best {
                Some((_, best_d)) if d >= best_d => {},
                _ => best = Some((i, d)),
            }
        }
        best.map(|(i, d)| (i, d.sqrt()))
    }

    /// Distance to the closest centroid
    #[must_use]
    pub fn min_distance(&self, color: &Color) -> Option<f32> {
        self.nearest(color).map(|(_, d)| d)
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Color> {
        self.colors
    }
}

impl FromIterator<Color> for ColorClusterSet {
    fn from_iter<I: IntoIterator<Item = Color>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Per-pixel foreground confidence in [0,1], row-major
///
/// 0 is certain background, 1 certain foreground. Every constructor clamps its input and
/// maps non-finite values to 0, so a `Mask` never carries values outside [0,1].
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Mask {
    /// Wrap raw values
    ///
    /// # Errors
    /// - `InvalidImage` for a zero-area mask or a value count other than `width * height`
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(BgRemovalError::invalid_image(format!(
                "zero-area mask ({width}x{height})"
            )));
        }
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(BgRemovalError::invalid_image(format!(
                "expected {expected} mask values for {width}x{height}, got {}",
                data.len()
            )));
        }
        Ok(Self::from_vec_unchecked(width, height, data))
    }

    /// Construct from a vector whose length is already known to match
    pub(crate) fn from_vec_unchecked(width: u32, height: u32, mut data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        for value in &mut data {
            *value = sanitize(*value);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Mask with the same value everywhere
    #[must_use]
    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![sanitize(value); width as usize * height as usize],
        }
    }

    /// Mask built from `f(x, y)`; rows are evaluated in parallel on large masks
    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(u32, u32) -> f32 + Sync + Send,
    {
        let data = parallel::map_pixels(width as usize, height as usize, |x, y| {
            f(x as u32, y as u32)
        });
        Self::from_vec_unchecked(width, height, data)
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Value at `(x, y)`
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Fail with `InvalidImage` unless this mask matches the pixel buffer's dimensions
    pub fn ensure_matches(&self, pixels: &PixelBuffer) -> Result<()> {
        if self.dimensions() == pixels.dimensions() {
            Ok(())
        } else {
            Err(BgRemovalError::dimension_mismatch(
                pixels.dimensions(),
                self.dimensions(),
            ))
        }
    }

    /// Apply `f` to every value, clamping the result
    #[must_use]
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f32) -> f32,
    {
        let data = self.data.iter().map(|&v| sanitize(f(v))).collect();
        Self {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// `v -> 1 - v`
    #[must_use]
    pub fn inverted(&self) -> Self {
        self.map(|v| 1.0 - v)
    }

    #[must_use]
    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        (self.data.iter().map(|&v| f64::from(v)).sum::<f64>() / self.data.len() as f64) as f32
    }

    /// Summary counts used for metadata and tests
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total = self.data.len().max(1) as f32;
        let mut foreground = 0usize;
        let mut opaque = 0usize;
        let mut transparent = 0usize;
        for &v in &self.data {
            if v >= 0.5 {
                foreground += 1;
            }
            if v >= 0.95 {
                opaque += 1;
            } else if v <= 0.05 {
                transparent += 1;
            }
        }
        MaskStatistics {
            mean: self.mean(),
            foreground_fraction: foreground as f32 / total,
            opaque_fraction: opaque as f32 / total,
            transparent_fraction: transparent as f32 / total,
            uncertain_fraction: (self.data.len() - opaque - transparent) as f32 / total,
        }
    }

    /// 8-bit grayscale rendering of the mask
    #[must_use]
    pub fn to_luma_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([(self.get(x, y) * 255.0).round() as u8])
        })
    }
}

/// Summary of a mask's value distribution
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MaskStatistics {
    /// Mean mask value
    pub mean: f32,
    /// Fraction of pixels with value >= 0.5
    pub foreground_fraction: f32,
    /// Fraction of pixels with value >= 0.95
    pub opaque_fraction: f32,
    /// Fraction of pixels with value <= 0.05
    pub transparent_fraction: f32,
    /// Everything in between
    pub uncertain_fraction: f32,
}

/// Sentinel region id for pixels not claimed by any region
pub const UNASSIGNED_REGION: i32 = -1;

/// Dense row-major region ids produced by region growing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionMap {
    width: u32,
    height: u32,
    ids: Vec<i32>,
}

impl RegionMap {
    /// Map with every pixel unassigned
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ids: vec![UNASSIGNED_REGION; width as usize * height as usize],
        }
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn ids(&self) -> &[i32] {
        &self.ids
    }

    #[must_use]
    pub fn get(&self, index: usize) -> i32 {
        self.ids[index]
    }

    #[must_use]
    pub fn is_assigned(&self, index: usize) -> bool {
        self.ids[index] != UNASSIGNED_REGION
    }

    pub(crate) fn assign(&mut self, index: usize, id: i32) {
        self.ids[index] = id;
    }

    /// Pixel count per region id
    #[must_use]
    pub fn region_sizes(&self) -> Vec<usize> {
        let mut sizes: Vec<usize> = Vec::new();
        for &id in &self.ids {
            if let Ok(id) = usize::try_from(id) {
                if id >= sizes.len() {
                    sizes.resize(id + 1, 0);
                }
                sizes[id] += 1;
            }
        }
        sizes
    }
}

/// Processing timing breakdown
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Input decode time (milliseconds)
    pub image_decode_ms: u64,
    /// Strategy selection time (milliseconds)
    pub selection_ms: u64,
    /// External segmenter time including timeout waits (milliseconds)
    pub segmentation_ms: u64,
    /// Mask builder time (milliseconds)
    pub mask_build_ms: u64,
    /// Refinement plan time (milliseconds)
    pub refinement_ms: u64,
    /// Compositing time (milliseconds)
    pub compositing_ms: u64,
    /// Total processing time (milliseconds)
    pub total_ms: u64,
}

/// Metadata describing how a result was produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    /// Strategy the caller asked for
    pub requested_strategy: Strategy,
    /// Strategy whose mask was actually used
    pub strategy: Strategy,
    /// Quality mode in effect
    pub quality_mode: QualityMode,
    /// Image dimensions
    pub dimensions: (u32, u32),
    /// Set when the learned path failed and a heuristic builder produced the mask
    pub degraded: Option<String>,
    /// Features measured by the strategy selector, when it ran
    pub selector_features: Option<ImageFeatures>,
    /// Final mask statistics
    pub mask_statistics: MaskStatistics,
    /// Timing breakdown
    pub timings: ProcessingTimings,
    /// Completion timestamp
    pub processed_at: DateTime<Utc>,
}

/// Output of one background removal request
#[derive(Debug, Clone)]
pub struct RemovalResult {
    /// Source pixels with the alpha channel rewritten
    pub image: PixelBuffer,
    /// Final refined mask
    pub mask: Mask,
    /// Processing metadata
    pub metadata: ProcessingMetadata,
}

impl RemovalResult {
    /// Whether the result came from the fallback path
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.metadata.degraded.is_some()
    }

    /// Encode the output image
    pub fn to_bytes(&self, format: OutputFormat) -> Result<Vec<u8>> {
        crate::services::ImageIOService::encode(&self.image, format)
    }

    /// Encode as PNG (straight alpha)
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        self.to_bytes(OutputFormat::Png)
    }

    /// Write the output image to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P, format: OutputFormat) -> Result<()> {
        crate::services::ImageIOService::save(&self.image, path, format)
    }

    /// Write the final mask as an 8-bit grayscale PNG
    pub fn save_mask<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.mask
            .to_luma_image()
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}
