//! Configuration types for background removal operations
//!
//! A [`RemovalConfig`] carries one options record per mask builder plus the shared
//! refinement and compositing settings. Configurations are immutable for the duration
//! of a request and round-trip through JSON.

use crate::error::{BgRemovalError, Result};
use crate::refine::{FineDetailProtection, RefinementPlan};
use crate::utils::NumericValidator;
use crate::types::MAX_RGB_DISTANCE;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Quality mode shared by refinement and compositing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityMode {
    /// Fewest refinement passes
    Fast,
    /// Linear feathering between the background and opaque cutoffs
    #[default]
    Balanced,
    /// Wider edge analysis and power-law feathering
    High,
    /// Decisive cutout with sharpened alpha transitions
    MacLike,
}

impl std::fmt::Display for QualityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Balanced => write!(f, "balanced"),
            Self::High => write!(f, "high"),
            Self::MacLike => write!(f, "mac_like"),
        }
    }
}

impl FromStr for QualityMode {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "high" => Ok(Self::High),
            "mac_like" | "maclike" | "mac" => Ok(Self::MacLike),
            other => Err(BgRemovalError::invalid_config(format!(
                "unknown quality mode '{other}' (expected fast, balanced, high or mac_like)"
            ))),
        }
    }
}

/// Mask construction strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Let the strategy selector pick a heuristic builder from image statistics
    #[default]
    Auto,
    /// Border-sampled color distance
    BorderColor,
    /// Magic-wand flood fill from border seeds
    FloodFill,
    /// Contrast boost, clustering and edge-bounded region growing
    RegionGrowing,
    /// Quantized border color ranges confirmed by a global histogram
    ColorRange,
    /// Center-box seeded neighbor reclassification
    GrabCut,
    /// Mask produced by the external segmenter
    External,
    /// External mask fused with a border-similarity mask
    Hybrid,
}

impl Strategy {
    /// Whether this strategy needs the external segmenter
    #[must_use]
    pub fn is_learned(self) -> bool {
        matches!(self, Self::External | Self::Hybrid)
    }

    /// All strategies, in declaration order
    #[must_use]
    pub fn all() -> &'static [Strategy] {
        &[
            Self::Auto,
            Self::BorderColor,
            Self::FloodFill,
            Self::RegionGrowing,
            Self::ColorRange,
            Self::GrabCut,
            Self::External,
            Self::Hybrid,
        ]
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::BorderColor => "border_color",
            Self::FloodFill => "flood_fill",
            Self::RegionGrowing => "region_growing",
            Self::ColorRange => "color_range",
            Self::GrabCut => "grab_cut",
            Self::External => "external",
            Self::Hybrid => "hybrid",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Strategy {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.to_ascii_lowercase().replace('-', "_");
        Self::all()
            .iter()
            .copied()
            .find(|strategy| strategy.to_string() == normalized)
            .or(match normalized.as_str() {
                "magic_wand" | "wand" => Some(Self::FloodFill),
                "universal" => Some(Self::RegionGrowing),
                "grabcut" => Some(Self::GrabCut),
                "ai" | "model" => Some(Self::External),
                _ => None,
            })
            .ok_or_else(|| BgRemovalError::invalid_config(format!("unknown strategy '{s}'")))
    }
}

/// Output image format options; all of them carry straight alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    #[default]
    Png,
    /// WebP with alpha channel transparency
    WebP,
    /// TIFF with alpha channel transparency and lossless compression
    Tiff,
    /// Raw RGBA8 pixel data (4 bytes per pixel)
    Rgba8,
}

/// Where the flood fill plants its seeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloodSeeds {
    /// The four image corners
    #[default]
    Corners,
    /// Every border pixel
    AllBorder,
}

/// Options for the border-sampled color-distance builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BorderColorOptions {
    /// Maximum RGB distance to a background cluster for a background pixel
    pub color_threshold: f32,
    /// Maximum local edge strength for a background pixel
    pub edge_threshold: f32,
    /// Number of border sample points
    pub sample_points: usize,
    /// Number of background clusters
    pub clusters: usize,
    /// k-means iterations
    pub iterations: usize,
    /// Keep pixels close to dominant center colors as foreground
    pub exclude_foreground_colors: bool,
    /// Distance under which a pixel counts as a dominant foreground color
    pub foreground_color_distance: f32,
    /// Majority-vote smoothing passes applied during refinement
    pub majority_passes: u32,
}

impl Default for BorderColorOptions {
    fn default() -> Self {
        Self {
            color_threshold: 45.0,
            edge_threshold: 0.15,
            sample_points: 12,
            clusters: 3,
            iterations: 5,
            exclude_foreground_colors: true,
            foreground_color_distance: 40.0,
            majority_passes: 3,
        }
    }
}

/// Options for the flood-fill ("magic wand") builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodFillOptions {
    /// Maximum RGB distance to the seed color
    pub tolerance: f32,
    /// Seed placement
    pub seeds: FloodSeeds,
}

impl Default for FloodFillOptions {
    fn default() -> Self {
        Self {
            tolerance: 30.0,
            seeds: FloodSeeds::Corners,
        }
    }
}

/// Options for the region-growing ("universal") builder
///
/// The size factors are empirical and kept configurable for calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionGrowingOptions {
    /// Background eagerness in [0,1]
    pub sensitivity: f32,
    /// HSL lightness contrast factor applied before segmentation
    pub contrast_boost: f32,
    /// Number of dominant color clusters
    pub clusters: usize,
    /// k-means iterations
    pub iterations: usize,
    /// Sample every n-th pixel for clustering
    pub sample_stride: usize,
    /// Maximum distance to the region's target cluster
    pub color_distance: f32,
    /// Regions never cross pixels with edge strength at or above this
    pub edge_limit: f32,
    /// Minimum background region size as a fraction of the image, scaled by `1 - sensitivity`
    pub min_size_factor: f32,
    /// Companion regions must exceed the largest region times `base + slope * sensitivity`
    pub companion_base: f32,
    /// See `companion_base`
    pub companion_slope: f32,
}

impl Default for RegionGrowingOptions {
    fn default() -> Self {
        Self {
            sensitivity: 0.8,
            contrast_boost: 1.2,
            clusters: 8,
            iterations: 10,
            sample_stride: 4,
            color_distance: 50.0,
            edge_limit: 0.3,
            min_size_factor: 0.1,
            companion_base: 0.3,
            companion_slope: 0.4,
        }
    }
}

/// Options for the color-range builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorRangeOptions {
    /// Border colors are snapped to multiples of this step
    pub quantization: u8,
    /// Number of most frequent border colors kept
    pub top_border_colors: usize,
    /// Pixels within this distance of a confirmed color are background
    pub distance: f32,
    /// Stride of the whole-image histogram
    pub histogram_stride: usize,
    /// Number of most frequent whole-image colors used for confirmation
    pub histogram_top: usize,
    /// A border color is confirmed when a frequent image color lies within this distance
    pub confirm_distance: f32,
}

impl Default for ColorRangeOptions {
    fn default() -> Self {
        Self {
            quantization: 8,
            top_border_colors: 3,
            distance: 40.0,
            histogram_stride: 4,
            histogram_top: 10,
            confirm_distance: 20.0,
        }
    }
}

/// Options for the grab-cut style builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrabCutOptions {
    /// Side of the centered foreground box as a fraction of the image
    pub box_fraction: f32,
    /// Reclassification passes
    pub iterations: usize,
}

impl Default for GrabCutOptions {
    fn default() -> Self {
        Self {
            box_fraction: 0.7,
            iterations: 3,
        }
    }
}

/// Options for the external-mask adapter and its refinement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalMaskOptions {
    /// Binarization point applied to the raw probability map
    pub mask_threshold: f32,
    /// Mask values below this become fully transparent
    pub foreground_threshold: f32,
    /// Gaussian smoothing radius after binarization
    pub edge_blur: u32,
    /// Sharpen alpha transitions regardless of quality mode
    pub aggressive: bool,
    /// Run the portrait enhancement passes
    pub enhance: bool,
    /// Sample mean above which the raw mask is treated as background confidence
    pub inversion_mean: f32,
    /// Number of leading values inspected by the inversion check
    pub inversion_samples: usize,
}

impl Default for ExternalMaskOptions {
    fn default() -> Self {
        Self::balanced()
    }
}

impl ExternalMaskOptions {
    /// Conservative thresholds with enhancement enabled
    #[must_use]
    pub fn balanced() -> Self {
        Self {
            mask_threshold: 0.65,
            foreground_threshold: 0.55,
            edge_blur: 2,
            aggressive: false,
            enhance: true,
            inversion_mean: 0.7,
            inversion_samples: 1000,
        }
    }

    /// Low thresholds and decisive transitions
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            mask_threshold: 0.25,
            foreground_threshold: 0.08,
            aggressive: true,
            enhance: false,
            ..Self::balanced()
        }
    }
}

/// Options for the feature-driven strategy selector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorOptions {
    /// Random border-adjacent samples
    pub border_samples: usize,
    /// Random center-region samples
    pub center_samples: usize,
    /// Border color spread below which the background is uniform
    pub uniform_variance: f32,
    /// Border/center contrast above which separation is high
    pub high_contrast: f32,
    /// Flood-fill tolerance used when the selector picks the flood fill
    pub uniform_tolerance: f32,
    /// Sampler seed
    pub seed: u64,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            border_samples: 100,
            center_samples: 100,
            uniform_variance: 30.0,
            high_contrast: 80.0,
            uniform_tolerance: 25.0,
            seed: 0x5EED_0F_B0_4D_E7,
        }
    }
}

/// Configuration for background removal operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalConfig {
    /// Mask construction strategy
    pub strategy: Strategy,
    /// Quality mode for refinement and compositing
    pub quality_mode: QualityMode,
    /// Gaussian edge smoothing radius (0 disables)
    pub edge_smooth_radius: u32,
    /// Median filter passes
    pub noise_reduction_passes: u32,
    /// Border-color builder options
    pub border_color: BorderColorOptions,
    /// Flood-fill builder options
    pub flood_fill: FloodFillOptions,
    /// Region-growing builder options
    pub region_growing: RegionGrowingOptions,
    /// Color-range builder options
    pub color_range: ColorRangeOptions,
    /// Grab-cut builder options
    pub grab_cut: GrabCutOptions,
    /// External-mask adapter options
    pub external: ExternalMaskOptions,
    /// Strategy selector options
    pub selector: SelectorOptions,
    /// Fine-detail (hair) protection, disabled when `None`
    pub fine_detail_protection: Option<FineDetailProtection>,
    /// Caller-supplied refinement plan replacing the per-strategy default
    pub refinement_override: Option<RefinementPlan>,
    /// Time budget for one external segmenter call (milliseconds)
    pub segmenter_timeout_ms: u64,
    /// Heuristic strategy used when the learned path fails
    pub fallback_strategy: Strategy,
    /// Output format
    pub output_format: OutputFormat,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Auto,
            quality_mode: QualityMode::Balanced,
            edge_smooth_radius: 3,
            noise_reduction_passes: 2,
            border_color: BorderColorOptions::default(),
            flood_fill: FloodFillOptions::default(),
            region_growing: RegionGrowingOptions::default(),
            color_range: ColorRangeOptions::default(),
            grab_cut: GrabCutOptions::default(),
            external: ExternalMaskOptions::default(),
            selector: SelectorOptions::default(),
            fine_detail_protection: None,
            refinement_override: None,
            segmenter_timeout_ms: 30_000,
            fallback_strategy: Strategy::Auto,
            output_format: OutputFormat::Png,
        }
    }
}

impl RemovalConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use bgcutout::{QualityMode, RemovalConfig, Strategy};
    ///
    /// let config = RemovalConfig::builder()
    ///     .strategy(Strategy::FloodFill)
    ///     .tolerance(20.0)
    ///     .quality_mode(QualityMode::High)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.flood_fill.tolerance, 20.0);
    /// ```
    #[must_use]
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder::default()
    }

    /// Segmenter time budget as a `Duration`
    #[must_use]
    pub fn segmenter_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.segmenter_timeout_ms)
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    ///
    /// # Errors
    /// - `InvalidConfig` for malformed JSON or out-of-range values
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| BgRemovalError::invalid_config(format!("invalid JSON config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BgRemovalError::internal(format!("failed to serialize config: {e}")))
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - `InvalidConfig` naming the first parameter outside its valid range
    pub fn validate(&self) -> Result<()> {
        let max_distance = MAX_RGB_DISTANCE;

        let bc = &self.border_color;
        NumericValidator::validate_range(bc.color_threshold, 0.0, max_distance, "color_threshold")?;
        NumericValidator::validate_percentage(bc.edge_threshold, "edge_threshold")?;
        NumericValidator::validate_range(bc.sample_points, 4, 4096, "sample_points")?;
        NumericValidator::validate_range(bc.clusters, 1, 16, "border clusters")?;
        NumericValidator::validate_range(bc.iterations, 1, 100, "border iterations")?;
        NumericValidator::validate_range(
            bc.foreground_color_distance,
            0.0,
            max_distance,
            "foreground_color_distance",
        )?;
        NumericValidator::validate_range(bc.majority_passes, 0, 16, "majority_passes")?;

        NumericValidator::validate_range(self.flood_fill.tolerance, 0.0, max_distance, "tolerance")?;

        let rg = &self.region_growing;
        if !(0.0..=1.0).contains(&rg.sensitivity) || !rg.sensitivity.is_finite() {
            return Err(BgRemovalError::config_value_error(
                "sensitivity",
                rg.sensitivity,
                "0.0-1.0",
                Some(0.8),
            ));
        }
        if !(rg.contrast_boost > 0.0 && rg.contrast_boost <= 5.0) {
            return Err(BgRemovalError::config_value_error(
                "contrast_boost",
                rg.contrast_boost,
                "(0.0, 5.0]",
                Some(1.2),
            ));
        }
        NumericValidator::validate_range(rg.clusters, 1, 32, "region clusters")?;
        NumericValidator::validate_range(rg.iterations, 1, 100, "region iterations")?;
        NumericValidator::validate_range(rg.sample_stride, 1, 1024, "sample_stride")?;
        NumericValidator::validate_range(rg.color_distance, 0.0, max_distance, "color_distance")?;
        NumericValidator::validate_percentage(rg.edge_limit, "edge_limit")?;
        NumericValidator::validate_percentage(rg.min_size_factor, "min_size_factor")?;
        NumericValidator::validate_range(rg.companion_base, 0.0, 10.0, "companion_base")?;
        NumericValidator::validate_range(rg.companion_slope, 0.0, 10.0, "companion_slope")?;

        let cr = &self.color_range;
        NumericValidator::validate_range(cr.quantization, 1, 128, "quantization")?;
        NumericValidator::validate_range(cr.top_border_colors, 1, 64, "top_border_colors")?;
        NumericValidator::validate_range(cr.distance, 0.0, max_distance, "color range distance")?;
        NumericValidator::validate_range(cr.histogram_stride, 1, 1024, "histogram_stride")?;
        NumericValidator::validate_range(cr.histogram_top, 1, 1024, "histogram_top")?;
        NumericValidator::validate_range(cr.confirm_distance, 0.0, max_distance, "confirm_distance")?;

        if !(self.grab_cut.box_fraction > 0.0 && self.grab_cut.box_fraction <= 1.0) {
            return Err(BgRemovalError::config_value_error(
                "box_fraction",
                self.grab_cut.box_fraction,
                "(0.0, 1.0]",
                Some(0.7),
            ));
        }
        NumericValidator::validate_range(self.grab_cut.iterations, 0, 20, "grab_cut iterations")?;

        let ext = &self.external;
        NumericValidator::validate_percentage(ext.mask_threshold, "mask_threshold")?;
        NumericValidator::validate_percentage(ext.foreground_threshold, "foreground_threshold")?;
        NumericValidator::validate_range(ext.edge_blur, 0, 16, "edge_blur")?;
        NumericValidator::validate_percentage(ext.inversion_mean, "inversion_mean")?;
        NumericValidator::validate_range(ext.inversion_samples, 1, usize::MAX, "inversion_samples")?;

        let sel = &self.selector;
        NumericValidator::validate_range(sel.border_samples, 1, 100_000, "border_samples")?;
        NumericValidator::validate_range(sel.center_samples, 1, 100_000, "center_samples")?;
        NumericValidator::validate_range(sel.uniform_variance, 0.0, max_distance, "uniform_variance")?;
        NumericValidator::validate_range(sel.high_contrast, 0.0, max_distance, "high_contrast")?;
        NumericValidator::validate_range(sel.uniform_tolerance, 0.0, max_distance, "uniform_tolerance")?;

        if let Some(protection) = &self.fine_detail_protection {
            protection.validate()?;
        }
        if let Some(plan) = &self.refinement_override {
            plan.validate()?;
        }

        NumericValidator::validate_range(self.edge_smooth_radius, 0, 16, "edge_smooth_radius")?;
        NumericValidator::validate_range(self.noise_reduction_passes, 0, 16, "noise_reduction_passes")?;

        if self.segmenter_timeout_ms == 0 {
            return Err(BgRemovalError::config_value_error(
                "segmenter_timeout_ms",
                self.segmenter_timeout_ms,
                "> 0",
                Some(30_000),
            ));
        }

        if self.fallback_strategy.is_learned() {
            return Err(BgRemovalError::invalid_config(format!(
                "fallback strategy must be heuristic, got '{}'",
                self.fallback_strategy
            )));
        }

        Ok(())
    }
}

/// Builder for `RemovalConfig`
#[derive(Debug, Default)]
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    /// Set the mask construction strategy
    #[must_use]
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Set the quality mode
    #[must_use]
    pub fn quality_mode(mut self, mode: QualityMode) -> Self {
        self.config.quality_mode = mode;
        self
    }

    /// Set the Gaussian edge smoothing radius
    #[must_use]
    pub fn edge_smooth_radius(mut self, radius: u32) -> Self {
        self.config.edge_smooth_radius = radius;
        self
    }

    /// Set the number of median filter passes
    #[must_use]
    pub fn noise_reduction_passes(mut self, passes: u32) -> Self {
        self.config.noise_reduction_passes = passes;
        self
    }

    /// Set the border-color distance threshold
    #[must_use]
    pub fn color_threshold(mut self, threshold: f32) -> Self {
        self.config.border_color.color_threshold = threshold;
        self
    }

    /// Set the flood-fill tolerance
    #[must_use]
    pub fn tolerance(mut self, tolerance: f32) -> Self {
        self.config.flood_fill.tolerance = tolerance;
        self
    }

    /// Set the flood-fill seed placement
    #[must_use]
    pub fn flood_seeds(mut self, seeds: FloodSeeds) -> Self {
        self.config.flood_fill.seeds = seeds;
        self
    }

    /// Set region-growing sensitivity
    #[must_use]
    pub fn sensitivity(mut self, sensitivity: f32) -> Self {
        self.config.region_growing.sensitivity = sensitivity;
        self
    }

    /// Set region-growing contrast boost
    #[must_use]
    pub fn contrast_boost(mut self, boost: f32) -> Self {
        self.config.region_growing.contrast_boost = boost;
        self
    }

    /// Replace the border-color options
    #[must_use]
    pub fn border_color_options(mut self, options: BorderColorOptions) -> Self {
        self.config.border_color = options;
        self
    }

    /// Replace the region-growing options
    #[must_use]
    pub fn region_growing_options(mut self, options: RegionGrowingOptions) -> Self {
        self.config.region_growing = options;
        self
    }

    /// Replace the color-range options
    #[must_use]
    pub fn color_range_options(mut self, options: ColorRangeOptions) -> Self {
        self.config.color_range = options;
        self
    }

    /// Replace the grab-cut options
    #[must_use]
    pub fn grab_cut_options(mut self, options: GrabCutOptions) -> Self {
        self.config.grab_cut = options;
        self
    }

    /// Replace the external-mask options
    #[must_use]
    pub fn external_options(mut self, options: ExternalMaskOptions) -> Self {
        self.config.external = options;
        self
    }

    /// Aggressive external-mask preset with the mac-like quality mode
    #[must_use]
    pub fn aggressive_external(mut self) -> Self {
        self.config.external = ExternalMaskOptions::aggressive();
        self.config.quality_mode = QualityMode::MacLike;
        self
    }

    /// Replace the selector options
    #[must_use]
    pub fn selector_options(mut self, options: SelectorOptions) -> Self {
        self.config.selector = options;
        self
    }

    /// Enable fine-detail protection with default parameters
    #[must_use]
    pub fn hair_protection(mut self, enabled: bool) -> Self {
        self.config.fine_detail_protection = enabled.then(FineDetailProtection::default);
        self
    }

    /// Replace the per-strategy refinement plan
    #[must_use]
    pub fn refinement_plan(mut self, plan: RefinementPlan) -> Self {
        self.config.refinement_override = Some(plan);
        self
    }

    /// Set the external segmenter time budget
    #[must_use]
    pub fn segmenter_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.segmenter_timeout_ms = timeout_ms;
        self
    }

    /// Set the heuristic fallback strategy
    #[must_use]
    pub fn fallback_strategy(mut self, strategy: Strategy) -> Self {
        self.config.fallback_strategy = strategy;
        self
    }

    /// Set output format
    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - `InvalidConfig` when any value is out of range
    pub fn build(self) -> Result<RemovalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
