//! Conversion of CLI arguments into a [`RemovalConfig`]

use crate::cli::main_impl::{Cli, CliOutputFormat, CliQuality, CliStrategy};
use crate::config::{ExternalMaskOptions, OutputFormat, QualityMode, RemovalConfig, Strategy};
use crate::refine::FineDetailProtection;
use anyhow::{Context, Result};

/// Convert CLI arguments to a validated [`RemovalConfig`]
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the removal configuration: `--config` file first, flags on top
    pub(crate) fn from_cli(cli: &Cli) -> Result<RemovalConfig> {
        let mut config = match &cli.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {path}"))?;
                RemovalConfig::from_json_str(&json)
                    .with_context(|| format!("Failed to parse config file: {path}"))?
            },
            None => RemovalConfig::default(),
        };

        if let Some(strategy) = cli.strategy {
            config.strategy = Self::convert_strategy(strategy);
        }
        if let Some(quality) = cli.quality {
            config.quality_mode = Self::convert_quality(quality);
        }
        if cli.aggressive {
            config.external = ExternalMaskOptions::aggressive();
            config.quality_mode = QualityMode::MacLike;
        }
        if let Some(tolerance) = cli.tolerance {
            config.flood_fill.tolerance = tolerance;
        }
        if let Some(sensitivity) = cli.sensitivity {
            config.region_growing.sensitivity = sensitivity;
        }
        if let Some(threshold) = cli.color_threshold {
            config.border_color.color_threshold = threshold;
        }
        if let Some(radius) = cli.edge_smooth {
            config.edge_smooth_radius = radius;
        }
        if let Some(passes) = cli.noise_reduction {
            config.noise_reduction_passes = passes;
        }
        if cli.hair_protection {
            config.fine_detail_protection = Some(FineDetailProtection::default());
        }
        if let Some(timeout_ms) = cli.timeout_ms {
            config.segmenter_timeout_ms = timeout_ms;
        }
        if let Some(fallback) = cli.fallback {
            config.fallback_strategy = Self::convert_strategy(fallback);
        }
        config.output_format = Self::convert_output_format(cli.format);

        config.validate().context("Invalid removal configuration")?;
        Ok(config)
    }

    /// Argument combinations clap cannot express
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if cli.input.len() > 1 && cli.output.as_deref() == Some("-") {
            anyhow::bail!("Cannot use stdout (-) as output when processing multiple inputs");
        }

        let wants_learned = cli.strategy.is_some_and(|s| Self::convert_strategy(s).is_learned());
        if wants_learned && !Self::has_model(cli) {
            log::warn!(
                "Strategy requires an external segmenter but no --model was given; \
                 results will come from the fallback strategy"
            );
        }
        Ok(())
    }

    #[cfg(feature = "tract")]
    fn has_model(cli: &Cli) -> bool {
        cli.model.is_some()
    }

    #[cfg(not(feature = "tract"))]
    fn has_model(_cli: &Cli) -> bool {
        false
    }

    pub(crate) fn convert_strategy(strategy: CliStrategy) -> Strategy {
        match strategy {
            CliStrategy::Auto => Strategy::Auto,
            CliStrategy::BorderColor => Strategy::BorderColor,
            CliStrategy::FloodFill => Strategy::FloodFill,
            CliStrategy::RegionGrowing => Strategy::RegionGrowing,
            CliStrategy::ColorRange => Strategy::ColorRange,
            CliStrategy::GrabCut => Strategy::GrabCut,
            CliStrategy::External => Strategy::External,
            CliStrategy::Hybrid => Strategy::Hybrid,
        }
    }

    pub(crate) fn convert_quality(quality: CliQuality) -> QualityMode {
        match quality {
            CliQuality::Fast => QualityMode::Fast,
            CliQuality::Balanced => QualityMode::Balanced,
            CliQuality::High => QualityMode::High,
            CliQuality::MacLike => QualityMode::MacLike,
        }
    }

    pub(crate) fn convert_output_format(format: CliOutputFormat) -> OutputFormat {
        match format {
            CliOutputFormat::Png => OutputFormat::Png,
            CliOutputFormat::Webp => OutputFormat::WebP,
            CliOutputFormat::Tiff => OutputFormat::Tiff,
            CliOutputFormat::Rgba8 => OutputFormat::Rgba8,
        }
    }
}
