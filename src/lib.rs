#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # bgcutout
//!
//! Background removal for still images. Given RGBA pixels, bgcutout builds a per-pixel
//! foreground confidence mask, refines it and rewrites the alpha channel so the
//! background becomes transparent.
//!
//! ## Features
//!
//! - **Heuristic builders**: border-color distance, flood fill, region growing,
//!   color range and a grabcut-style refinement, all pure Rust
//! - **Automatic strategy selection** from cheap border/center statistics
//! - **External segmenters**: plug any model in through the async [`ExternalSegmenter`]
//!   trait; a Tract ONNX implementation ships behind the `tract` feature
//! - **Graceful degradation**: a failing, slow or empty segmenter falls back to a
//!   heuristic builder once, and the result says so
//! - **Refinement engine**: morphology, median/box/Gaussian filters, decisive alpha
//!   remaps and fine-detail protection, all data-parallel with `rayon`
//! - **CLI Integration**: optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgcutout::{BackgroundRemovalProcessor, OutputFormat, RemovalConfig, Strategy};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = RemovalConfig::builder()
//!     .strategy(Strategy::FloodFill)
//!     .tolerance(25.0)
//!     .build()?;
//! let processor = BackgroundRemovalProcessor::new(config)?;
//!
//! let result = processor
//!     .process_file("input.jpg", &CancellationToken::new())
//!     .await?;
//! result.save("output.png", OutputFormat::Png)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## External segmenters
//!
//! ```rust,no_run
//! use bgcutout::{
//!     segmenter::{tract::TractSegmenter, SegmenterHandle},
//!     BackgroundRemovalProcessor, RemovalConfig, Strategy,
//! };
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = RemovalConfig::builder()
//!     .strategy(Strategy::External)
//!     .hair_protection(true)
//!     .build()?;
//! let segmenter = SegmenterHandle::new(TractSegmenter::new("u2netp.onnx"), Duration::from_secs(30));
//! let mut processor = BackgroundRemovalProcessor::new(config)?.with_segmenter(segmenter);
//! processor.initialize().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `tract` (default): pure Rust ONNX segmenter
//! - `cli` (default): command-line interface and progress reporting
//! - `webp-support` (default): WebP input and output
//! - `tracing-json`: JSON log output for the CLI
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! bgcutout = { version = "0.1", default-features = false }
//! ```

pub mod builders;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod features;
pub mod processor;
pub mod refine;
pub mod segmenter;
pub mod selector;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

// Public API exports
pub use builders::{MaskBuilder, RawMask};
pub use compositor::{composite, CompositeOptions};
pub use config::{
    BorderColorOptions, ColorRangeOptions, ExternalMaskOptions, FloodFillOptions, FloodSeeds,
    GrabCutOptions, OutputFormat, QualityMode, RegionGrowingOptions, RemovalConfig,
    RemovalConfigBuilder, SelectorOptions, Strategy,
};
pub use error::{BgRemovalError, Result};
pub use processor::BackgroundRemovalProcessor;
pub use refine::{BorderMode, FineDetailProtection, RefinementPlan, RefinementStep};
pub use segmenter::{ExternalSegmenter, SegmenterHandle};
pub use selector::{ImageFeatures, StrategySelector};
pub use services::{
    ImageIOService, NoOpProgressReporter, OutputFormatHandler, ProcessingStage, ProgressReporter, ProgressTracker,
    ProgressUpdate,
};
pub use types::{
    Color, Mask, MaskStatistics, PixelBuffer, ProcessingMetadata, ProcessingTimings,
    RemovalResult,
};
pub use utils::NumericValidator;

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Remove the background from an encoded image with the heuristic pipeline
///
/// Learned strategies need a segmenter; configure a [`BackgroundRemovalProcessor`]
/// with one for those. Without it they degrade to `config.fallback_strategy`.
///
/// # Examples
/// ```rust,no_run
/// use bgcutout::{remove_background_from_bytes, RemovalConfig};
///
/// # async fn example(upload_bytes: Vec<u8>) -> anyhow::Result<()> {
/// let config = RemovalConfig::default();
/// let result = remove_background_from_bytes(&upload_bytes, &config).await?;
/// let png = result.to_png_bytes()?;
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_bytes(
    image_bytes: &[u8],
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let processor = BackgroundRemovalProcessor::new(config.clone())?;
    processor
        .process_bytes(image_bytes, &CancellationToken::new())
        .await
}

/// Remove the background from an async reader stream
///
/// # Examples
/// ```rust,no_run
/// use bgcutout::{remove_background_from_reader, RemovalConfig};
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let file = File::open("photo.jpg").await?;
/// let result = remove_background_from_reader(file, &RemovalConfig::default()).await?;
/// result.save_mask("mask.png")?;
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer).await?;
    remove_background_from_bytes(&buffer, config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bytes_api_removes_uniform_border() {
        let pixels = PixelBuffer::from_fn(20, 20, |x, y| {
            if (6..14).contains(&x) && (6..14).contains(&y) {
                [200, 30, 30, 255]
            } else {
                [255, 255, 255, 255]
            }
        })
        .unwrap();
        let bytes = ImageIOService::encode(&pixels, OutputFormat::Png).unwrap();
        let config = RemovalConfig::builder()
            .strategy(Strategy::FloodFill)
            .build()
            .unwrap();

        let result = remove_background_from_bytes(&bytes, &config).await.unwrap();
        assert_eq!(result.image.alpha_at(0), 0);
        assert_eq!(result.image.alpha_at(result.image.index(10, 10)), 255);
    }

    #[tokio::test]
    async fn test_reader_api_rejects_garbage() {
        let err = remove_background_from_reader(&b"definitely not an image"[..], &RemovalConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BgRemovalError::InvalidImage(_)));
    }
}
