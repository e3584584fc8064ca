//! Background removal pipeline
//!
//! [`BackgroundRemovalProcessor`] runs one request end to end: resolve the strategy
//! (the selector handles `Auto`), build the raw mask (calling the external segmenter
//! for learned strategies), run the refinement plan and composite. The caller's
//! cancellation token is checked before every stage and raced against the segmenter.
//! A fallback-eligible failure on the learned path reruns the request once with the
//! heuristic fallback strategy and marks the result as degraded.

use crate::{
    builders::{average_masks, fuse_masks, heuristic_builder, traditional_mask, ExternalMaskBuilder, MaskBuilder, RawMask},
    compositor::{composite, CompositeOptions},
    config::{QualityMode, RemovalConfig, Strategy},
    error::{BgRemovalError, Result},
    refine::RefinementPlan,
    segmenter::SegmenterHandle,
    selector::{ImageFeatures, StrategySelector},
    services::{ImageIOService, NoOpProgressReporter, ProcessingStage, ProgressReporter, ProgressTracker},
    types::{Mask, PixelBuffer, ProcessingMetadata, ProcessingTimings, RemovalResult},
};
use chrono::Utc;
use instant::Instant;
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug as trace_debug, instrument, span, Level};

/// Raw mask plus how it was produced
struct BuiltMask {
    strategy: Strategy,
    mask: Mask,
    features: Option<ImageFeatures>,
}

/// End-to-end background removal pipeline
pub struct BackgroundRemovalProcessor {
    config: RemovalConfig,
    segmenter: Option<SegmenterHandle>,
    reporter: Arc<dyn ProgressReporter>,
}

impl std::fmt::Debug for BackgroundRemovalProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemovalProcessor")
            .field("config", &self.config)
            .field("segmenter", &self.segmenter)
            .finish_non_exhaustive()
    }
}

impl BackgroundRemovalProcessor {
    /// Create a processor without a segmenter
    ///
    /// # Errors
    /// - `InvalidConfig` when the configuration does not validate
    pub fn new(config: RemovalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            segmenter: None,
            reporter: Arc::new(NoOpProgressReporter),
        })
    }

    /// Inject the external segmenter; its time budget is taken from the configuration
    #[must_use]
    pub fn with_segmenter(mut self, mut segmenter: SegmenterHandle) -> Self {
        segmenter.set_timeout(self.config.segmenter_timeout());
        self.segmenter = Some(segmenter);
        self
    }

    #[must_use]
    pub fn with_progress_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.reporter = Arc::from(reporter);
        self
    }

    #[must_use]
    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    #[must_use]
    pub fn has_segmenter(&self) -> bool {
        self.segmenter.is_some()
    }

    /// Load the segmenter, if one was injected
    ///
    /// # Errors
    /// - `Segmenter` when the model fails to load
    pub async fn initialize(&mut self) -> Result<()> {
        let Some(segmenter) = self.segmenter.as_mut() else {
            return Ok(());
        };
        let mut tracker = ProgressTracker::new(self.reporter.clone());
        tracker.report_stage(ProcessingStage::Initialization);
        if let Err(e) = segmenter.initialize().await {
            tracker.report_error(&e.to_string());
            return Err(e);
        }
        Ok(())
    }

    /// Release the segmenter, if one was injected
    ///
    /// # Errors
    /// - `Segmenter` from the model
    pub async fn dispose(&mut self) -> Result<()> {
        match self.segmenter.as_mut() {
            Some(segmenter) => segmenter.dispose().await,
            None => Ok(()),
        }
    }

    /// Load, decode and process an image file
    ///
    /// # Errors
    /// - `Io` / `InvalidImage` when the file cannot be read or decoded
    /// - everything [`Self::process_pixels`] reports
    pub async fn process_file<P: AsRef<Path>>(&self, path: P, cancel: &CancellationToken) -> Result<RemovalResult> {
        let mut tracker = ProgressTracker::new(self.reporter.clone());
        tracker.report_stage(ProcessingStage::ImageLoading);
        let start = Instant::now();
        let pixels = match ImageIOService::load(path) {
            Ok(pixels) => pixels,
            Err(e) => {
                tracker.report_error(&e.to_string());
                return Err(e);
            },
        };
        self.process_decoded(&pixels, elapsed_ms(start), cancel, tracker).await
    }

    /// Decode and process an encoded image
    ///
    /// # Errors
    /// - `InvalidImage` when the bytes cannot be decoded
    /// - everything [`Self::process_pixels`] reports
    pub async fn process_bytes(&self, bytes: &[u8], cancel: &CancellationToken) -> Result<RemovalResult> {
        let mut tracker = ProgressTracker::new(self.reporter.clone());
        tracker.report_stage(ProcessingStage::ImageLoading);
        let start = Instant::now();
        let pixels = match ImageIOService::decode(bytes) {
            Ok(pixels) => pixels,
            Err(e) => {
                tracker.report_error(&e.to_string());
                return Err(e);
            },
        };
        self.process_decoded(&pixels, elapsed_ms(start), cancel, tracker).await
    }

    /// Run the full pipeline over decoded pixels
    ///
    /// # Errors
    /// - `Cancelled` when `cancel` fires before a stage completes
    /// - `InvalidImage` for zero-area input
    /// - learned-path errors that are not fallback eligible, and any error of the
    ///   fallback run itself
    pub async fn process_pixels(&self, pixels: &PixelBuffer, cancel: &CancellationToken) -> Result<RemovalResult> {
        let tracker = ProgressTracker::new(self.reporter.clone());
        self.process_decoded(pixels, 0, cancel, tracker).await
    }

    #[instrument(
        skip(self, pixels, cancel, tracker),
        fields(
            width = pixels.width(),
            height = pixels.height(),
            strategy = %self.config.strategy,
            quality = %self.config.quality_mode
        )
    )]
    async fn process_decoded(
        &self,
        pixels: &PixelBuffer,
        decode_ms: u64,
        cancel: &CancellationToken,
        mut tracker: ProgressTracker,
    ) -> Result<RemovalResult> {
        let outcome = self.run(pixels, decode_ms, cancel, &mut tracker).await;
        if let Err(e) = &outcome {
            tracker.report_error(&e.to_string());
        }
        outcome
    }

    async fn run(
        &self,
        pixels: &PixelBuffer,
        decode_ms: u64,
        cancel: &CancellationToken,
        tracker: &mut ProgressTracker,
    ) -> Result<RemovalResult> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings {
            image_decode_ms: decode_ms,
            ..ProcessingTimings::default()
        };
        let requested = self.config.strategy;
        let mut degraded = None;

        trace_debug!(requested = %requested, "starting background removal");

        let built = if requested.is_learned() {
            match self.build_learned(requested, pixels, cancel, tracker, &mut timings).await {
                Ok(built) => built,
                Err(e) if e.is_fallback_eligible() => {
                    warn!(
                        "Learned strategy '{requested}' failed ({e}); falling back to '{}'",
                        self.config.fallback_strategy
                    );
                    degraded = Some(format!("{}: {e}", e.kind()));
                    self.build_heuristic(self.config.fallback_strategy, pixels, cancel, tracker, &mut timings)?
                },
                Err(e) => return Err(e),
            }
        } else {
            self.build_heuristic(requested, pixels, cancel, tracker, &mut timings)?
        };

        check_cancelled(cancel)?;
        tracker.report_stage(ProcessingStage::MaskRefinement);
        let refined = {
            let _span = span!(Level::DEBUG, "refinement", strategy = %built.strategy).entered();
            let start = Instant::now();
            let plan = self.refinement_plan(built.strategy, pixels.dimensions());
            let refined = plan.apply(&built.mask, pixels)?;
            timings.refinement_ms = elapsed_ms(start);
            refined
        };

        check_cancelled(cancel)?;
        tracker.report_stage(ProcessingStage::Compositing);
        let image = {
            let _span = span!(Level::DEBUG, "compositing").entered();
            let start = Instant::now();
            let options = CompositeOptions::for_strategy(built.strategy, &self.config);
            let image = composite(pixels, &refined, &options)?;
            timings.compositing_ms = elapsed_ms(start);
            image
        };

        timings.total_ms = decode_ms + elapsed_ms(total_start);
        tracker.report_stage(ProcessingStage::Completed);
        tracker.report_completion(timings.clone());
        info!(
            "Removed background from {}x{} image with '{}' in {}ms",
            pixels.width(),
            pixels.height(),
            built.strategy,
            timings.total_ms
        );

        Ok(RemovalResult {
            image,
            metadata: ProcessingMetadata {
                requested_strategy: requested,
                strategy: built.strategy,
                quality_mode: self.config.quality_mode,
                dimensions: pixels.dimensions(),
                degraded,
                selector_features: built.features,
                mask_statistics: refined.statistics(),
                timings,
                processed_at: Utc::now(),
            },
            mask: refined,
        })
    }

    /// The caller's plan when one is configured, the strategy default otherwise
    fn refinement_plan(&self, strategy: Strategy, dimensions: (u32, u32)) -> RefinementPlan {
        self.config
            .refinement_override
            .clone()
            .unwrap_or_else(|| RefinementPlan::for_strategy(strategy, &self.config, dimensions))
    }

    fn build_heuristic(
        &self,
        strategy: Strategy,
        pixels: &PixelBuffer,
        cancel: &CancellationToken,
        tracker: &mut ProgressTracker,
        timings: &mut ProcessingTimings,
    ) -> Result<BuiltMask> {
        check_cancelled(cancel)?;
        let mut config = self.config.clone();
        let mut features = None;

        let strategy = if strategy == Strategy::Auto {
            tracker.report_stage(ProcessingStage::StrategySelection);
            let _span = span!(Level::DEBUG, "strategy_selection").entered();
            let start = Instant::now();
            let selection = StrategySelector::new(self.config.selector.clone()).select(pixels);
            timings.selection_ms = elapsed_ms(start);
            if let Some(tolerance) = selection.flood_tolerance {
                config.flood_fill.tolerance = tolerance;
            }
            features = Some(selection.features);
            selection.strategy
        } else {
            strategy
        };

        check_cancelled(cancel)?;
        tracker.report_stage_with_description(
            ProcessingStage::MaskBuilding,
            format!("Building foreground mask ({strategy})"),
        );
        let _span = span!(Level::DEBUG, "mask_building", strategy = %strategy).entered();
        let start = Instant::now();
        let mask = heuristic_builder(strategy, &config)?.build(pixels)?;
        timings.mask_build_ms = elapsed_ms(start);

        Ok(BuiltMask {
            strategy,
            mask,
            features,
        })
    }

    async fn build_learned(
        &self,
        strategy: Strategy,
        pixels: &PixelBuffer,
        cancel: &CancellationToken,
        tracker: &mut ProgressTracker,
        timings: &mut ProcessingTimings,
    ) -> Result<BuiltMask> {
        check_cancelled(cancel)?;
        let segmenter = self
            .segmenter
            .as_ref()
            .ok_or_else(|| BgRemovalError::segmenter("no external segmenter configured"))?;

        tracker.report_stage(ProcessingStage::SegmenterInference);
        let start = Instant::now();
        let averaged = strategy == Strategy::Hybrid && self.config.quality_mode == QualityMode::High;
        let outcome = if averaged {
            futures::try_join!(segmenter.segment(pixels, cancel), segmenter.segment(pixels, cancel))
                .map(|(first, second)| (first, Some(second)))
        } else {
            segmenter.segment(pixels, cancel).await.map(|first| (first, None))
        };
        timings.segmentation_ms = elapsed_ms(start);
        let (detections, second_run) = outcome?;

        check_cancelled(cancel)?;
        tracker.report_stage(ProcessingStage::MaskBuilding);
        let _span = span!(Level::DEBUG, "mask_building", strategy = %strategy).entered();
        let start = Instant::now();
        let mut mask = self.adapt(detections, pixels)?;
        if let Some(detections) = second_run {
            mask = average_masks(&mask, &self.adapt(detections, pixels)?)?;
        }
        if strategy == Strategy::Hybrid {
            mask = fuse_masks(&mask, &traditional_mask(pixels))?;
        }
        timings.mask_build_ms = elapsed_ms(start);

        Ok(BuiltMask {
            strategy,
            mask,
            features: None,
        })
    }

    fn adapt(&self, detections: Vec<RawMask>, pixels: &PixelBuffer) -> Result<Mask> {
        ExternalMaskBuilder::new(self.config.external.clone(), detections).build(pixels)
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(BgRemovalError::Cancelled);
    }
    Ok(())
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
