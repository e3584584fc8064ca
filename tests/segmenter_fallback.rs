//! Learned-path behavior with a scripted segmenter: adapter normalization, fallback,
//! time budgets and cancellation

mod common;

use bgcutout::{
    builders::ExternalMaskAdapter,
    segmenter::test_utils::{MockResponse, MockSegmenter},
    BackgroundRemovalProcessor, BgRemovalError, ExternalMaskOptions, PixelBuffer, QualityMode,
    RawMask, RemovalConfig, SegmenterHandle, Strategy,
};
use common::{assert_rgb_preserved, assert_unit_range, uniform_scene};
use image::{ImageFormat, Luma};
use std::io::Cursor;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn processor(config: RemovalConfig, mock: &MockSegmenter) -> BackgroundRemovalProcessor {
    BackgroundRemovalProcessor::new(config)
        .unwrap()
        .with_segmenter(SegmenterHandle::new(mock.clone(), Duration::from_secs(30)))
}

fn external() -> RemovalConfig {
    RemovalConfig::builder()
        .strategy(Strategy::External)
        .build()
        .unwrap()
}

#[test]
fn test_adapter_inverts_background_confidence() {
    // 400 values: 380 at 0.9 and a 20-value minority at 0.1
    let values: Vec<f32> = (0..400).map(|i| if i % 20 == 7 { 0.1 } else { 0.9 }).collect();
    let minority = values.iter().filter(|&&v| v < 0.5).count() as f32 / values.len() as f32;
    let raw = RawMask::FlatFloatArray {
        width: 20,
        height: 20,
        values: values.clone(),
    };

    let mask = ExternalMaskAdapter::new(ExternalMaskOptions::default())
        .normalize(&raw, 20, 20)
        .unwrap();

    let stats = mask.statistics();
    assert!((stats.foreground_fraction - minority).abs() < 1e-6);
    for (before, after) in values.iter().zip(mask.as_slice()) {
        assert!((before + after - 1.0).abs() < 1e-6);
    }
}

#[tokio::test]
async fn test_external_strategy_uses_segmenter_mask() {
    let mock = MockSegmenter::new();
    let mut processor = processor(external(), &mock);
    processor.initialize().await.unwrap();

    let pixels = uniform_scene();
    let result = processor
        .process_pixels(&pixels, &CancellationToken::new())
        .await
        .unwrap();
    processor.dispose().await.unwrap();

    assert_eq!(result.metadata.strategy, Strategy::External);
    assert!(!result.is_degraded());
    assert_unit_range(&result.mask);
    assert_rgb_preserved(&pixels, &result.image);
    // Disc mask: center opaque, corners transparent
    assert_eq!(result.image.alpha_at(result.image.index(25, 25)), 255);
    assert_eq!(result.image.alpha_at(0), 0);
    assert_eq!(mock.call_history(), vec!["initialize", "segment", "dispose"]);
}

#[tokio::test]
async fn test_encoded_bitmap_detection_is_decoded() {
    let bitmap = image::GrayImage::from_fn(25, 25, |x, y| {
        if (5..20).contains(&x) && (5..20).contains(&y) {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    let mut png = Cursor::new(Vec::new());
    bitmap.write_to(&mut png, ImageFormat::Png).unwrap();

    let mock = MockSegmenter::with_masks(vec![RawMask::EncodedBitmap(png.into_inner())]);
    let mut processor = processor(external(), &mock);
    processor.initialize().await.unwrap();

    let result = processor
        .process_pixels(&uniform_scene(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(!result.is_degraded());
    assert_eq!(result.image.alpha_at(result.image.index(25, 25)), 255);
    assert_eq!(result.image.alpha_at(result.image.index(1, 1)), 0);
}

#[tokio::test]
async fn test_no_subject_falls_back_to_heuristic() {
    let mock = MockSegmenter::new_no_subject();
    let mut processor = processor(external(), &mock);
    processor.initialize().await.unwrap();

    let result = processor
        .process_pixels(&uniform_scene(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.is_degraded());
    assert!(result
        .metadata
        .degraded
        .as_deref()
        .unwrap()
        .starts_with("no_subject_detected"));
    assert_eq!(result.metadata.requested_strategy, Strategy::External);
    assert_eq!(result.metadata.strategy, Strategy::FloodFill);
    assert_eq!(mock.segment_calls(), 1);
}

#[tokio::test]
async fn test_failing_inference_uses_configured_fallback() {
    let mock = MockSegmenter::new_failing_inference();
    let config = RemovalConfig::builder()
        .strategy(Strategy::Hybrid)
        .fallback_strategy(Strategy::RegionGrowing)
        .build()
        .unwrap();
    let mut processor = processor(config, &mock);
    processor.initialize().await.unwrap();

    let result = processor
        .process_pixels(&uniform_scene(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.metadata.strategy, Strategy::RegionGrowing);
    assert!(result.metadata.degraded.as_deref().unwrap().starts_with("segmenter"));
    assert!(result.metadata.selector_features.is_none());
}

#[tokio::test]
async fn test_failing_initialization_still_produces_output() {
    let mock = MockSegmenter::new_failing_init();
    let mut processor = processor(external(), &mock);
    let err = processor.initialize().await.unwrap_err();
    assert!(matches!(err, BgRemovalError::Segmenter(_)));

    let result = processor
        .process_pixels(&uniform_scene(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(result.is_degraded());
    // The unloaded model is never asked to segment
    assert_eq!(mock.call_history(), vec!["initialize"]);
}

#[tokio::test(start_paused = true)]
async fn test_slow_segmenter_times_out_then_falls_back() {
    let mock = MockSegmenter::new().with_delay(Duration::from_secs(60));
    let config = RemovalConfig::builder()
        .strategy(Strategy::External)
        .segmenter_timeout_ms(250)
        .build()
        .unwrap();
    let mut processor = processor(config, &mock);
    processor.initialize().await.unwrap();

    let result = processor
        .process_pixels(&uniform_scene(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(result
        .metadata
        .degraded
        .as_deref()
        .unwrap()
        .starts_with("segmentation_timeout"));
    assert_eq!(result.metadata.strategy, Strategy::FloodFill);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_error_reports_budget() {
    let mock = MockSegmenter::new().with_delay(Duration::from_secs(5));
    let mut handle = SegmenterHandle::new(mock, Duration::from_millis(100));
    handle.initialize().await.unwrap();

    let err = handle
        .segment(&uniform_scene(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BgRemovalError::SegmentationTimeout { timeout_ms: 100 }
    ));
    assert!(err.is_fallback_eligible());
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_inference_is_not_masked_by_fallback() {
    let mock = MockSegmenter::new().with_delay(Duration::from_secs(10));
    let mut processor = processor(external(), &mock);
    processor.initialize().await.unwrap();

    let pixels = uniform_scene();
    let token = CancellationToken::new();
    let canceller = token.clone();
    let (outcome, ()) = tokio::join!(processor.process_pixels(&pixels, &token), async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    assert!(matches!(outcome, Err(BgRemovalError::Cancelled)));
}

#[tokio::test]
async fn test_hybrid_fuses_with_traditional_mask() {
    let mock = MockSegmenter::new();
    let config = RemovalConfig::builder()
        .strategy(Strategy::Hybrid)
        .quality_mode(QualityMode::MacLike)
        .build()
        .unwrap();
    let mut processor = processor(config, &mock);
    processor.initialize().await.unwrap();

    let pixels = uniform_scene();
    let result = processor
        .process_pixels(&pixels, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.metadata.strategy, Strategy::Hybrid);
    assert_unit_range(&result.mask);
    assert_rgb_preserved(&pixels, &result.image);
    assert_eq!(mock.segment_calls(), 1);
}

#[tokio::test]
async fn test_mismatched_raw_mask_is_resampled() {
    let small = RawMask::FlatFloatArray {
        width: 5,
        height: 5,
        values: (0..25).map(|i| if i == 12 { 1.0 } else { 0.0 }).collect(),
    };
    let mock = MockSegmenter::new().with_response(MockResponse::Fixed(vec![small]));
    let mut processor = processor(external(), &mock);
    processor.initialize().await.unwrap();

    let pixels = PixelBuffer::filled(40, 40, [10, 200, 10, 255]).unwrap();
    let result = processor
        .process_pixels(&pixels, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.mask.dimensions(), (40, 40));
    assert!(!result.is_degraded());
}
