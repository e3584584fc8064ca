//! Mask builders
//!
//! Every builder turns a [`PixelBuffer`] into a [`Mask`] of the same dimensions with a
//! finite value in [0,1] per pixel, without touching the pixels. Heuristic builders
//! produce binary masks; the external adapter passes through the segmenter's soft
//! probabilities.

pub mod border_color;
pub mod color_range;
pub mod external;
pub mod flood_fill;
pub mod fusion;
pub mod grab_cut;
pub mod region_growing;

pub use border_color::BorderColorBuilder;
pub use color_range::ColorRangeBuilder;
pub use external::{ExternalMaskAdapter, ExternalMaskBuilder, MaskChannel, RawMask};
pub use flood_fill::FloodFillBuilder;
pub use fusion::{average_masks, fuse_masks, traditional_mask};
pub use grab_cut::GrabCutBuilder;
pub use region_growing::{RegionGrowingBuilder, RegionInfo};

use crate::config::{RemovalConfig, Strategy};
use crate::error::{BgRemovalError, Result};
use crate::types::{Mask, PixelBuffer};

/// A mask construction strategy
pub trait MaskBuilder: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Build a foreground confidence mask for `pixels`
    ///
    /// # Errors
    /// - `InvalidImage` for a zero-area image
    /// - `NoSubjectDetected` / `MaskDecode` from the external adapter
    fn build(&self, pixels: &PixelBuffer) -> Result<Mask>;
}

/// Construct the builder for a heuristic strategy from the request configuration
///
/// # Errors
/// - `InvalidConfig` for `Auto` (resolve it with the selector first) and for the
///   learned strategies, which need segmenter output
pub fn heuristic_builder(
    strategy: Strategy,
    config: &RemovalConfig,
) -> Result<Box<dyn MaskBuilder>> {
    match strategy {
        Strategy::BorderColor => Ok(Box::new(BorderColorBuilder::new(
            config.border_color.clone(),
        ))),
        Strategy::FloodFill => Ok(Box::new(FloodFillBuilder::new(config.flood_fill.clone()))),
        Strategy::RegionGrowing => Ok(Box::new(RegionGrowingBuilder::new(
            config.region_growing.clone(),
        ))),
        Strategy::ColorRange => Ok(Box::new(ColorRangeBuilder::new(config.color_range.clone()))),
        Strategy::GrabCut => Ok(Box::new(GrabCutBuilder::new(config.grab_cut.clone()))),
        Strategy::Auto | Strategy::External | Strategy::Hybrid => {
            Err(BgRemovalError::invalid_config(format!(
                "'{strategy}' is not a heuristic mask builder"
            )))
        },
    }
}

/// Zero-area images cannot be segmented
pub(crate) fn ensure_non_empty(pixels: &PixelBuffer) -> Result<()> {
    if pixels.pixel_count() == 0 {
        return Err(BgRemovalError::invalid_image("zero-area image"));
    }
    Ok(())
}

/// Binary mask from a per-pixel background flag
pub(crate) fn mask_from_background(width: u32, height: u32, background: &[bool]) -> Mask {
    let data = background
        .iter()
        .map(|&bg| if bg { 0.0 } else { 1.0 })
        .collect();
    Mask::from_vec_unchecked(width, height, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_builder_factory() {
        let config = RemovalConfig::default();
        for strategy in [
            Strategy::BorderColor,
            Strategy::FloodFill,
            Strategy::RegionGrowing,
            Strategy::ColorRange,
            Strategy::GrabCut,
        ] {
            assert!(heuristic_builder(strategy, &config).is_ok(), "{strategy}");
        }
        for strategy in [Strategy::Auto, Strategy::External, Strategy::Hybrid] {
            assert!(matches!(
                heuristic_builder(strategy, &config),
                Err(BgRemovalError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_all_heuristic_builders_honor_contract() {
        let pixels = PixelBuffer::from_fn(37, 23, |x, y| {
            let stripe = ((x / 5 + y / 3) % 4) as u8;
            [stripe * 60, 255 - stripe * 40, (x * 6) as u8, 255]
        })
        .unwrap();
        let before = pixels.clone();
        let config = RemovalConfig::default();

        for strategy in [
            Strategy::BorderColor,
            Strategy::FloodFill,
            Strategy::RegionGrowing,
            Strategy::ColorRange,
            Strategy::GrabCut,
        ] {
            let builder = heuristic_builder(strategy, &config).unwrap();
            let first = builder.build(&pixels).unwrap();
            let second = builder.build(&pixels).unwrap();
            assert_eq!(first.dimensions(), (37, 23), "{}", builder.name());
            assert!(first
                .as_slice()
                .iter()
                .all(|v| v.is_finite() && (0.0..=1.0).contains(v)));
            assert_eq!(first, second, "{} is not deterministic", builder.name());
        }
        assert_eq!(pixels, before);
    }
}
