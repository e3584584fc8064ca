//! Alpha-only compositing
//!
//! The output is a copy of the source pixels whose alpha channel is scaled by an
//! opacity factor derived from the mask. Color channels are never touched, fully
//! transparent pixels included: the output carries straight (non-premultiplied) alpha.

use crate::config::{QualityMode, RemovalConfig, Strategy};
use crate::error::Result;
use crate::refine::{alpha_factor, AlphaCurve};
use crate::types::{Mask, PixelBuffer};
use crate::utils::{parallel, NumericValidator};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Mask-to-opacity mapping used by [`composite`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeOptions {
    /// Mask values below this become fully transparent
    pub foreground_threshold: f32,
    /// Mask values at or above this keep the source alpha
    pub opaque_cutoff: f32,
    /// Curve applied between the two
    pub curve: AlphaCurve,
}

impl Default for CompositeOptions {
    fn default() -> Self {
        Self {
            foreground_threshold: 0.1,
            opaque_cutoff: 0.9,
            curve: AlphaCurve::Linear,
        }
    }
}

impl CompositeOptions {
    /// Opacity mapping for masks produced by `strategy`
    ///
    /// Heuristic masks use the linear default. Learned masks take the external
    /// foreground threshold and a curve chosen by quality mode: the piecewise
    /// sharpening for mac-like or aggressive requests, `v^0.8` feathering for high
    /// quality, linear otherwise.
    #[must_use]
    pub fn for_strategy(strategy: Strategy, config: &RemovalConfig) -> Self {
        if !strategy.is_learned() {
            return Self::default();
        }
        let foreground_threshold = config.external.foreground_threshold;
        if config.external.aggressive || config.quality_mode == QualityMode::MacLike {
            Self {
                foreground_threshold,
                opaque_cutoff: 0.95,
                curve: AlphaCurve::MacPiecewise,
            }
        } else if config.quality_mode == QualityMode::High {
            Self {
                foreground_threshold,
                opaque_cutoff: 0.98,
                curve: AlphaCurve::Power { gamma: 0.8 },
            }
        } else {
            Self {
                foreground_threshold,
                opaque_cutoff: 0.95,
                curve: AlphaCurve::Linear,
            }
        }
    }

    /// # Errors
    /// - `InvalidConfig` for thresholds outside [0,1], a cutoff below the threshold or a
    ///   non-positive gamma
    pub fn validate(&self) -> Result<()> {
        NumericValidator::validate_percentage(self.foreground_threshold, "foreground_threshold")?;
        NumericValidator::validate_range(self.opaque_cutoff, self.foreground_threshold, 1.0, "opaque_cutoff")?;
        if let AlphaCurve::Power { gamma } = self.curve {
            NumericValidator::validate_positive(gamma, "gamma")?;
        }
        Ok(())
    }
}

/// Scale every pixel's alpha by the opacity factor of its mask value
///
/// `new_alpha = round(old_alpha * f(mask[i]))`; RGB is copied unchanged.
///
/// # Errors
/// - `InvalidImage` when the mask and pixel buffer differ in size
#[instrument(skip_all, fields(width = pixels.width(), height = pixels.height()))]
pub fn composite(pixels: &PixelBuffer, mask: &Mask, options: &CompositeOptions) -> Result<PixelBuffer> {
    mask.ensure_matches(pixels)?;
    let mut output = pixels.clone();
    let width = pixels.width() as usize;
    let values = mask.as_slice();

    parallel::fill_rows(width, 4, output.data_mut(), |y, row| {
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            let f = alpha_factor(
                values[y * width + x],
                options.foreground_threshold,
                options.opaque_cutoff,
                options.curve,
            );
            px[3] = (f32::from(px[3]) * f).round().clamp(0.0, 255.0) as u8;
        }
    });
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BgRemovalError;

    fn red() -> PixelBuffer {
        PixelBuffer::filled(4, 4, [255, 0, 0, 255]).unwrap()
    }

    #[test]
    fn test_full_mask_keeps_pixels() {
        let out = composite(&red(), &Mask::filled(4, 4, 1.0), &CompositeOptions::default()).unwrap();
        assert_eq!(out, red());
    }

    #[test]
    fn test_empty_mask_only_clears_alpha() {
        let out = composite(&red(), &Mask::filled(4, 4, 0.0), &CompositeOptions::default()).unwrap();
        for px in out.as_raw().chunks_exact(4) {
            assert_eq!(px, &[255, 0, 0, 0]);
        }
    }

    #[test]
    fn test_partial_alpha_scales_source_alpha() {
        let pixels = PixelBuffer::filled(2, 1, [10, 20, 30, 200]).unwrap();
        let mask = Mask::new(2, 1, vec![0.5, 0.95]).unwrap();
        let out = composite(&pixels, &mask, &CompositeOptions::default()).unwrap();
        assert_eq!(out.alpha_at(0), 100);
        assert_eq!(out.alpha_at(1), 200);
        assert_eq!(out.color_at(0), pixels.color_at(0));
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let err = composite(&red(), &Mask::filled(4, 5, 1.0), &CompositeOptions::default()).unwrap_err();
        assert!(matches!(err, BgRemovalError::InvalidImage(_)));
    }

    #[test]
    fn test_options_follow_quality_mode() {
        let config = RemovalConfig::default();
        assert_eq!(
            CompositeOptions::for_strategy(Strategy::FloodFill, &config),
            CompositeOptions::default()
        );
        let learned = CompositeOptions::for_strategy(Strategy::External, &config);
        assert_eq!(learned.foreground_threshold, 0.55);
        assert_eq!(learned.curve, AlphaCurve::Linear);

        let high = RemovalConfig::builder().quality_mode(QualityMode::High).build().unwrap();
        let options = CompositeOptions::for_strategy(Strategy::Hybrid, &high);
        assert_eq!(options.curve, AlphaCurve::Power { gamma: 0.8 });
        assert!(options.validate().is_ok());

        let mac = RemovalConfig::builder().aggressive_external().build().unwrap();
        let options = CompositeOptions::for_strategy(Strategy::External, &mac);
        assert_eq!(options.curve, AlphaCurve::MacPiecewise);
        assert_eq!(options.foreground_threshold, 0.08);
    }
}
