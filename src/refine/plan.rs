//! Refinement plans: ordered lists of stages executed over a mask

use super::{alpha, filters, morphology, BorderMode, FineDetailProtection};
use super::protection::color_aware_edges;
use crate::config::{QualityMode, RemovalConfig, Strategy};
use crate::error::{BgRemovalError, Result};
use crate::types::{Mask, PixelBuffer};
use crate::utils::NumericValidator;
use serde::{Deserialize, Serialize};
use tracing::{span, trace, Level};

/// Largest radius a plan may request
const MAX_RADIUS: u32 = 16;
/// Portrait box smoothing is skipped above this pixel count
const PORTRAIT_SMOOTH_MAX_PIXELS: u64 = 1_000_000;
/// High quality adds a second smoothing pass below this pixel count
const HIGH_QUALITY_MAX_PIXELS: u64 = 500_000;

/// One refinement stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RefinementStep {
    Binarize { threshold: f32 },
    Erode { radius: u32, border: BorderMode },
    Dilate { radius: u32, border: BorderMode },
    Open { radius: u32, border: BorderMode },
    Close { radius: u32, border: BorderMode },
    Median { passes: u32, border: BorderMode },
    MajorityVote { passes: u32 },
    BoxSmooth { radius: u32, border: BorderMode },
    Gaussian { radius: u32, border: BorderMode },
    /// Decisive remap, see [`alpha::mac_style`]
    MacStyle { threshold: f32 },
    ProtectFineDetail(FineDetailProtection),
    ColorAwareEdges { radius: u32 },
}

impl RefinementStep {
    /// Short stage name for logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Binarize { .. } => "binarize",
            Self::Erode { .. } => "erode",
            Self::Dilate { .. } => "dilate",
            Self::Open { .. } => "open",
            Self::Close { .. } => "close",
            Self::Median { .. } => "median",
            Self::MajorityVote { .. } => "majority_vote",
            Self::BoxSmooth { .. } => "box_smooth",
            Self::Gaussian { .. } => "gaussian",
            Self::MacStyle { .. } => "mac_style",
            Self::ProtectFineDetail(_) => "protect_fine_detail",
            Self::ColorAwareEdges { .. } => "color_aware_edges",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::Binarize { threshold } | Self::MacStyle { threshold } => {
                NumericValidator::validate_percentage(*threshold, "refinement threshold")?;
            },
            Self::Erode { radius, .. }
            | Self::Dilate { radius, .. }
            | Self::Open { radius, .. }
            | Self::Close { radius, .. }
            | Self::BoxSmooth { radius, .. }
            | Self::Gaussian { radius, .. }
            | Self::ColorAwareEdges { radius } => {
                NumericValidator::validate_range(*radius, 0, MAX_RADIUS, "refinement radius")?;
            },
            Self::Median { passes, .. } | Self::MajorityVote { passes } => {
                NumericValidator::validate_range(*passes, 0, 16, "refinement passes")?;
            },
            Self::ProtectFineDetail(protection) => protection.validate()?,
        }
        Ok(())
    }

    fn run(&self, mask: &Mask, pixels: &PixelBuffer) -> Mask {
        match self {
            Self::Binarize { threshold } => morphology::binarize(mask, *threshold),
            Self::Erode { radius, border } => morphology::erode(mask, *radius, *border),
            Self::Dilate { radius, border } => morphology::dilate(mask, *radius, *border),
            Self::Open { radius, border } => morphology::open(mask, *radius, *border),
            Self::Close { radius, border } => morphology::close(mask, *radius, *border),
            Self::Median { passes, border } => filters::median(mask, *passes, *border),
            Self::MajorityVote { passes } => morphology::majority_vote(mask, *passes),
            Self::BoxSmooth { radius, border } => filters::box_smooth(mask, *radius, *border),
            Self::Gaussian { radius, border } => filters::gaussian(mask, *radius, *border),
            Self::MacStyle { threshold } => alpha::mac_style(mask, *threshold),
            Self::ProtectFineDetail(protection) => protection.apply(mask, pixels),
            Self::ColorAwareEdges { radius } => color_aware_edges(mask, pixels, *radius),
        }
    }
}

/// Ordered refinement stages
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RefinementPlan {
    pub steps: Vec<RefinementStep>,
}

impl RefinementPlan {
    #[must_use]
    pub fn new(steps: Vec<RefinementStep>) -> Self {
        Self { steps }
    }

    /// Append a stage
    #[must_use]
    pub fn then(mut self, step: RefinementStep) -> Self {
        self.steps.push(step);
        self
    }

    #[must_use]
    pub fn steps(&self) -> &[RefinementStep] {
        &self.steps
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// # Errors
    /// - `InvalidConfig` for the first stage with an out-of-range parameter
    pub fn validate(&self) -> Result<()> {
        self.steps.iter().try_for_each(RefinementStep::validate)
    }

    /// Default plan for masks produced by `strategy`
    ///
    /// `dimensions` gates the size-dependent portrait passes. `Auto` has no plan of its
    /// own and yields an empty plan; resolve it first.
    #[must_use]
    pub fn for_strategy(strategy: Strategy, config: &RemovalConfig, dimensions: (u32, u32)) -> Self {
        let smooth = config.edge_smooth_radius;
        let noise = config.noise_reduction_passes;
        let mut steps = Vec::new();

        match strategy {
            Strategy::Auto => return Self::default(),
            Strategy::BorderColor => {
                steps.push(RefinementStep::MajorityVote {
                    passes: config.border_color.majority_passes,
                });
            },
            Strategy::FloodFill => {
                // hard magic-wand edges: speck removal only, no smoothing
                if noise > 0 {
                    steps.push(RefinementStep::Open {
                        radius: 1,
                        border: BorderMode::Retain,
                    });
                    steps.push(RefinementStep::Close {
                        radius: 1,
                        border: BorderMode::Retain,
                    });
                }
            },
            Strategy::RegionGrowing => {
                steps.push(RefinementStep::Median {
                    passes: noise,
                    border: BorderMode::Retain,
                });
                steps.push(RefinementStep::Open {
                    radius: 2,
                    border: BorderMode::Retain,
                });
                steps.push(RefinementStep::Close {
                    radius: 3,
                    border: BorderMode::Retain,
                });
            },
            Strategy::ColorRange | Strategy::GrabCut => {
                steps.push(RefinementStep::Median {
                    passes: noise,
                    border: BorderMode::Retain,
                });
            },
            Strategy::External | Strategy::Hybrid => {
                return Self::new(Self::learned_steps(config, dimensions));
            },
        }

        if let Some(protection) = &config.fine_detail_protection {
            steps.push(RefinementStep::ProtectFineDetail(protection.clone()));
        }
        if strategy != Strategy::FloodFill && smooth > 0 {
            steps.push(RefinementStep::Gaussian {
                radius: smooth,
                border: BorderMode::Retain,
            });
        }
        Self::new(steps)
    }

    fn learned_steps(config: &RemovalConfig, (width, height): (u32, u32)) -> Vec<RefinementStep> {
        let ext = &config.external;
        let pixel_count = u64::from(width) * u64::from(height);
        let border = BorderMode::Clamp;
        let mut steps = vec![
            RefinementStep::Binarize {
                threshold: ext.mask_threshold,
            },
            RefinementStep::Open { radius: 2, border },
            RefinementStep::Close { radius: 3, border },
        ];

        if ext.aggressive || config.quality_mode == QualityMode::MacLike {
            steps.push(RefinementStep::MacStyle {
                threshold: ext.mask_threshold,
            });
        }

        if ext.enhance {
            steps.push(RefinementStep::Erode { radius: 1, border });
            steps.push(RefinementStep::Dilate { radius: 2, border });
            if pixel_count <= PORTRAIT_SMOOTH_MAX_PIXELS {
                steps.push(RefinementStep::BoxSmooth {
                    radius: 1,
                    border: BorderMode::Retain,
                });
            }
            if config.quality_mode == QualityMode::High && pixel_count < HIGH_QUALITY_MAX_PIXELS {
                steps.push(RefinementStep::Gaussian {
                    radius: (ext.edge_blur + 1).min(3),
                    border,
                });
            }
        }

        if let Some(protection) = &config.fine_detail_protection {
            steps.push(RefinementStep::ProtectFineDetail(protection.clone()));
        }
        if config.quality_mode == QualityMode::High {
            steps.push(RefinementStep::ColorAwareEdges { radius: 3 });
        } else if config.quality_mode == QualityMode::Balanced && config.fine_detail_protection.is_some() {
            steps.push(RefinementStep::ColorAwareEdges { radius: 2 });
        }

        steps.push(RefinementStep::Gaussian {
            radius: ext.edge_blur,
            border,
        });
        steps
    }

    /// Run every stage in order
    ///
    /// # Errors
    /// - `InvalidImage` when the mask and pixel buffer differ in size
    pub fn apply(&self, mask: &Mask, pixels: &PixelBuffer) -> Result<Mask> {
        mask.ensure_matches(pixels)?;
        let mut current = mask.clone();
        for step in &self.steps {
            let _span = span!(Level::TRACE, "refine_step", step = step.name()).entered();
            current = step.run(&current, pixels);
            trace!(mean = current.mean(), "stage complete");
        }
        if current.dimensions() != mask.dimensions() {
            return Err(BgRemovalError::internal("refinement changed mask dimensions"));
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noisy_mask(width: u32, height: u32) -> Mask {
        Mask::from_fn(width, height, |x, y| {
            let base = if (8..24).contains(&x) && (8..24).contains(&y) { 0.9 } else { 0.1 };
            let jitter = ((x * 7 + y * 13) % 5) as f32 * 0.05;
            base + jitter - 0.1
        })
    }

    #[test]
    fn test_every_default_plan_keeps_range_and_dimensions() {
        let pixels = PixelBuffer::from_fn(32, 32, |x, y| [(x * 8) as u8, (y * 8) as u8, 40, 255]).unwrap();
        let mask = noisy_mask(32, 32);
        for mode in [QualityMode::Fast, QualityMode::Balanced, QualityMode::High, QualityMode::MacLike] {
            let config = RemovalConfig::builder()
                .quality_mode(mode)
                .hair_protection(true)
                .build()
                .unwrap();
            for &strategy in Strategy::all() {
                let plan = RefinementPlan::for_strategy(strategy, &config, (32, 32));
                assert!(plan.validate().is_ok());
                let refined = plan.apply(&mask, &pixels).unwrap();
                assert_eq!(refined.dimensions(), (32, 32));
                assert!(refined.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
                assert_eq!(refined, plan.apply(&mask, &pixels).unwrap());
            }
        }
    }

    #[test]
    fn test_apply_rejects_mismatched_dimensions() {
        let pixels = PixelBuffer::filled(4, 4, [0, 0, 0, 255]).unwrap();
        let mask = Mask::filled(5, 4, 0.5);
        let plan = RefinementPlan::default();
        assert!(matches!(
            plan.apply(&mask, &pixels),
            Err(BgRemovalError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_learned_plan_shape_follows_options() {
        let balanced = RemovalConfig::default();
        let plan = RefinementPlan::for_strategy(Strategy::External, &balanced, (100, 100));
        assert_eq!(plan.steps()[0], RefinementStep::Binarize { threshold: 0.65 });
        assert!(plan.steps().iter().any(|s| matches!(s, RefinementStep::BoxSmooth { .. })));
        assert!(!plan.steps().iter().any(|s| matches!(s, RefinementStep::MacStyle { .. })));

        let aggressive = RemovalConfig::builder().aggressive_external().build().unwrap();
        let plan = RefinementPlan::for_strategy(Strategy::External, &aggressive, (100, 100));
        assert!(plan.steps().iter().any(|s| matches!(s, RefinementStep::MacStyle { .. })));
        assert!(!plan.steps().iter().any(|s| matches!(s, RefinementStep::Erode { .. })));

        let large = RefinementPlan::for_strategy(Strategy::External, &balanced, (2000, 1000));
        assert!(!large.steps().iter().any(|s| matches!(s, RefinementStep::BoxSmooth { .. })));
    }

    #[test]
    fn test_flood_fill_plan_keeps_hard_edges() {
        let config = RemovalConfig::default();
        let plan = RefinementPlan::for_strategy(Strategy::FloodFill, &config, (50, 50));
        assert!(!plan.steps().iter().any(|s| matches!(s, RefinementStep::Gaussian { .. })));

        let pixels = PixelBuffer::filled(50, 50, [255, 255, 255, 255]).unwrap();
        let mask = Mask::from_fn(50, 50, |x, y| {
            if (15..35).contains(&x) && (15..35).contains(&y) {
                1.0
            } else {
                0.0
            }
        });
        assert_eq!(plan.apply(&mask, &pixels).unwrap(), mask);
    }

    #[test]
    fn test_plan_json_round_trip() {
        let plan = RefinementPlan::default()
            .then(RefinementStep::Binarize { threshold: 0.5 })
            .then(RefinementStep::Gaussian {
                radius: 2,
                border: BorderMode::Clamp,
            })
            .then(RefinementStep::ProtectFineDetail(FineDetailProtection::default()));
        let json = serde_json::to_string(&plan).unwrap();
        assert!(json.contains("\"op\":\"gaussian\""));
        let back: RefinementPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }

    #[test]
    fn test_validate_rejects_bad_steps() {
        let plan = RefinementPlan::new(vec![RefinementStep::Binarize { threshold: 1.5 }]);
        assert!(plan.validate().is_err());
        let plan = RefinementPlan::new(vec![RefinementStep::Gaussian {
            radius: 64,
            border: BorderMode::Retain,
        }]);
        assert!(plan.validate().is_err());
    }
}
