//! Mask refinement
//!
//! Stateless mask-to-mask transforms (thresholding, morphology, smoothing, alpha
//! remapping and pixel-aware corrections) composed into a [`RefinementPlan`]. Every
//! stage preserves the mask dimensions and keeps values in [0,1].

pub mod alpha;
pub mod filters;
pub mod morphology;
mod plan;
pub mod protection;

pub use alpha::{alpha_factor, mac_style, AlphaCurve};
pub use filters::{box_smooth, gaussian, median};
pub use morphology::{binarize, close, dilate, erode, majority_vote, open};
pub use plan::{RefinementPlan, RefinementStep};
pub use protection::{color_aware_edges, FineDetailProtection};

use serde::{Deserialize, Serialize};

/// How windowed stages treat pixels whose window leaves the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderMode {
    /// Copy the input value unchanged
    #[default]
    Retain,
    /// Clip the window to the image
    Clamp,
    /// Write 0
    Zero,
}
