//! Nonlinear alpha remapping
//!
//! [`AlphaCurve`] maps a mask value in the partially transparent band to an opacity
//! factor; the compositor applies it per pixel. [`mac_style`] is a mask-to-mask remap
//! that pushes uncertain values towards 0 or 1 for a decisive cutout.

use super::morphology::is_interior;
use crate::types::Mask;
use crate::utils::parallel;
use serde::{Deserialize, Serialize};

/// Opacity curve for mask values between the foreground threshold and the opaque cutoff
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlphaCurve {
    /// `f(v) = v`
    #[default]
    Linear,
    /// `f(v) = v^gamma`; gamma below 1 feathers, above 1 sharpens
    Power { gamma: f32 },
    /// `0.3 * (v / 0.3)^2.2` below 0.3, then `min(1, 0.3 + (v - 0.3) * 1.08)`
    MacPiecewise,
}

impl AlphaCurve {
    /// Opacity factor in [0,1] for a mask value
    #[must_use]
    pub fn apply(self, v: f32) -> f32 {
        let v = v.clamp(0.0, 1.0);
        let f = match self {
            AlphaCurve::Linear => v,
            AlphaCurve::Power { gamma } => v.powf(gamma),
            AlphaCurve::MacPiecewise => {
                if v < 0.3 {
                    0.3 * (v / 0.3).powf(2.2)
                } else {
                    0.3 + (v - 0.3) * 1.08
                }
            },
        };
        if f.is_finite() {
            f.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Full opacity factor: 0 below `foreground_threshold`, 1 at or above `opaque_cutoff`,
/// the curve in between
#[must_use]
pub fn alpha_factor(v: f32, foreground_threshold: f32, opaque_cutoff: f32, curve: AlphaCurve) -> f32 {
    if v.is_nan() || v < foreground_threshold {
        0.0
    } else if v >= opaque_cutoff {
        1.0
    } else {
        curve.apply(v)
    }
}

/// Knee above which the decisive remap treats values as certain foreground
const MAC_KNEE: f32 = 0.8;
const MAC_GAMMA: f32 = 1.8;

/// Decisive remap derived from the binarization threshold `threshold`
///
/// Values below `max(0.15, 0.6 * threshold)` become 0, values above 0.8 become 1 and
/// the band between is normalized and raised to 1.8. Interior pixels left in (0.1, 0.9)
/// are then nudged by their 3x3 neighbors: -0.3 when clear background neighbors (< 0.2)
/// outnumber clear foreground ones (> 0.8), +0.2 in the opposite case.
#[must_use]
pub fn mac_style(mask: &Mask, threshold: f32) -> Mask {
    let low = (threshold * 0.6).max(0.15).min(MAC_KNEE - f32::EPSILON);
    let remapped = mask.map(|v| {
        if v < low {
            0.0
        } else if v > MAC_KNEE {
            1.0
        } else {
            ((v - low) / (MAC_KNEE - low)).powf(MAC_GAMMA)
        }
    });

    let (width, height) = remapped.dimensions();
    let (w, h) = (width as usize, height as usize);
    let src = remapped.as_slice();
    let data = parallel::map_pixels(w, h, |x, y| {
        let v = src[y * w + x];
        if !is_interior(x, y, 1, w, h) || v <= 0.1 || v >= 0.9 {
            return v;
        }
        let (mut background, mut foreground) = (0, 0);
        for yy in y - 1..=y + 1 {
            for xx in x - 1..=x + 1 {
                if xx == x && yy == y {
                    continue;
                }
                let n = src[yy * w + xx];
                if n < 0.2 {
                    background += 1;
                } else if n > 0.8 {
                    foreground += 1;
                }
            }
        }
        match background.cmp(&foreground) {
            std::cmp::Ordering::Greater => (v - 0.3).max(0.0),
            std::cmp::Ordering::Less => (v + 0.2).min(1.0),
            std::cmp::Ordering::Equal => v,
        }
    });
    Mask::from_vec_unchecked(width, height, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curves_stay_in_range_and_are_monotonic() {
        for curve in [
            AlphaCurve::Linear,
            AlphaCurve::Power { gamma: 0.8 },
            AlphaCurve::Power { gamma: 2.2 },
            AlphaCurve::MacPiecewise,
        ] {
            let mut previous = 0.0;
            for i in 0..=100 {
                let f = curve.apply(i as f32 / 100.0);
                assert!((0.0..=1.0).contains(&f));
                assert!(f >= previous - 1e-6, "{curve:?} at {i}");
                previous = f;
            }
        }
    }

    #[test]
    fn test_mac_piecewise_segments() {
        let curve = AlphaCurve::MacPiecewise;
        assert!((curve.apply(0.15) - 0.3 * 0.5_f32.powf(2.2)).abs() < 1e-6);
        assert!((curve.apply(0.3) - 0.3).abs() < 1e-6);
        assert!((curve.apply(0.5) - (0.3 + 0.2 * 1.08)).abs() < 1e-6);
        assert_eq!(curve.apply(0.99), 1.0);
    }

    #[test]
    fn test_alpha_factor_bands() {
        let curve = AlphaCurve::Linear;
        assert_eq!(alpha_factor(0.05, 0.1, 0.9, curve), 0.0);
        assert_eq!(alpha_factor(0.5, 0.1, 0.9, curve), 0.5);
        assert_eq!(alpha_factor(0.9, 0.1, 0.9, curve), 1.0);
        assert_eq!(alpha_factor(f32::NAN, 0.1, 0.9, curve), 0.0);
    }

    #[test]
    fn test_mac_style_is_decisive() {
        let mask = Mask::new(3, 1, vec![0.1, 0.5, 0.85]).unwrap();
        let out = mac_style(&mask, 0.25);
        assert_eq!(out.as_slice()[0], 0.0);
        assert_eq!(out.as_slice()[2], 1.0);
        let expected = ((0.5_f32 - 0.15) / 0.65).powf(1.8);
        assert!((out.as_slice()[1] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_mac_style_neighbor_vote() {
        // an uncertain pixel surrounded by background is pushed down
        let mut data = vec![0.0; 9];
        data[4] = 0.6;
        let out = mac_style(&Mask::new(3, 3, data).unwrap(), 0.25);
        let remapped = ((0.6_f32 - 0.15) / 0.65).powf(1.8);
        assert!((out.get(1, 1) - (remapped - 0.3).max(0.0)).abs() < 1e-6);

        let mut data = vec![1.0; 9];
        data[4] = 0.6;
        let out = mac_style(&Mask::new(3, 3, data).unwrap(), 0.25);
        assert!((out.get(1, 1) - (remapped + 0.2)).abs() < 1e-6);
    }
}
