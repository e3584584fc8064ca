//! Smoothing filters: median, box mean and Gaussian

use super::morphology::is_interior;
use super::BorderMode;
use crate::features::gaussian_kernel;
use crate::types::Mask;
use crate::utils::parallel;

/// 3x3 median, repeated `passes` times
///
/// With `Clamp` the window is clipped at the image edge and the upper median of the
/// available values is taken.
#[must_use]
pub fn median(mask: &Mask, passes: u32, border: BorderMode) -> Mask {
    let (width, height) = mask.dimensions();
    let (w, h) = (width as usize, height as usize);
    let mut current = mask.clone();

    for _ in 0..passes {
        let src = current.as_slice();
        let data = parallel::map_pixels(w, h, |x, y| {
            if !is_interior(x, y, 1, w, h) {
                match border {
                    BorderMode::Retain => return src[y * w + x],
                    BorderMode::Zero => return 0.0,
                    BorderMode::Clamp => {},
                }
            }
            let mut window = [0.0_f32; 9];
            let mut n = 0;
            for yy in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for xx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    window[n] = src[yy * w + xx];
                    n += 1;
                }
            }
            let window = &mut window[..n];
            window.sort_unstable_by(f32::total_cmp);
            window[n / 2]
        });
        current = Mask::from_vec_unchecked(width, height, data);
    }
    current
}

/// Mean over the `(2r+1)²` window
#[must_use]
pub fn box_smooth(mask: &Mask, radius: u32, border: BorderMode) -> Mask {
    let side = 2 * radius as usize + 1;
    let weights = vec![1.0; side * side];
    weighted_window(mask, radius, border, &weights)
}

/// Gaussian smoothing with the normalized kernel of [`gaussian_kernel`]
///
/// With `Clamp` the kernel is clipped at the image edge and renormalized over the
/// remaining weights.
#[must_use]
pub fn gaussian(mask: &Mask, radius: u32, border: BorderMode) -> Mask {
    weighted_window(mask, radius, border, &gaussian_kernel(radius))
}

fn weighted_window(mask: &Mask, radius: u32, border: BorderMode, kernel: &[f32]) -> Mask {
    if radius == 0 {
        return mask.clone();
    }
    let (width, height) = mask.dimensions();
    let (w, h, r) = (width as usize, height as usize, radius as usize);
    let side = 2 * r + 1;
    let src = mask.as_slice();

    let data = parallel::map_pixels(w, h, |x, y| {
        if !is_interior(x, y, r, w, h) {
            match border {
                BorderMode::Retain => return src[y * w + x],
                BorderMode::Zero => return 0.0,
                BorderMode::Clamp => {},
            }
        }
        let mut sum = 0.0;
        let mut weight_sum = 0.0;
        for yy in y.saturating_sub(r)..=(y + r).min(h - 1) {
            let ky = yy + r - y;
            for xx in x.saturating_sub(r)..=(x + r).min(w - 1) {
                let weight = kernel[ky * side + (xx + r - x)];
                sum += src[yy * w + xx] * weight;
                weight_sum += weight;
            }
        }
        if weight_sum > 0.0 {
            sum / weight_sum
        } else {
            src[y * w + x]
        }
    });
    Mask::from_vec_unchecked(width, height, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_edge() -> Mask {
        Mask::from_fn(16, 16, |x, _| if x < 8 { 0.0 } else { 1.0 })
    }

    #[test]
    fn test_median_removes_salt_noise() {
        let mut data = vec![0.2; 49];
        data[24] = 1.0;
        let mask = Mask::new(7, 7, data).unwrap();
        let filtered = median(&mask, 1, BorderMode::Retain);
        assert!(filtered.as_slice().iter().all(|&v| (v - 0.2).abs() < 1e-6));
        assert_eq!(median(&mask, 0, BorderMode::Retain), mask);
    }

    #[test]
    fn test_median_clamp_handles_corners() {
        let mask = Mask::new(2, 2, vec![0.0, 1.0, 1.0, 1.0]).unwrap();
        let filtered = median(&mask, 1, BorderMode::Clamp);
        assert!(filtered.as_slice().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_gaussian_preserves_constant_masks() {
        let mask = Mask::filled(10, 10, 0.6);
        for border in [BorderMode::Retain, BorderMode::Clamp] {
            let blurred = gaussian(&mask, 3, border);
            assert!(blurred.as_slice().iter().all(|&v| (v - 0.6).abs() < 1e-5));
        }
    }

    #[test]
    fn test_gaussian_softens_step_within_range() {
        let blurred = gaussian(&step_edge(), 2, BorderMode::Clamp);
        let left = blurred.get(7, 8);
        let right = blurred.get(8, 8);
        assert!(left > 0.0 && left < 0.5);
        assert!(right > 0.5 && right < 1.0);
        assert!(blurred.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(gaussian(&step_edge(), 0, BorderMode::Clamp), step_edge());
    }

    #[test]
    fn test_retain_keeps_edge_band() {
        let mask = step_edge();
        let blurred = box_smooth(&mask, 1, BorderMode::Retain);
        assert_eq!(blurred.get(0, 0), mask.get(0, 0));
        assert_eq!(blurred.get(15, 15), mask.get(15, 15));
        assert!((blurred.get(8, 5) - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_filters_are_deterministic() {
        let mask = Mask::from_fn(40, 30, |x, y| ((x * 31 + y * 17) % 23) as f32 / 22.0);
        assert_eq!(median(&mask, 2, BorderMode::Retain), median(&mask, 2, BorderMode::Retain));
        assert_eq!(
            gaussian(&mask, 3, BorderMode::Clamp),
            gaussian(&mask, 3, BorderMode::Clamp)
        );
    }

    #[test]
    fn test_gaussian_clamp_renormalizes_clipped_window() {
        let mut data = vec![0.0; 25];
        data[0] = 1.0;
        let mask = Mask::new(5, 5, data).unwrap();
        let blurred = gaussian(&mask, 1, BorderMode::Clamp);

        // radius 1: sigma = 1/3, so axis weight e^-4.5 and diagonal weight e^-9
        let axis = (-4.5_f32).exp();
        let diagonal = (-9.0_f32).exp();
        let corner = 1.0 / (1.0 + 2.0 * axis + diagonal);
        assert!((blurred.get(0, 0) - corner).abs() < 1e-5);

        let edge = axis / (1.0 + 3.0 * axis + 2.0 * diagonal);
        assert!((blurred.get(1, 0) - edge).abs() < 1e-5);
        assert!((blurred.get(0, 1) - edge).abs() < 1e-5);
        assert!((blurred.get(1, 1) - diagonal / (1.0 + 4.0 * axis + 4.0 * diagonal)).abs() < 1e-5);
        assert_eq!(blurred.get(3, 3), 0.0);
    }
}
