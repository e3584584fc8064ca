//! Thresholding and neighborhood min/max operations

use super::BorderMode;
use crate::types::Mask;
use crate::utils::parallel;

/// `v > threshold ? 1 : 0`
#[must_use]
pub fn binarize(mask: &Mask, threshold: f32) -> Mask {
    mask.map(|v| if v > threshold { 1.0 } else { 0.0 })
}

/// Whether the full `(2r+1)²` window around `(x, y)` lies inside the image
#[inline]
pub(crate) fn is_interior(x: usize, y: usize, radius: usize, width: usize, height: usize) -> bool {
    x >= radius && y >= radius && x + radius < width && y + radius < height
}

/// Fold the square window of `radius` around every pixel with `op`
///
/// `Clamp` clips the window to the image; `Retain` and `Zero` only evaluate interior
/// pixels and respectively copy the input or write 0 elsewhere.
pub(crate) fn window_fold<F>(mask: &Mask, radius: u32, border: BorderMode, init: f32, op: F) -> Mask
where
    F: Fn(f32, f32) -> f32 + Sync + Send,
{
    if radius == 0 {
        return mask.clone();
    }
    let (width, height) = mask.dimensions();
    let (w, h, r) = (width as usize, height as usize, radius as usize);
    let src = mask.as_slice();

    let data = parallel::map_pixels(w, h, |x, y| {
        if !is_interior(x, y, r, w, h) {
            match border {
                BorderMode::Retain => return src[y * w + x],
                BorderMode::Zero => return 0.0,
                BorderMode::Clamp => {},
            }
        }
        let mut acc = init;
        for yy in y.saturating_sub(r)..=(y + r).min(h - 1) {
            for xx in x.saturating_sub(r)..=(x + r).min(w - 1) {
                acc = op(acc, src[yy * w + xx]);
            }
        }
        acc
    });
    Mask::from_vec_unchecked(width, height, data)
}

/// Neighborhood minimum over a `(2r+1)²` window
#[must_use]
pub fn erode(mask: &Mask, radius: u32, border: BorderMode) -> Mask {
    window_fold(mask, radius, border, 1.0, f32::min)
}

/// Neighborhood maximum over a `(2r+1)²` window
#[must_use]
pub fn dilate(mask: &Mask, radius: u32, border: BorderMode) -> Mask {
    window_fold(mask, radius, border, 0.0, f32::max)
}

/// Erode then dilate; removes foreground specks smaller than the window
#[must_use]
pub fn open(mask: &Mask, radius: u32, border: BorderMode) -> Mask {
    dilate(&erode(mask, radius, border), radius, border)
}

/// Dilate then erode; fills background holes smaller than the window
#[must_use]
pub fn close(mask: &Mask, radius: u32, border: BorderMode) -> Mask {
    erode(&dilate(mask, radius, border), radius, border)
}

/// 3x3 majority vote over binary labels (`v >= 0.5`), repeated `passes` times
///
/// Interior pixels become 1 when at least 5 of the 9 window pixels are foreground and
/// 0 otherwise; the outermost ring keeps its input value.
#[must_use]
pub fn majority_vote(mask: &Mask, passes: u32) -> Mask {
    let (width, height) = mask.dimensions();
    let (w, h) = (width as usize, height as usize);
    let mut current = mask.clone();

    for _ in 0..passes {
        let src = current.as_slice();
        let data = parallel::map_pixels(w, h, |x, y| {
            if !is_interior(x, y, 1, w, h) {
                return src[y * w + x];
            }
            let mut foreground = 0;
            for yy in y - 1..=y + 1 {
                for xx in x - 1..=x + 1 {
                    if src[yy * w + xx] >= 0.5 {
                        foreground += 1;
                    }
                }
            }
            if foreground > 4 {
                1.0
            } else {
                0.0
            }
        });
        current = Mask::from_vec_unchecked(width, height, data);
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: u32, from: u32, to: u32) -> Mask {
        Mask::from_fn(size, size, |x, y| {
            if (from..to).contains(&x) && (from..to).contains(&y) {
                1.0
            } else {
                0.0
            }
        })
    }

    #[test]
    fn test_binarize_is_idempotent() {
        let mask = Mask::from_fn(16, 16, |x, y| ((x * 7 + y * 3) % 17) as f32 / 16.0);
        for t in [0.0, 0.25, 0.5, 0.9] {
            let once = binarize(&mask, t);
            assert_eq!(binarize(&once, t), once);
        }
    }

    #[test]
    fn test_erode_dilate_on_square() {
        let mask = square(12, 3, 9);
        let eroded = erode(&mask, 1, BorderMode::Clamp);
        assert_eq!(eroded.get(3, 3), 0.0);
        assert_eq!(eroded.get(4, 4), 1.0);

        let dilated = dilate(&mask, 1, BorderMode::Clamp);
        assert_eq!(dilated.get(2, 2), 1.0);
        assert_eq!(dilated.get(1, 1), 0.0);
    }

    #[test]
    fn test_open_removes_specks_and_close_fills_holes() {
        let mut speck = vec![0.0; 100];
        speck[55] = 1.0;
        let speck = Mask::new(10, 10, speck).unwrap();
        assert!(open(&speck, 1, BorderMode::Retain)
            .as_slice()
            .iter()
            .all(|&v| v == 0.0));

        let mut hole = vec![1.0; 100];
        hole[55] = 0.0;
        let hole = Mask::new(10, 10, hole).unwrap();
        assert!(close(&hole, 1, BorderMode::Retain)
            .as_slice()
            .iter()
            .all(|&v| v == 1.0));
    }

    #[test]
    fn test_open_close_duality_bounds() {
        let mask = Mask::from_fn(20, 20, |x, y| ((x * 13 + y * 29) % 11) as f32 / 10.0);
        let opened = open(&mask, 2, BorderMode::Clamp);
        let closed = close(&mask, 2, BorderMode::Clamp);
        for (i, &v) in mask.as_slice().iter().enumerate() {
            assert!(opened.as_slice()[i] <= v);
            assert!(closed.as_slice()[i] >= v);
        }

        // retained borders: interior pixel in uniform background stays put
        let mut data = vec![0.0; 400];
        data[0] = 1.0;
        data[210] = 1.0;
        let specks = Mask::new(20, 20, data).unwrap();
        assert_eq!(open(&specks, 2, BorderMode::Retain).get(10, 10), 0.0);
        assert_eq!(close(&Mask::filled(20, 20, 1.0), 2, BorderMode::Retain).get(10, 10), 1.0);
    }

    #[test]
    fn test_border_modes() {
        let mask = Mask::filled(6, 6, 0.7);
        let retained = erode(&mask, 2, BorderMode::Retain);
        let zeroed = erode(&mask, 2, BorderMode::Zero);
        let clamped = erode(&mask, 2, BorderMode::Clamp);
        assert_eq!(retained, mask);
        assert_eq!(zeroed.get(0, 0), 0.0);
        assert_eq!(zeroed.get(2, 2), 0.7);
        assert_eq!(clamped, mask);
    }

    #[test]
    fn test_majority_vote_removes_isolated_pixels() {
        let mut data = vec![0.0; 64];
        data[27] = 1.0;
        let mask = Mask::new(8, 8, data).unwrap();
        let voted = majority_vote(&mask, 1);
        assert!(voted.as_slice().iter().all(|&v| v == 0.0));

        let solid = square(8, 1, 7);
        assert_eq!(majority_vote(&solid, 3).get(3, 3), 1.0);
    }
}
