//! Color and edge feature extractors
//!
//! Pure functions over a [`PixelBuffer`](crate::types::PixelBuffer) shared by every mask
//! builder: gradient maps, HSL contrast adjustment and color clustering.

pub mod clustering;
pub mod color;
pub mod edges;

pub use clustering::{
    detect_border_colors, detect_dominant_colors, kmeans, quantized_histogram, ColorCount,
};
pub use color::{enhance_contrast, hsl_to_rgb, rgb_to_hsl};
pub use edges::{
    compute_edge_map, fused_edge_map, gaussian_kernel, grayscale, local_contrast_map,
    simplified_canny,
};

/// Border pixel indices: top row, bottom row, then the left and right columns
///
/// Every border pixel appears exactly once.
#[must_use]
pub fn border_indices(width: u32, height: u32) -> Vec<usize> {
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
        return Vec::new();
    }

    let mut indices = Vec::with_capacity(2 * w + 2 * h);
    indices.extend(0..w);
    if h > 1 {
        indices.extend((0..w).map(|x| (h - 1) * w + x));
    }
    for y in 1..h.saturating_sub(1) {
        indices.push(y * w);
        if w > 1 {
            indices.push(y * w + w - 1);
        }
    }
    indices
}

/// Border pixel indices in clockwise order starting at the top-left corner
#[must_use]
pub fn perimeter_indices(width: u32, height: u32) -> Vec<usize> {
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
        return Vec::new();
    }
    if h == 1 {
        return (0..w).collect();
    }
    if w == 1 {
        return (0..h).collect();
    }

    let mut indices = Vec::with_capacity(2 * (w + h) - 4);
    indices.extend(0..w);
    indices.extend((1..h).map(|y| y * w + w - 1));
    indices.extend((0..w - 1).rev().map(|x| (h - 1) * w + x));
    indices.extend((1..h - 1).rev().map(|y| y * w));
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_border_indices_unique_and_complete() {
        for (w, h) in [(1, 1), (1, 5), (5, 1), (2, 2), (4, 3), (10, 10)] {
            let border = border_indices(w, h);
            let unique: HashSet<_> = border.iter().copied().collect();
            assert_eq!(unique.len(), border.len(), "{w}x{h}");

            let expected = if w == 1 || h == 1 {
                (w * h) as usize
            } else {
                (2 * w + 2 * h - 4) as usize
            };
            assert_eq!(border.len(), expected, "{w}x{h}");
        }
    }

    #[test]
    fn test_perimeter_is_clockwise() {
        assert_eq!(perimeter_indices(3, 3), vec![0, 1, 2, 5, 8, 7, 6, 3]);
        let p = perimeter_indices(10, 10);
        assert_eq!(p.len(), 36);
        let unique: HashSet<_> = p.iter().copied().collect();
        assert_eq!(unique.len(), p.len());
    }
}
