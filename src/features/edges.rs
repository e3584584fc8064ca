//! Gradient-based edge maps over the `(r + g + b) / 3` gray level
//!
//! All maps are normalized by 255 and clamped into [0,1]. Pixels whose 3x3
//! neighborhood leaves the image are 0.

use crate::types::{Mask, PixelBuffer};
use crate::utils::parallel;

/// Gray level of every pixel
#[must_use]
pub fn grayscale(pixels: &PixelBuffer) -> Vec<f32> {
    pixels
        .as_raw()
        .chunks_exact(4)
        .map(|px| (f32::from(px[0]) + f32::from(px[1]) + f32::from(px[2])) / 3.0)
        .collect()
}

fn sobel_plane(gray: &[f32], width: usize, height: usize) -> Vec<f32> {
    parallel::map_pixels(width, height, |x, y| {
        if x == 0 || y == 0 || x + 1 >= width || y + 1 >= height {
            return 0.0;
        }
        let p = |dx: isize, dy: isize| {
            let xx = (x as isize + dx) as usize;
            let yy = (y as isize + dy) as usize;
            gray[yy * width + xx]
        };
        let gx = (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1));
        let gy = (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1));
        (gx * gx + gy * gy).sqrt() / 255.0
    })
}

/// Sobel gradient magnitude divided by 255
///
/// The one-pixel border is left at 0.
#[must_use]
pub fn compute_edge_map(pixels: &PixelBuffer) -> Mask {
    let (width, height) = pixels.dimensions();
    let gray = grayscale(pixels);
    let plane = sobel_plane(&gray, width as usize, height as usize);
    Mask::from_vec_unchecked(width, height, plane)
}

/// Normalized 2D Gaussian kernel of side `2r + 1` with `sigma = r / 3`
///
/// Radius 0 yields the identity kernel `[1.0]`.
#[must_use]
pub fn gaussian_kernel(radius: u32) -> Vec<f32> {
    let r = radius as i32;
    let side = (2 * r + 1) as usize;
    if radius == 0 {
        return vec![1.0];
    }

    let sigma = radius as f32 / 3.0;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut kernel = Vec::with_capacity(side * side);
    for dy in -r..=r {
        for dx in -r..=r {
            let d2 = (dx * dx + dy * dy) as f32;
            kernel.push((-d2 / two_sigma_sq).exp());
        }
    }
    let sum: f32 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}

/// Gaussian blur of a gray plane with edge-clamped sampling
fn blur_plane(gray: &[f32], width: usize, height: usize, radius: u32) -> Vec<f32> {
    let kernel = gaussian_kernel(radius);
    let r = radius as isize;
    let side = (2 * r + 1) as usize;
    parallel::map_pixels(width, height, |x, y| {
        let mut acc = 0.0;
        for ky in 0..side {
            let yy = (y as isize + ky as isize - r).clamp(0, height as isize - 1) as usize;
            for kx in 0..side {
                let xx = (x as isize + kx as isize - r).clamp(0, width as isize - 1) as usize;
                acc += gray[yy * width + xx] * kernel[ky * side + kx];
            }
        }
        acc
    })
}

/// Simplified Canny: radius-1 Gaussian blur followed by forward differences
///
/// The last row and column have no forward neighbor and stay at 0.
#[must_use]
pub fn simplified_canny(pixels: &PixelBuffer) -> Mask {
    let (width, height) = pixels.dimensions();
    let (w, h) = (width as usize, height as usize);
    let blurred = blur_plane(&grayscale(pixels), w, h, 1);
    let plane = parallel::map_pixels(w, h, |x, y| {
        if x + 1 >= w || y + 1 >= h {
            return 0.0;
        }
        let here = blurred[y * w + x];
        let dx = blurred[y * w + x + 1] - here;
        let dy = blurred[(y + 1) * w + x] - here;
        (dx * dx + dy * dy).sqrt() / 255.0
    });
    Mask::from_vec_unchecked(width, height, plane)
}

/// `max(sobel, 0.8 * simplified_canny)`
#[must_use]
pub fn fused_edge_map(pixels: &PixelBuffer) -> Mask {
    let sobel = compute_edge_map(pixels);
    let canny = simplified_canny(pixels);
    let data = sobel
        .as_slice()
        .iter()
        .zip(canny.as_slice())
        .map(|(&s, &c)| s.max(0.8 * c))
        .collect();
    Mask::from_vec_unchecked(pixels.width(), pixels.height(), data)
}

/// Absolute difference between each pixel and the mean of its 8 neighbors, over 255
#[must_use]
pub fn local_contrast_map(pixels: &PixelBuffer) -> Mask {
    let (width, height) = pixels.dimensions();
    let (w, h) = (width as usize, height as usize);
    let gray = grayscale(pixels);
    let plane = parallel::map_pixels(w, h, |x, y| {
        if x == 0 || y == 0 || x + 1 >= w || y + 1 >= h {
            return 0.0;
        }
        let mut sum = 0.0;
        for yy in y - 1..=y + 1 {
            for xx in x - 1..=x + 1 {
                if xx != x || yy != y {
                    sum += gray[yy * w + xx];
                }
            }
        }
        (gray[y * w + x] - sum / 8.0).abs() / 255.0
    });
    Mask::from_vec_unchecked(width, height, plane)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertical_split(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer::from_fn(width, height, |x, _| {
            if x < width / 2 {
                [0, 0, 0, 255]
            } else {
                [255, 255, 255, 255]
            }
        })
        .unwrap()
    }

    #[test]
    fn test_uniform_image_has_no_edges() {
        let pixels = PixelBuffer::filled(8, 8, [120, 40, 200, 255]).unwrap();
        assert!(compute_edge_map(&pixels).as_slice().iter().all(|&v| v == 0.0));
        assert!(simplified_canny(&pixels).as_slice().iter().all(|&v| v.abs() < 1e-5));
        assert!(local_contrast_map(&pixels).as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_sobel_detects_step_and_leaves_border_zero() {
        let pixels = vertical_split(8, 6);
        let edges = compute_edge_map(&pixels);

        assert_eq!(edges.get(4, 3), 1.0);
        assert_eq!(edges.get(3, 3), 1.0);
        assert_eq!(edges.get(1, 3), 0.0);
        for x in 0..8 {
            assert_eq!(edges.get(x, 0), 0.0);
            assert_eq!(edges.get(x, 5), 0.0);
        }
        for y in 0..6 {
            assert_eq!(edges.get(0, y), 0.0);
            assert_eq!(edges.get(7, y), 0.0);
        }
    }

    #[test]
    fn test_edge_maps_are_deterministic_and_in_range() {
        let pixels = PixelBuffer::from_fn(40, 30, |x, y| {
            [(x * 7 % 256) as u8, (y * 11 % 256) as u8, ((x + y) * 5 % 256) as u8, 255]
        })
        .unwrap();

        let a = fused_edge_map(&pixels);
        let b = fused_edge_map(&pixels);
        assert_eq!(a, b);
        assert!(a.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));

        let sobel = compute_edge_map(&pixels);
        for (fused, s) in a.as_slice().iter().zip(sobel.as_slice()) {
            assert!(fused >= s);
        }
    }

    #[test]
    fn test_gaussian_kernel_normalized() {
        assert_eq!(gaussian_kernel(0), vec![1.0]);
        for radius in 1..=4 {
            let kernel = gaussian_kernel(radius);
            let side = (2 * radius + 1) as usize;
            assert_eq!(kernel.len(), side * side);
            let sum: f32 = kernel.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
            let center = kernel[kernel.len() / 2];
            assert!(kernel.iter().all(|&w| w <= center));
        }
    }

    #[test]
    fn test_tiny_images() {
        let pixels = PixelBuffer::filled(1, 1, [255, 0, 0, 255]).unwrap();
        assert_eq!(compute_edge_map(&pixels).as_slice(), &[0.0]);
        assert_eq!(simplified_canny(&pixels).as_slice(), &[0.0]);
        assert_eq!(fused_edge_map(&pixels).dimensions(), (1, 1));
    }
}
