//! Row-parallel helpers for per-pixel stages
//!
//! Every output pixel of an edge map, classifier or morphology pass depends only on a
//! read-only neighborhood of its input, so rows can be written by independent workers.
//! Small images stay on the calling thread.

use rayon::prelude::*;

/// Pixel count above which rows are distributed over the rayon pool
pub const PARALLEL_PIXEL_THRESHOLD: usize = 32 * 1024;

/// Whether an image of `pixel_count` pixels is split across the rayon pool
#[must_use]
pub fn runs_in_parallel(pixel_count: usize) -> bool {
    pixel_count >= PARALLEL_PIXEL_THRESHOLD
}

/// Fill `out` one row at a time, calling `f(y, row)` for every row
///
/// `out` holds `channels` interleaved values per pixel and `width` pixels per row.
pub fn fill_rows<T, F>(width: usize, channels: usize, out: &mut [T], f: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync + Send,
{
    if width == 0 || channels == 0 {
        return;
    }

    let row_len = width * channels;
    if runs_in_parallel(out.len() / channels) {
        out.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| f(y, row));
    } else {
        out.chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| f(y, row));
    }
}

/// Build a dense row-major plane by evaluating `f(x, y)` for every pixel
pub fn map_pixels<F>(width: usize, height: usize, f: F) -> Vec<f32>
where
    F: Fn(usize, usize) -> f32 + Sync + Send,
{
    let mut out = vec![0.0_f32; width * height];
    fill_rows(width, 1, &mut out, |y, row| {
        for (x, value) in row.iter_mut().enumerate() {
            *value = f(x, y);
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_and_sequential_paths_agree() {
        let f = |x: usize, y: usize| ((x * 31 + y * 17) % 101) as f32 / 100.0;

        let small = map_pixels(16, 8, f);
        assert_eq!(small.len(), 128);
        assert!((small[17] - f(1, 1)).abs() < f32::EPSILON);

        // 256 x 256 crosses the threshold and takes the rayon path
        let large = map_pixels(256, 256, f);
        for (i, value) in large.iter().enumerate() {
            assert_eq!(*value, f(i % 256, i / 256));
        }
    }

    #[test]
    fn test_zero_width_is_noop() {
        let mut out: Vec<f32> = Vec::new();
        fill_rows(0, 1, &mut out, |_, _| panic!("no rows expected"));
        assert!(out.is_empty());
    }

    #[test]
    fn test_interleaved_buffers_count_pixels_not_values() {
        // 96 x 96 RGBA: 9216 pixels, 36864 bytes
        let (width, height) = (96, 96);
        assert!(!runs_in_parallel(width * height));
        assert!(width * height * 4 >= PARALLEL_PIXEL_THRESHOLD);

        let mut rgba = vec![0_u8; width * height * 4];
        let on_pool = std::sync::atomic::AtomicBool::new(false);
        fill_rows(width, 4, &mut rgba, |y, row| {
            assert_eq!(row.len(), width * 4);
            if rayon::current_thread_index().is_some() {
                on_pool.store(true, std::sync::atomic::Ordering::Relaxed);
            }
            row.fill(y as u8);
        });
        assert!(!on_pool.into_inner());
        assert_eq!(rgba[width * 4 * 5], 5);
        assert_eq!(rgba[rgba.len() - 1], (height - 1) as u8);
    }

    #[test]
    fn test_threshold_is_in_pixels() {
        assert!(!runs_in_parallel(PARALLEL_PIXEL_THRESHOLD - 1));
        assert!(runs_in_parallel(PARALLEL_PIXEL_THRESHOLD));
    }
}
