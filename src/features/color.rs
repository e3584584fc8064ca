//! HSL conversion and lightness contrast enhancement

use crate::types::{Color, PixelBuffer};
use crate::utils::parallel;

/// Convert to HSL, every component in [0,1]
#[must_use]
pub fn rgb_to_hsl(color: Color) -> (f32, f32, f32) {
    let r = f32::from(color.r) / 255.0;
    let g = f32::from(color.g) / 255.0;
    let b = f32::from(color.b) / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < f32::EPSILON {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if (max - r).abs() < f32::EPSILON {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if (max - g).abs() < f32::EPSILON {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    (h / 6.0, s, l)
}

fn hue_to_channel(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

/// Convert HSL components in [0,1] back to RGB
#[must_use]
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> Color {
    let to_u8 = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;
    if s <= f32::EPSILON {
        let v = to_u8(l);
        return Color::new(v, v, v);
    }

    let q = if l < 0.5 {
        l * (1.0 + s)
    } else {
        l + s - l * s
    };
    let p = 2.0 * l - q;
    Color::new(
        to_u8(hue_to_channel(p, q, h + 1.0 / 3.0)),
        to_u8(hue_to_channel(p, q, h)),
        to_u8(hue_to_channel(p, q, h - 1.0 / 3.0)),
    )
}

/// Stretch HSL lightness around 0.5: `l' = clamp((l - 0.5) * factor + 0.5)`
///
/// Hue, saturation and alpha are kept.
#[must_use]
pub fn enhance_contrast(pixels: &PixelBuffer, factor: f32) -> PixelBuffer {
    if (factor - 1.0).abs() < f32::EPSILON {
        return pixels.clone();
    }

    let mut out = pixels.clone();
    let row_bytes = pixels.width() as usize * 4;
    let source = pixels.as_raw();
    parallel::fill_rows(pixels.width() as usize, 4, out.data_mut(), |y, row| {
        let src = &source[y * row_bytes..(y + 1) * row_bytes];
        for (dst, px) in row.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
            let (h, s, l) = rgb_to_hsl(Color::new(px[0], px[1], px[2]));
            let l = ((l - 0.5) * factor + 0.5).clamp(0.0, 1.0);
            let c = hsl_to_rgb(h, s, l);
            dst[0] = c.r;
            dst[1] = c.g;
            dst[2] = c.b;
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hsl_round_trip() {
        let samples = [
            Color::new(0, 0, 0),
            Color::new(255, 255, 255),
            Color::new(255, 0, 0),
            Color::new(12, 200, 99),
            Color::new(80, 80, 200),
            Color::new(250, 240, 10),
        ];
        for color in samples {
            let (h, s, l) = rgb_to_hsl(color);
            let back = hsl_to_rgb(h, s, l);
            assert!(
                color.distance(&back) <= 2.0,
                "{color:?} -> {back:?} via ({h}, {s}, {l})"
            );
        }
    }

    #[test]
    fn test_known_hsl_values() {
        let (h, s, l) = rgb_to_hsl(Color::new(255, 0, 0));
        assert!(h.abs() < 1e-6);
        assert!((s - 1.0).abs() < 1e-6);
        assert!((l - 0.5).abs() < 1e-6);

        let (_, s, l) = rgb_to_hsl(Color::new(128, 128, 128));
        assert_eq!(s, 0.0);
        assert!((l - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_enhance_contrast_spreads_lightness_and_keeps_alpha() {
        let pixels = PixelBuffer::from_fn(2, 1, |x, _| {
            if x == 0 {
                [60, 60, 60, 10]
            } else {
                [200, 200, 200, 250]
            }
        })
        .unwrap();

        let boosted = enhance_contrast(&pixels, 1.5);
        assert!(boosted.color_at(0).r < 60);
        assert!(boosted.color_at(1).r > 200);
        assert_eq!(boosted.alpha_at(0), 10);
        assert_eq!(boosted.alpha_at(1), 250);

        assert_eq!(enhance_contrast(&pixels, 1.0), pixels);
    }
}
