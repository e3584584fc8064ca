//! External-mask adapter
//!
//! Normalizes whatever an external segmenter returns for one subject into a dense
//! foreground [`Mask`] of the target image size. The raw representation is an explicit
//! tagged union, so every input shape has one documented path.

use super::{ensure_non_empty, MaskBuilder};
use crate::config::ExternalMaskOptions;
use crate::error::{BgRemovalError, Result};
use crate::types::{Mask, PixelBuffer};
use log::debug;
use serde::{Deserialize, Serialize};

/// Raw per-subject output of an external segmenter
#[derive(Debug, Clone, PartialEq)]
pub enum RawMask {
    /// Row-major probabilities, either in [0,1] or in [0,255]
    FlatFloatArray {
        width: u32,
        height: u32,
        values: Vec<f32>,
    },
    /// An encoded image (PNG, JPEG, ...) carrying the mask in one of its channels
    EncodedBitmap(Vec<u8>),
    /// Decoded RGBA samples whose data-bearing channel is unknown
    ChannelGuessRequired {
        width: u32,
        height: u32,
        rgba: Vec<u8>,
    },
}

/// Channel chosen when extracting a mask from RGBA samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskChannel {
    Alpha,
    Red,
    Green,
    /// `(r + g + b) / 3`, used when every probed channel only holds 0 and 255
    Luminance,
}

impl MaskChannel {
    /// Probe order for data-bearing channels
    const PROBE_ORDER: [(MaskChannel, usize); 3] = [
        (MaskChannel::Alpha, 3),
        (MaskChannel::Red, 0),
        (MaskChannel::Green, 1),
    ];

    /// First channel holding any value strictly between 0 and 255
    #[must_use]
    pub fn detect(rgba: &[u8]) -> Self {
        for (channel, offset) in Self::PROBE_ORDER {
            if rgba
                .chunks_exact(4)
                .any(|px| px[offset] > 0 && px[offset] < 255)
            {
                return channel;
            }
        }
        MaskChannel::Luminance
    }

    fn extract(self, px: &[u8]) -> f32 {
        let value = match self {
            MaskChannel::Alpha => f32::from(px[3]),
            MaskChannel::Red => f32::from(px[0]),
            MaskChannel::Green => f32::from(px[1]),
            MaskChannel::Luminance => {
                (f32::from(px[0]) + f32::from(px[1]) + f32::from(px[2])) / 3.0
            },
        };
        value / 255.0
    }
}

/// Converts [`RawMask`] values into masks
#[derive(Debug, Clone, Default)]
pub struct ExternalMaskAdapter {
    options: ExternalMaskOptions,
}

impl ExternalMaskAdapter {
    #[must_use]
    pub fn new(options: ExternalMaskOptions) -> Self {
        Self { options }
    }

    /// Normalize `raw` into a `width` x `height` mask
    ///
    /// Values are scaled to [0,1], bilinearly resampled when the raw resolution differs,
    /// and inverted when the leading `inversion_samples` values average above
    /// `inversion_mean` (the raw data then encodes background confidence).
    ///
    /// # Errors
    /// - `MaskDecode` when the raw data is empty, non-finite, undecodable or its length
    ///   does not match its declared size
    pub fn normalize(&self, raw: &RawMask, width: u32, height: u32) -> Result<Mask> {
        let (src_w, src_h, mut values) = match raw {
            RawMask::FlatFloatArray {
                width: w,
                height: h,
                values,
            } => (*w, *h, Self::flat_values(*w, *h, values)?),
            RawMask::EncodedBitmap(bytes) => {
                let decoded = image::load_from_memory(bytes)
                    .map_err(|e| BgRemovalError::mask_decode(format!("undecodable bitmap: {e}")))?
                    .to_rgba8();
                let (w, h) = decoded.dimensions();
                (w, h, Self::channel_values(w, h, decoded.as_raw())?)
            },
            RawMask::ChannelGuessRequired {
                width: w,
                height: h,
                rgba,
            } => (*w, *h, Self::channel_values(*w, *h, rgba)?),
        };

        let sample = values.len().min(self.options.inversion_samples.max(1));
        let sample_mean = values[..sample].iter().sum::<f32>() / sample as f32;
        if sample_mean > self.options.inversion_mean {
            debug!("raw mask sample mean {sample_mean:.3} encodes background, inverting");
            for v in &mut values {
                *v = 1.0 - *v;
            }
        }

        if (src_w, src_h) != (width, height) {
            debug!("resampling raw mask {src_w}x{src_h} -> {width}x{height}");
            values = resample_bilinear(&values, src_w, src_h, width, height);
        }
        Mask::new(width, height, values)
    }

    fn flat_values(width: u32, height: u32, values: &[f32]) -> Result<Vec<f32>> {
        if values.is_empty() {
            return Err(BgRemovalError::mask_decode("raw mask holds no values"));
        }
        if values.len() != width as usize * height as usize {
            return Err(BgRemovalError::mask_decode(format!(
                "raw mask declares {width}x{height} but holds {} values",
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(BgRemovalError::mask_decode("raw mask contains non-finite values"));
        }

        let max = values.iter().copied().fold(f32::MIN, f32::max);
        let scale = if max > 1.0 { 1.0 / 255.0 } else { 1.0 };
        Ok(values.iter().map(|v| (v * scale).clamp(0.0, 1.0)).collect())
    }

    fn channel_values(width: u32, height: u32, rgba: &[u8]) -> Result<Vec<f32>> {
        let expected = width as usize * height as usize * 4;
        if expected == 0 || rgba.len() != expected {
            return Err(BgRemovalError::mask_decode(format!(
                "expected {expected} RGBA bytes for {width}x{height}, got {}",
                rgba.len()
            )));
        }
        let channel = MaskChannel::detect(rgba);
        debug!("extracting mask from {channel:?} channel");
        Ok(rgba.chunks_exact(4).map(|px| channel.extract(px)).collect())
    }
}

/// Bilinear resampling with pixel-center alignment and edge clamping
#[must_use]
pub fn resample_bilinear(values: &[f32], src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Vec<f32> {
    let (sw, sh) = (src_w as usize, src_h as usize);
    let sx = src_w as f32 / dst_w.max(1) as f32;
    let sy = src_h as f32 / dst_h.max(1) as f32;

    let mut out = Vec::with_capacity(dst_w as usize * dst_h as usize);
    for y in 0..dst_h {
        let fy = ((y as f32 + 0.5) * sy - 0.5).clamp(0.0, (sh - 1) as f32);
        let y0 = fy.floor() as usize;
        let y1 = (y0 + 1).min(sh - 1);
        let ty = fy - y0 as f32;
        for x in 0..dst_w {
            let fx = ((x as f32 + 0.5) * sx - 0.5).clamp(0.0, (sw - 1) as f32);
            let x0 = fx.floor() as usize;
            let x1 = (x0 + 1).min(sw - 1);
            let tx = fx - x0 as f32;

            let top = values[y0 * sw + x0] * (1.0 - tx) + values[y0 * sw + x1] * tx;
            let bottom = values[y1 * sw + x0] * (1.0 - tx) + values[y1 * sw + x1] * tx;
            out.push(top * (1.0 - ty) + bottom * ty);
        }
    }
    out
}

/// Mask builder over a segmenter's detections for one image
///
/// Only the first detection is used; multi-subject separation is not attempted.
#[derive(Debug, Clone)]
pub struct ExternalMaskBuilder {
    adapter: ExternalMaskAdapter,
    detections: Vec<RawMask>,
}

impl ExternalMaskBuilder {
    #[must_use]
    pub fn new(options: ExternalMaskOptions, detections: Vec<RawMask>) -> Self {
        Self {
            adapter: ExternalMaskAdapter::new(options),
            detections,
        }
    }
}

impl MaskBuilder for ExternalMaskBuilder {
    fn name(&self) -> &'static str {
        "external"
    }

    fn build(&self, pixels: &PixelBuffer) -> Result<Mask> {
        ensure_non_empty(pixels)?;
        let first = self
            .detections
            .first()
            .ok_or(BgRemovalError::NoSubjectDetected)?;
        if self.detections.len() > 1 {
            debug!(
                "segmenter reported {} subjects, using the first",
                self.detections.len()
            );
        }
        self.adapter.normalize(first, pixels.width(), pixels.height())
    }
}
