//! ONNX salient-object segmenter running on Tract
//!
//! Loads a single-input, single-output ONNX model (U2-Net style: NCHW float input of a
//! fixed square size, one probability plane out) and answers with one
//! [`RawMask::FlatFloatArray`] resampled to the image size. Loading and inference run on
//! the blocking thread pool.

use super::ExternalSegmenter;
use crate::builders::{external::resample_bilinear, RawMask};
use crate::error::{BgRemovalError, Result};
use crate::types::PixelBuffer;
use async_trait::async_trait;
use image::imageops::{self, FilterType};
use instant::Instant;
use ndarray::Array4;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tract_onnx::prelude::*;

type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Input preprocessing for the model
#[derive(Debug, Clone, PartialEq)]
pub struct TractInputSpec {
    /// Square input side in pixels
    pub size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for TractInputSpec {
    fn default() -> Self {
        Self {
            size: 320,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }
}

/// [`ExternalSegmenter`] backed by a Tract ONNX model
pub struct TractSegmenter {
    model_path: PathBuf,
    input: TractInputSpec,
    model: Option<Arc<TractModel>>,
}

impl std::fmt::Debug for TractSegmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TractSegmenter")
            .field("model_path", &self.model_path)
            .field("input", &self.input)
            .field("loaded", &self.model.is_some())
            .finish()
    }
}

impl TractSegmenter {
    pub fn new<P: Into<PathBuf>>(model_path: P) -> Self {
        Self {
            model_path: model_path.into(),
            input: TractInputSpec::default(),
            model: None,
        }
    }

    #[must_use]
    pub fn with_input_spec(mut self, input: TractInputSpec) -> Self {
        self.input = input;
        self
    }

    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    fn load(path: &Path, size: u32) -> Result<TractModel> {
        let side = size as usize;
        onnx()
            .model_for_path(path)
            .map_err(|e| BgRemovalError::segmenter(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([1, 3, side, side]).into())
            .map_err(|e| BgRemovalError::segmenter(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| BgRemovalError::segmenter(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| BgRemovalError::segmenter(format!("Failed to create runnable model: {e}")))
    }

    /// Resize to the model square and normalize into an NCHW tensor
    fn preprocess(pixels: &PixelBuffer, spec: &TractInputSpec) -> Result<Array4<f32>> {
        let side = spec.size as usize;
        let resized = imageops::resize(&pixels.to_rgba_image()?, spec.size, spec.size, FilterType::Triangle);
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
        for (x, y, px) in resized.enumerate_pixels() {
            for c in 0..3 {
                let v = f32::from(px[c]) / 255.0;
                tensor[[0, c, y as usize, x as usize]] = (v - spec.mean[c]) / spec.std[c];
            }
        }
        Ok(tensor)
    }

    fn infer(model: &TractModel, pixels: &PixelBuffer, spec: &TractInputSpec) -> Result<RawMask> {
        let start = Instant::now();
        let input = Self::preprocess(pixels, spec)?;
        let outputs = model
            .run(tvec![Tensor::from(input).into()])
            .map_err(|e| BgRemovalError::segmenter(format!("Tract inference failed: {e}")))?;
        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| BgRemovalError::segmenter("No output tensor found"))?
            .into_arc_tensor();
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| BgRemovalError::segmenter(format!("Failed to read output tensor: {e}")))?;

        let plane: Vec<f32> = view.iter().copied().collect();
        let side = spec.size as usize;
        if plane.len() < side * side {
            return Err(BgRemovalError::segmenter(format!(
                "Expected at least {} output values, got {}",
                side * side,
                plane.len()
            )));
        }
        // first probability plane
        let plane = &plane[..side * side];
        let values = resample_bilinear(plane, spec.size, spec.size, pixels.width(), pixels.height());
        log::debug!("Tract inference completed in {}ms", start.elapsed().as_millis());

        Ok(RawMask::FlatFloatArray {
            width: pixels.width(),
            height: pixels.height(),
            values,
        })
    }
}

#[async_trait]
impl ExternalSegmenter for TractSegmenter {
    fn name(&self) -> &str {
        "tract"
    }

    async fn initialize(&mut self) -> Result<()> {
        let path = self.model_path.clone();
        let size = self.input.size;
        log::info!("Loading ONNX model from {}", path.display());
        let model = tokio::task::spawn_blocking(move || Self::load(&path, size))
            .await
            .map_err(|e| BgRemovalError::internal(format!("model loading task failed: {e}")))??;
        self.model = Some(Arc::new(model));
        Ok(())
    }

    async fn segment(&self, pixels: &PixelBuffer) -> Result<Vec<RawMask>> {
        let model = self
            .model
            .clone()
            .ok_or_else(|| BgRemovalError::segmenter("Tract model not initialized"))?;
        let pixels = pixels.clone();
        let spec = self.input.clone();
        let mask = tokio::task::spawn_blocking(move || Self::infer(&model, &pixels, &spec))
            .await
            .map_err(|e| BgRemovalError::internal(format!("inference task failed: {e}")))??;
        Ok(vec![mask])
    }

    async fn dispose(&mut self) -> Result<()> {
        self.model = None;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.model.is_some()
    }
}
