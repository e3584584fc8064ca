//! Mock segmenter for exercising the learned path without a model
//!
//! [`MockSegmenter`] records every call, can fail during initialization or inference,
//! can report zero detections and can sleep before answering (use a paused tokio clock
//! to test timeouts). Clones share the call history.

use super::ExternalSegmenter;
use crate::builders::RawMask;
use crate::error::{BgRemovalError, Result};
use crate::types::PixelBuffer;
use async_trait::async_trait;
use instant::Duration;
use std::sync::{Arc, Mutex};

/// What the mock returns from `segment`
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Soft circular subject at the image center, as a flat float array
    Disc,
    /// These detections, verbatim
    Fixed(Vec<RawMask>),
    /// Zero detections
    NoSubject,
    /// Inference error
    Fail,
}

/// Scriptable [`ExternalSegmenter`]
#[derive(Debug, Clone)]
pub struct MockSegmenter {
    initialized: bool,
    should_fail_init: bool,
    response: MockResponse,
    delay: Option<Duration>,
    call_history: Arc<Mutex<Vec<String>>>,
}

impl MockSegmenter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            should_fail_init: false,
            response: MockResponse::Disc,
            delay: None,
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn new_failing_init() -> Self {
        Self {
            should_fail_init: true,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn new_failing_inference() -> Self {
        Self::new().with_response(MockResponse::Fail)
    }

    #[must_use]
    pub fn new_no_subject() -> Self {
        Self::new().with_response(MockResponse::NoSubject)
    }

    #[must_use]
    pub fn with_masks(masks: Vec<RawMask>) -> Self {
        Self::new().with_response(MockResponse::Fixed(masks))
    }

    #[must_use]
    pub fn with_response(mut self, response: MockResponse) -> Self {
        self.response = response;
        self
    }

    /// Sleep for `delay` before every `segment` answer
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Method names in call order
    pub fn call_history(&self) -> Vec<String> {
        self.call_history
            .lock()
            .map(|history| history.clone())
            .unwrap_or_default()
    }

    /// Number of `segment` calls so far
    pub fn segment_calls(&self) -> usize {
        self.call_history().iter().filter(|c| *c == "segment").count()
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }

    /// Soft disc: 1 at the center falling linearly to 0 at a third of the short side
    fn disc(width: u32, height: u32) -> RawMask {
        let cx = width as f32 / 2.0;
        let cy = height as f32 / 2.0;
        let radius = (width.min(height) as f32 / 3.0).max(1.0);
        let values = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                ((radius - (dx * dx + dy * dy).sqrt()) / radius).clamp(0.0, 1.0)
            })
            .collect();
        RawMask::FlatFloatArray {
            width,
            height,
            values,
        }
    }
}

impl Default for MockSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExternalSegmenter for MockSegmenter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn initialize(&mut self) -> Result<()> {
        self.record_call("initialize");
        if self.should_fail_init {
            return Err(BgRemovalError::segmenter("mock segmenter failed to load"));
        }
        self.initialized = true;
        Ok(())
    }

    async fn segment(&self, pixels: &PixelBuffer) -> Result<Vec<RawMask>> {
        self.record_call("segment");
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.response {
            MockResponse::Disc => Ok(vec![Self::disc(pixels.width(), pixels.height())]),
            MockResponse::Fixed(masks) => Ok(masks.clone()),
            MockResponse::NoSubject => Ok(Vec::new()),
            MockResponse::Fail => Err(BgRemovalError::segmenter("mock inference failed")),
        }
    }

    async fn dispose(&mut self) -> Result<()> {
        self.record_call("dispose");
        self.initialized = false;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
