//! External segmenter boundary
//!
//! A learned segmentation model is a caller-owned resource: it is created by the host,
//! wrapped in a [`SegmenterHandle`] with an explicit [`initialize`](SegmenterHandle::initialize)
//! / [`dispose`](SegmenterHandle::dispose) lifecycle, and injected into the processor.
//! Every call runs under the handle's time budget and races the caller's cancellation
//! token. The raw detections are normalized by
//! [`ExternalMaskAdapter`](crate::builders::ExternalMaskAdapter).

#[cfg(feature = "tract")]
pub mod tract;

#[doc(hidden)]
pub mod test_utils;

#[cfg(feature = "tract")]
pub use self::tract::TractSegmenter;

use crate::builders::RawMask;
use crate::error::{BgRemovalError, Result};
use crate::types::PixelBuffer;
use async_trait::async_trait;
use instant::{Duration, Instant};
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

/// A learned model returning zero or more raw subject masks per image
#[async_trait]
pub trait ExternalSegmenter: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Load the model
    ///
    /// # Errors
    /// - `Segmenter` when the model cannot be loaded
    async fn initialize(&mut self) -> Result<()>;

    /// Segment one image; an empty vector means no subject was found
    ///
    /// # Errors
    /// - `Segmenter` when inference fails or the model is not loaded
    async fn segment(&self, pixels: &PixelBuffer) -> Result<Vec<RawMask>>;

    /// Release the model
    async fn dispose(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_initialized(&self) -> bool;
}

/// Caller-owned segmenter with a per-call time budget
pub struct SegmenterHandle {
    inner: Box<dyn ExternalSegmenter>,
    timeout: Duration,
}

impl std::fmt::Debug for SegmenterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmenterHandle")
            .field("segmenter", &self.inner.name())
            .field("timeout", &self.timeout)
            .field("initialized", &self.inner.is_initialized())
            .finish()
    }
}

impl SegmenterHandle {
    pub fn new<S: ExternalSegmenter + 'static>(segmenter: S, timeout: Duration) -> Self {
        Self::from_boxed(Box::new(segmenter), timeout)
    }

    #[must_use]
    pub fn from_boxed(segmenter: Box<dyn ExternalSegmenter>, timeout: Duration) -> Self {
        Self {
            inner: segmenter,
            timeout,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Replace the per-call time budget
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.is_initialized()
    }

    /// Load the model unless it is already loaded; returns the load time
    ///
    /// # Errors
    /// - `Segmenter` from the model
    pub async fn initialize(&mut self) -> Result<Option<Duration>> {
        if self.inner.is_initialized() {
            return Ok(None);
        }
        let start = Instant::now();
        info!("Initializing segmenter '{}'", self.inner.name());
        self.inner.initialize().await?;
        let elapsed = start.elapsed();
        info!(
            "Segmenter '{}' ready in {}ms",
            self.inner.name(),
            elapsed.as_millis()
        );
        Ok(Some(elapsed))
    }

    /// Release the model; a no-op when it was never loaded
    ///
    /// # Errors
    /// - `Segmenter` from the model
    pub async fn dispose(&mut self) -> Result<()> {
        if !self.inner.is_initialized() {
            return Ok(());
        }
        info!("Disposing segmenter '{}'", self.inner.name());
        self.inner.dispose().await
    }

    /// Run the segmenter once under the time budget
    ///
    /// When the budget elapses or `cancel` fires, the pending inference future is
    /// dropped. Work already handed to a blocking thread (as `TractSegmenter` does)
    /// is not interrupted and runs to completion in the background; its result is
    /// discarded.
    ///
    /// # Errors
    /// - `Cancelled` when `cancel` fires first
    /// - `SegmentationTimeout` when the budget elapses first
    /// - `Segmenter` when the model is not loaded or fails
    pub async fn segment(&self, pixels: &PixelBuffer, cancel: &CancellationToken) -> Result<Vec<RawMask>> {
        if !self.inner.is_initialized() {
            return Err(BgRemovalError::segmenter(format!(
                "segmenter '{}' is not initialized",
                self.inner.name()
            )));
        }
        debug!(
            "Running segmenter '{}' on {}x{} (budget {}ms)",
            self.inner.name(),
            pixels.width(),
            pixels.height(),
            self.timeout.as_millis()
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(BgRemovalError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, self.inner.segment(pixels)) => {
                outcome.unwrap_or_else(|_| {
                    warn!(
                        "Segmenter '{}' exceeded its {}ms budget",
                        self.inner.name(),
                        self.timeout.as_millis()
                    );
                    Err(BgRemovalError::timeout(self.timeout))
                })
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::MockSegmenter;
    use super::*;

    fn pixels() -> PixelBuffer {
        PixelBuffer::filled(8, 8, [10, 10, 10, 255]).unwrap()
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let mock = MockSegmenter::new();
        let mut handle = SegmenterHandle::new(mock.clone(), Duration::from_secs(1));
        assert!(!handle.is_ready());

        let err = handle.segment(&pixels(), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, BgRemovalError::Segmenter(_)));

        assert!(handle.initialize().await.unwrap().is_some());
        assert!(handle.initialize().await.unwrap().is_none());
        let masks = handle.segment(&pixels(), &CancellationToken::new()).await.unwrap();
        assert_eq!(masks.len(), 1);

        handle.dispose().await.unwrap();
        assert!(!handle.is_ready());
        assert_eq!(mock.call_history(), vec!["initialize", "segment", "dispose"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let mock = MockSegmenter::new().with_delay(Duration::from_secs(10));
        let mut handle = SegmenterHandle::new(mock, Duration::from_millis(500));
        handle.initialize().await.unwrap();
        let err = handle.segment(&pixels(), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, BgRemovalError::SegmentationTimeout { timeout_ms: 500 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_wins_over_slow_segmenter() {
        let mock = MockSegmenter::new().with_delay(Duration::from_secs(10));
        let mut handle = SegmenterHandle::new(mock, Duration::from_secs(60));
        handle.initialize().await.unwrap();

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });
        let err = handle.segment(&pixels(), &token).await.unwrap_err();
        assert!(matches!(err, BgRemovalError::Cancelled));
    }

    #[tokio::test]
    async fn test_failing_init_propagates() {
        let mut handle = SegmenterHandle::new(MockSegmenter::new_failing_init(), Duration::from_secs(1));
        let err = handle.initialize().await.unwrap_err();
        assert!(err.is_fallback_eligible());
        assert!(!handle.is_ready());
    }
}
