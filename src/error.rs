//! Error types for background removal operations

use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Error kinds surfaced by the mask pipeline
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// Zero-area image, corrupt decode, or mask/pixel buffer dimension mismatch
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// The external segmenter reported zero subjects
    #[error("No subject detected by the external segmenter")]
    NoSubjectDetected,

    /// The segmenter output could not be normalized into a [0,1] mask
    #[error("Mask decode error: {0}")]
    MaskDecode(String),

    /// The external segmenter exceeded its time budget
    #[error("Segmentation timed out after {timeout_ms}ms")]
    SegmentationTimeout { timeout_ms: u64 },

    /// The caller cancelled the request between stages
    #[error("Processing cancelled")]
    Cancelled,

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The external segmenter failed to load or run
    #[error("Segmenter error: {0}")]
    Segmenter(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image codec errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BgRemovalError {
    /// Create a new invalid image error
    pub fn invalid_image<S: Into<String>>(msg: S) -> Self {
        Self::InvalidImage(msg.into())
    }

    /// Create a new mask decode error
    pub fn mask_decode<S: Into<String>>(msg: S) -> Self {
        Self::MaskDecode(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new segmenter error
    pub fn segmenter<S: Into<String>>(msg: S) -> Self {
        Self::Segmenter(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a timeout error from the configured budget
    #[must_use]
    pub fn timeout(timeout: std::time::Duration) -> Self {
        Self::SegmentationTimeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Create an error for a mask whose dimensions differ from its pixel buffer
    #[must_use]
    pub fn dimension_mismatch(expected: (u32, u32), actual: (u32, u32)) -> Self {
        Self::InvalidImage(format!(
            "dimension mismatch: expected {}x{}, got {}x{}",
            expected.0, expected.1, actual.0, actual.1
        ))
    }

    /// Create configuration error with valid range and recommendation
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {rec}"),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {parameter}: {value} (valid range: {valid_range}).{recommendation}"
        ))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        Self::Io(std::io::Error::new(
            error.kind(),
            format!(
                "Failed to {operation} '{}': {error}",
                path.as_ref().display()
            ),
        ))
    }

    /// Whether the learned path may fall back to a heuristic builder after this error
    #[must_use]
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            Self::NoSubjectDetected
                | Self::MaskDecode(_)
                | Self::SegmentationTimeout { .. }
                | Self::Segmenter(_)
        )
    }

    /// Short machine-readable kind, used in degraded-result notices and logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidImage(_) => "invalid_image",
            Self::NoSubjectDetected => "no_subject_detected",
            Self::MaskDecode(_) => "mask_decode",
            Self::SegmentationTimeout { .. } => "segmentation_timeout",
            Self::Cancelled => "cancelled",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Segmenter(_) => "segmenter",
            Self::Io(_) => "io",
            Self::Image(_) => "image",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_eligibility() {
        assert!(BgRemovalError::NoSubjectDetected.is_fallback_eligible());
        assert!(BgRemovalError::mask_decode("empty").is_fallback_eligible());
        assert!(BgRemovalError::timeout(std::time::Duration::from_secs(2)).is_fallback_eligible());
        assert!(BgRemovalError::segmenter("model missing").is_fallback_eligible());

        assert!(!BgRemovalError::invalid_image("zero area").is_fallback_eligible());
        assert!(!BgRemovalError::Cancelled.is_fallback_eligible());
        assert!(!BgRemovalError::invalid_config("bad").is_fallback_eligible());
    }

    #[test]
    fn test_error_messages() {
        let err = BgRemovalError::dimension_mismatch((10, 10), (10, 9));
        assert_eq!(
            err.to_string(),
            "Invalid image: dimension mismatch: expected 10x10, got 10x9"
        );

        let err = BgRemovalError::timeout(std::time::Duration::from_millis(1500));
        assert_eq!(err.to_string(), "Segmentation timed out after 1500ms");
        assert_eq!(err.kind(), "segmentation_timeout");

        let err = BgRemovalError::config_value_error("sensitivity", 1.5, "0.0-1.0", Some(0.8));
        assert!(err.to_string().contains("Recommended: 0.8"));
    }
}
