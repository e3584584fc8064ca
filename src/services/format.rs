//! Output format handling
//!
//! Every supported output format carries straight alpha. JPEG is accepted as input
//! only; asking for it as output is an error rather than a silent alpha drop.

use crate::{
    config::OutputFormat,
    error::{BgRemovalError, Result},
};
use image::ImageFormat;
use std::path::Path;

/// Format lookups for the output side of the pipeline
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// File extension (without the dot)
    ///
    /// # Examples
    /// ```rust
    /// use bgcutout::{services::OutputFormatHandler, OutputFormat};
    ///
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Png), "png");
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Rgba8), "raw");
    /// ```
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Rgba8 => "raw",
        }
    }

    /// Encoder format for `format`; `None` for raw samples
    #[must_use]
    pub fn image_format(format: OutputFormat) -> Option<ImageFormat> {
        match format {
            OutputFormat::Png => Some(ImageFormat::Png),
            OutputFormat::WebP => Some(ImageFormat::WebP),
            OutputFormat::Tiff => Some(ImageFormat::Tiff),
            OutputFormat::Rgba8 => None,
        }
    }

    /// Parse a format name or extension
    ///
    /// # Errors
    /// - `InvalidConfig` for unknown names and for formats without an alpha channel
    pub fn parse(name: &str) -> Result<OutputFormat> {
        match name.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::WebP),
            "tif" | "tiff" => Ok(OutputFormat::Tiff),
            "raw" | "rgba" | "rgba8" => Ok(OutputFormat::Rgba8),
            "jpg" | "jpeg" => Err(BgRemovalError::invalid_config(
                "JPEG cannot carry an alpha channel; use png, webp or tiff",
            )),
            other => Err(BgRemovalError::invalid_config(format!(
                "unknown output format '{other}'"
            ))),
        }
    }

    /// Output format implied by a path's extension, if any
    ///
    /// # Errors
    /// - `InvalidConfig` when the extension names a format that cannot be written
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Option<OutputFormat>> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::parse)
            .transpose()
    }

    /// Whether this build can encode `format`
    #[must_use]
    pub fn is_available(format: OutputFormat) -> bool {
        match format {
            OutputFormat::WebP => cfg!(feature = "webp-support"),
            OutputFormat::Png | OutputFormat::Tiff | OutputFormat::Rgba8 => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!(OutputFormatHandler::parse("PNG").unwrap(), OutputFormat::Png);
        assert_eq!(OutputFormatHandler::parse(".tif").unwrap(), OutputFormat::Tiff);
        assert_eq!(OutputFormatHandler::parse("rgba8").unwrap(), OutputFormat::Rgba8);
        assert!(OutputFormatHandler::parse("bmp").is_err());
    }

    #[test]
    fn test_jpeg_output_is_rejected() {
        let err = OutputFormatHandler::parse("jpg").unwrap_err();
        assert!(err.to_string().contains("alpha"));
        assert!(OutputFormatHandler::from_path("out.jpeg").is_err());
    }

    #[test]
    fn test_from_path() {
        assert_eq!(
            OutputFormatHandler::from_path("a/b/cutout.webp").unwrap(),
            Some(OutputFormat::WebP)
        );
        assert_eq!(OutputFormatHandler::from_path("cutout").unwrap(), None);
    }

    #[test]
    fn test_extension_round_trip() {
        for format in [
            OutputFormat::Png,
            OutputFormat::WebP,
            OutputFormat::Tiff,
            OutputFormat::Rgba8,
        ] {
            let ext = OutputFormatHandler::get_extension(format);
            assert_eq!(OutputFormatHandler::parse(ext).unwrap(), format);
        }
    }
}
