//! Image I/O service
//!
//! Decoding of the input image into a [`PixelBuffer`] and encoding of the composited
//! output. Codec errors on the input side are reported as `InvalidImage`.

use crate::{
    config::OutputFormat,
    error::{BgRemovalError, Result},
    services::OutputFormatHandler,
    types::PixelBuffer,
};
use image::DynamicImage;
use std::io::Cursor;
use std::path::Path;

/// Stateless image decode/encode helpers
pub struct ImageIOService;

impl ImageIOService {
    /// Decode an encoded image (JPEG, PNG, WebP, TIFF) into RGBA samples
    ///
    /// # Errors
    /// - `InvalidImage` for empty, corrupt or zero-area input
    pub fn decode(bytes: &[u8]) -> Result<PixelBuffer> {
        if bytes.is_empty() {
            return Err(BgRemovalError::invalid_image("empty image data"));
        }
        let image = image::load_from_memory(bytes)
            .map_err(|e| BgRemovalError::invalid_image(format!("failed to decode image: {e}")))?;
        PixelBuffer::from_dynamic_image(&image)
    }

    /// Load and decode an image file
    ///
    /// Falls back to content sniffing when the extension does not match the data.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use bgcutout::services::ImageIOService;
    ///
    /// let pixels = ImageIOService::load("input.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    ///
    /// # Errors
    /// - `Io` when the file cannot be read
    /// - `InvalidImage` when it cannot be decoded
    pub fn load<P: AsRef<Path>>(path: P) -> Result<PixelBuffer> {
        let path_ref = path.as_ref();
        match image::open(path_ref) {
            Ok(image) => PixelBuffer::from_dynamic_image(&image),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {e}. Attempting content-based detection.",
                    path_ref.display()
                );
                let data = std::fs::read(path_ref)
                    .map_err(|io_err| BgRemovalError::file_io_error("read image file", path_ref, &io_err))?;
                Self::decode(&data)
            },
        }
    }

    /// Encode pixels in `format`
    ///
    /// # Errors
    /// - `InvalidConfig` when this build cannot encode `format`
    /// - `Image` for encoder failures
    pub fn encode(pixels: &PixelBuffer, format: OutputFormat) -> Result<Vec<u8>> {
        if !OutputFormatHandler::is_available(format) {
            return Err(BgRemovalError::invalid_config(format!(
                "output format {format:?} is not enabled in this build"
            )));
        }
        let Some(image_format) = OutputFormatHandler::image_format(format) else {
            return Ok(pixels.as_raw().to_vec());
        };
        let image = DynamicImage::ImageRgba8(pixels.to_rgba_image()?);
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, image_format)?;
        Ok(buffer.into_inner())
    }

    /// Encode and write to `path`, creating parent directories
    ///
    /// # Errors
    /// - `Io` when the file cannot be written
    /// - everything [`Self::encode`] reports
    pub fn save<P: AsRef<Path>>(pixels: &PixelBuffer, path: P, format: OutputFormat) -> Result<()> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| BgRemovalError::file_io_error("create output directory", parent, &e))?;
        }
        let bytes = Self::encode(pixels, format)?;
        std::fs::write(path_ref, bytes)
            .map_err(|e| BgRemovalError::file_io_error("write output file", path_ref, &e))?;
        log::debug!("Saved {} ({format:?})", path_ref.display());
        Ok(())
    }

    /// Read everything from `reader` and decode it
    ///
    /// # Errors
    /// - `Io` on read failure, `InvalidImage` on decode failure
    pub async fn load_from_reader<R: tokio::io::AsyncRead + Unpin>(mut reader: R) -> Result<PixelBuffer> {
        use tokio::io::AsyncReadExt;

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;
        Self::decode(&buffer)
    }

    /// Encode and write to `writer`; returns the number of bytes written
    ///
    /// # Errors
    /// - `Io` on write failure, everything [`Self::encode`] reports
    pub async fn save_to_writer<W: tokio::io::AsyncWrite + Unpin>(
        pixels: &PixelBuffer,
        mut writer: W,
        format: OutputFormat,
    ) -> Result<u64> {
        use tokio::io::AsyncWriteExt;

        let bytes = Self::encode(pixels, format)?;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(bytes.len() as u64)
    }

    /// Whether the path has an extension this build can decode
    pub fn is_supported_input<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .is_some_and(|ext| match ext.as_str() {
                "png" | "jpg" | "jpeg" | "tif" | "tiff" => true,
                "webp" => cfg!(feature = "webp-support"),
                _ => false,
            })
    }
}
