//! Image encoding utilities for composed screenshots
//!
//! Composed images are always written as PNG. The diff engine compares them
//! pixel by pixel.
//!
//! # Examples
//!
//! ```
//! use visreg_capture::{capture::ImageBuffer, util::encode::encode_screenshot};
//!
//! let img = ImageBuffer::from_test_pattern(390, 844);
//! let shot = encode_screenshot(&img).unwrap();
//! assert!(!shot.as_base64().is_empty());
//! ```

use std::{io::Cursor, path::Path};

use image::{
    ImageEncoder,
    codecs::png::{CompressionType, FilterType, PngEncoder},
};

use crate::{
    capture::ImageBuffer,
    error::{CaptureError, CaptureResult},
    model::Screenshot,
};

/// Encodes an image as PNG with default compression
///
/// # Examples
///
/// ```
/// use visreg_capture::{capture::ImageBuffer, util::encode::encode_png};
///
/// let img = ImageBuffer::from_test_pattern(100, 100);
/// let png_bytes = encode_png(&img).unwrap();
/// assert!(!png_bytes.is_empty());
/// ```
pub fn encode_png(buffer: &ImageBuffer) -> CaptureResult<Vec<u8>> {
    encode_png_with_compression(buffer, CompressionType::Default)
}

/// Encodes an image as PNG with specified compression level
///
/// Higher compression levels produce smaller files but take longer to
/// encode. The mock driver uses `Fast` since its screenshots are thrown away.
pub fn encode_png_with_compression(
    buffer: &ImageBuffer,
    compression: CompressionType,
) -> CaptureResult<Vec<u8>> {
    let mut output = Vec::new();

    let encoder =
        PngEncoder::new_with_quality(Cursor::new(&mut output), compression, FilterType::Adaptive);

    let rgba = buffer.to_rgba8();
    let (width, height) = rgba.dimensions();

    encoder
        .write_image(rgba.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .map_err(|e| CaptureError::EncodingFailed {
            format: "png".to_string(),
            reason: e.to_string(),
        })?;

    Ok(output)
}

/// Encodes an image as a base64 PNG screenshot handle
pub fn encode_screenshot(buffer: &ImageBuffer) -> CaptureResult<Screenshot> {
    encode_png(buffer).map(|bytes| Screenshot::from_bytes(&bytes))
}

/// Writes an image to `path` as PNG
pub fn write_png(buffer: &ImageBuffer, path: impl AsRef<Path>) -> CaptureResult<()> {
    let bytes = encode_png(buffer)?;
    std::fs::write(path, bytes)?;
    Ok(())
}
