//! Image buffer wrapper for screenshot data
//!
//! This module provides an `ImageBuffer` wrapper around `image::DynamicImage`
//! with the operations the capture engine needs: decoding driver screenshots,
//! reading their dimensions, cropping, rotating and pasting segments onto a
//! canvas.
//!
//! # Examples
//!
//! ```
//! use visreg_capture::capture::image_buffer::{ImageBuffer, PixelRegion};
//!
//! let img = ImageBuffer::from_test_pattern(800, 600);
//!
//! let cropped = img.crop(PixelRegion::new(100, 100, 400, 200)).unwrap();
//! assert_eq!(cropped.dimensions(), (400, 200));
//!
//! let mut canvas = ImageBuffer::blank(800, 1200);
//! canvas.paste(&cropped, 0, 600);
//! assert_eq!(canvas.dimensions(), (800, 1200));
//! ```

use std::io::Cursor;

use image::{GenericImageView, ImageReader, Rgba};

use crate::{
    error::{CaptureError, CaptureResult},
    model::{Rectangle, Screenshot},
};

/// An integer crop region in physical pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRegion {
    pub x:      u32,
    pub y:      u32,
    pub width:  u32,
    pub height: u32,
}

impl PixelRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rounds a fractional rectangle to whole pixels and clamps it to an
    /// image of `bounds` size
    ///
    /// Returns `None` when nothing of the rectangle lies inside the image.
    pub fn from_rectangle(rect: &Rectangle, bounds: (u32, u32)) -> Option<Self> {
        let (max_width, max_height) = (bounds.0 as f64, bounds.1 as f64);
        let left = rect.x.round().clamp(0.0, max_width);
        let top = rect.y.round().clamp(0.0, max_height);
        let right = rect.right().round().clamp(left, max_width);
        let bottom = rect.bottom().round().clamp(top, max_height);

        let width = (right - left) as u32;
        let height = (bottom - top) as u32;
        if width == 0 || height == 0 {
            return None;
        }

        Some(Self::new(left as u32, top as u32, width, height))
    }
}

/// Wrapper around `image::DynamicImage` with transformation methods
///
/// Crop and rotate return new `ImageBuffer` instances; `paste` mutates the
/// canvas it is called on.
#[derive(Clone, Debug)]
pub struct ImageBuffer {
    inner: image::DynamicImage,
}

impl ImageBuffer {
    /// Creates a new ImageBuffer from a DynamicImage
    pub fn new(image: image::DynamicImage) -> Self {
        Self { inner: image }
    }

    /// Creates a fully transparent RGBA canvas
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(image::DynamicImage::new_rgba8(width, height))
    }

    /// Decodes image bytes (PNG, JPEG) into a buffer
    pub fn from_bytes(bytes: &[u8]) -> CaptureResult<Self> {
        image::load_from_memory(bytes)
            .map(Self::new)
            .map_err(|e| CaptureError::ImageError(format!("Failed to decode screenshot: {e}")))
    }

    /// Decodes a driver screenshot
    pub fn from_screenshot(screenshot: &Screenshot) -> CaptureResult<Self> {
        Self::from_bytes(&screenshot.decode()?)
    }

    /// Reads the pixel dimensions of a screenshot without decoding the pixels
    ///
    /// # Examples
    ///
    /// ```
    /// use visreg_capture::{
    ///     capture::ImageBuffer,
    ///     model::Screenshot,
    ///     util::encode::encode_png,
    /// };
    ///
    /// let png = encode_png(&ImageBuffer::from_test_pattern(320, 240)).unwrap();
    /// let shot = Screenshot::from_bytes(&png);
    /// assert_eq!(ImageBuffer::screenshot_dimensions(&shot).unwrap(), (320, 240));
    /// ```
    pub fn screenshot_dimensions(screenshot: &Screenshot) -> CaptureResult<(u32, u32)> {
        let bytes = screenshot.decode()?;
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| CaptureError::ImageError(format!("Format detection failed: {e}")))?
            .into_dimensions()
            .map_err(|e| CaptureError::ImageError(format!("Failed to read dimensions: {e}")))
    }

    /// Crops the image to the specified region
    ///
    /// The region must be within the image bounds, otherwise an error is
    /// returned.
    pub fn crop(&self, region: PixelRegion) -> CaptureResult<Self> {
        let (img_width, img_height) = self.dimensions();

        if region.x >= img_width || region.y >= img_height {
            return Err(CaptureError::InvalidParameter {
                parameter: "region".to_string(),
                reason:    format!(
                    "Region origin ({}, {}) is outside image bounds ({}x{})",
                    region.x, region.y, img_width, img_height
                ),
            });
        }

        if region.x + region.width > img_width || region.y + region.height > img_height {
            return Err(CaptureError::InvalidParameter {
                parameter: "region".to_string(),
                reason:    format!(
                    "Region ({}x{} at {},{}) extends beyond image bounds ({}x{})",
                    region.width, region.height, region.x, region.y, img_width, img_height
                ),
            });
        }

        Ok(Self::new(
            self.inner
                .crop_imm(region.x, region.y, region.width, region.height),
        ))
    }

    /// Rotates the image 90 degrees counter-clockwise
    ///
    /// Used for landscape captures that some drivers return portrait-shaped.
    pub fn rotate_counter_clockwise(&self) -> Self {
        Self::new(self.inner.rotate270())
    }

    /// Draws `other` onto this image with its top-left corner at `(x, y)`
    ///
    /// Pixels falling outside this image are dropped.
    pub fn paste(&mut self, other: &ImageBuffer, x: i64, y: i64) {
        image::imageops::replace(&mut self.inner, &other.inner, x, y);
    }

    /// Returns the dimensions of the image as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    /// Returns the image width in pixels
    pub fn width(&self) -> u32 {
        self.dimensions().0
    }

    /// Returns the image height in pixels
    pub fn height(&self) -> u32 {
        self.dimensions().1
    }

    /// Returns the RGBA value of a single pixel
    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        self.inner.get_pixel(x, y)
    }

    /// Converts the image to RGBA8 format
    pub fn to_rgba8(&self) -> image::ImageBuffer<Rgba<u8>, Vec<u8>> {
        self.inner.to_rgba8()
    }

    /// Creates an image whose pixels are produced by `pixel(x, y)`
    pub fn from_fn(width: u32, height: u32, pixel: impl Fn(u32, u32) -> Rgba<u8>) -> Self {
        let img = image::ImageBuffer::from_fn(width, height, pixel);
        Self::new(image::DynamicImage::ImageRgba8(img))
    }

    /// Creates a test pattern image with the specified dimensions
    ///
    /// A vertical gradient from blue (top) to cyan (bottom).
    pub fn from_test_pattern(width: u32, height: u32) -> Self {
        let start_color = Rgba([0u8, 0u8, 255u8, 255u8]);
        let end_color = Rgba([0u8, 255u8, 255u8, 255u8]);

        Self::from_fn(width, height, |_x, y| {
            let ratio = y as f32 / height.max(1) as f32;
            Rgba([
                (start_color[0] as f32 * (1.0 - ratio) + end_color[0] as f32 * ratio) as u8,
                (start_color[1] as f32 * (1.0 - ratio) + end_color[1] as f32 * ratio) as u8,
                (start_color[2] as f32 * (1.0 - ratio) + end_color[2] as f32 * ratio) as u8,
                255,
            ])
        })
    }

    /// Returns a reference to the inner DynamicImage
    pub fn inner(&self) -> &image::DynamicImage {
        &self.inner
    }

    /// Consumes self and returns the inner DynamicImage
    pub fn into_inner(self) -> image::DynamicImage {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::encode::encode_png;

    #[test]
    fn test_pixel_region_rounds_and_clamps() {
        let rect = Rectangle::new(10.4, 19.6, 100.2, 50.0);
        let region = PixelRegion::from_rectangle(&rect, (1000, 1000)).unwrap();
        assert_eq!(region, PixelRegion::new(10, 20, 101, 50));

        let overflowing = Rectangle::new(900.0, 900.0, 200.0, 200.0);
        let region = PixelRegion::from_rectangle(&overflowing, (1000, 950)).unwrap();
        assert_eq!(region, PixelRegion::new(900, 900, 100, 50));
    }

    #[test]
    fn test_pixel_region_outside_image() {
        let rect = Rectangle::new(1200.0, 0.0, 10.0, 10.0);
        assert!(PixelRegion::from_rectangle(&rect, (1000, 1000)).is_none());

        let empty = Rectangle::new(10.0, 10.0, 0.2, 10.0);
        assert!(PixelRegion::from_rectangle(&empty, (1000, 1000)).is_none());
    }

    #[test]
    fn test_crop_valid_region() {
        let img = ImageBuffer::from_test_pattern(1920, 1080);
        let cropped = img.crop(PixelRegion::new(460, 240, 1000, 600)).unwrap();
        assert_eq!(cropped.dimensions(), (1000, 600));
    }

    #[test]
    fn test_crop_boundary_check() {
        let img = ImageBuffer::from_test_pattern(1920, 1080);

        let cropped = img.crop(PixelRegion::new(0, 0, 1920, 1080)).unwrap();
        assert_eq!(cropped.dimensions(), (1920, 1080));

        let cropped = img.crop(PixelRegion::new(1820, 980, 100, 100)).unwrap();
        assert_eq!(cropped.dimensions(), (100, 100));
    }

    #[test]
    fn test_crop_out_of_bounds() {
        let img = ImageBuffer::from_test_pattern(1920, 1080);

        assert!(img.crop(PixelRegion::new(2000, 1000, 100, 100)).is_err());
        assert!(img.crop(PixelRegion::new(1900, 1000, 200, 200)).is_err());
        assert!(img.crop(PixelRegion::new(100, 100, 100, 1000)).is_err());
    }

    #[test]
    fn test_rotate_counter_clockwise_swaps_dimensions() {
        let img = ImageBuffer::from_test_pattern(300, 600);
        let rotated = img.rotate_counter_clockwise();
        assert_eq!(rotated.dimensions(), (600, 300));
    }

    #[test]
    fn test_paste_places_pixels() {
        let red = ImageBuffer::from_fn(10, 10, |_, _| Rgba([255, 0, 0, 255]));
        let mut canvas = ImageBuffer::blank(20, 30);
        canvas.paste(&red, 5, 15);

        assert_eq!(canvas.pixel(5, 15), Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.pixel(14, 24), Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.pixel(4, 15), Rgba([0, 0, 0, 0]));
        assert_eq!(canvas.pixel(5, 25), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_paste_clips_outside_canvas() {
        let red = ImageBuffer::from_fn(10, 10, |_, _| Rgba([255, 0, 0, 255]));
        let mut canvas = ImageBuffer::blank(10, 10);
        canvas.paste(&red, 5, 5);
        assert_eq!(canvas.pixel(9, 9), Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.pixel(0, 0), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_screenshot_round_trip() {
        let img = ImageBuffer::from_test_pattern(64, 48);
        let shot = Screenshot::from_bytes(&encode_png(&img).unwrap());

        assert_eq!(ImageBuffer::screenshot_dimensions(&shot).unwrap(), (64, 48));
        let decoded = ImageBuffer::from_screenshot(&shot).unwrap();
        assert_eq!(decoded.dimensions(), (64, 48));
        assert_eq!(decoded.pixel(0, 0), img.pixel(0, 0));
    }

    #[test]
    fn test_screenshot_dimensions_rejects_garbage() {
        let shot = Screenshot::from_bytes(b"definitely not an image");
        assert!(matches!(
            ImageBuffer::screenshot_dimensions(&shot),
            Err(CaptureError::ImageError(_))
        ));
        assert!(ImageBuffer::from_screenshot(&shot).is_err());
    }

    #[test]
    fn test_from_test_pattern() {
        let img = ImageBuffer::from_test_pattern(100, 100);
        assert_eq!(img.dimensions(), (100, 100));
        assert_ne!(img.pixel(0, 0), img.pixel(0, 99));
    }
}
