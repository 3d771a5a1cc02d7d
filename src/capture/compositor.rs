//! Composing segments into one image
//!
//! [`ImageCompositor`] is the seam to the image codec: measure a capture,
//! crop a rectangle out of it, and stitch the segments of a full-page capture
//! together. [`RasterCompositor`] implements it on the `image` crate.

use tracing::{debug, warn};

use super::image_buffer::{ImageBuffer, PixelRegion};
use crate::{
    error::{CaptureError, CaptureResult},
    model::{FullPageScreenshotData, Rectangle, Screenshot},
};

/// Image codec operations the capture engine relies on
pub trait ImageCompositor: Send + Sync {
    /// Decoded image type produced by this compositor
    type Image;

    /// Pixel dimensions of a capture as `(width, height)`
    fn dimensions(&self, screenshot: &Screenshot) -> CaptureResult<(u32, u32)>;

    /// Crops `rect` (physical pixels) out of a capture
    fn crop(&self, screenshot: &Screenshot, rect: &Rectangle) -> CaptureResult<Self::Image>;

    /// Stitches the segments of a full-page capture into one image
    fn compose(&self, data: &FullPageScreenshotData) -> CaptureResult<Self::Image>;
}

/// Compositor backed by the `image` crate
///
/// Segment rectangles are rounded to whole pixels and clamped to the
/// capture they are cut from. Rotated segments are turned back into
/// landscape before cropping.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterCompositor;

impl RasterCompositor {
    pub fn new() -> Self {
        Self
    }
}

impl ImageCompositor for RasterCompositor {
    type Image = ImageBuffer;

    fn dimensions(&self, screenshot: &Screenshot) -> CaptureResult<(u32, u32)> {
        ImageBuffer::screenshot_dimensions(screenshot)
    }

    fn crop(&self, screenshot: &Screenshot, rect: &Rectangle) -> CaptureResult<ImageBuffer> {
        let image = ImageBuffer::from_screenshot(screenshot)?;
        let region = PixelRegion::from_rectangle(rect, image.dimensions()).ok_or_else(|| {
            CaptureError::InvalidParameter {
                parameter: "region".to_string(),
                reason:    format!(
                    "{}x{} at {},{} does not overlap the {}x{} capture",
                    rect.width,
                    rect.height,
                    rect.x,
                    rect.y,
                    image.width(),
                    image.height()
                ),
            }
        })?;
        image.crop(region)
    }

    fn compose(&self, data: &FullPageScreenshotData) -> CaptureResult<ImageBuffer> {
        let width = data.full_page_width.round();
        let height = data.full_page_height.round();
        if width < 1.0 || height < 1.0 {
            return Err(CaptureError::EmptyRectangle {
                target: "full page".to_string(),
                width:  data.full_page_width,
                height: data.full_page_height,
            });
        }

        let mut canvas = ImageBuffer::blank(width as u32, height as u32);

        for (index, segment) in data.segments.iter().enumerate() {
            let mut image = ImageBuffer::from_screenshot(&segment.screenshot)?;
            if segment.rotated {
                image = image.rotate_counter_clockwise();
            }

            let rect = Rectangle::new(
                segment.image_x_position,
                segment.image_y_position,
                segment.image_width,
                segment.image_height,
            );
            let Some(region) = PixelRegion::from_rectangle(&rect, image.dimensions()) else {
                warn!(index, "Segment lies outside its capture, skipping");
                continue;
            };

            let cropped = image.crop(region)?;
            let canvas_y = segment.canvas_y_position.round() as i64;
            debug!(
                index,
                canvas_y,
                width = region.width,
                height = region.height,
                "Composing segment"
            );
            canvas.paste(&cropped, 0, canvas_y);
        }

        Ok(canvas)
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;
    use crate::{model::ViewportSegment, util::encode::encode_screenshot};

    fn solid(width: u32, height: u32, value: u8) -> Screenshot {
        encode_screenshot(&ImageBuffer::from_fn(width, height, |_, _| Rgba([value, 0, 0, 255]))).unwrap()
    }

    fn segment(screenshot: Screenshot, canvas_y: f64, image_y: f64, height: f64) -> ViewportSegment {
        ViewportSegment {
            screenshot,
            canvas_width: 100.0,
            canvas_y_position: canvas_y,
            image_width: 100.0,
            image_height: height,
            image_x_position: 0.0,
            image_y_position: image_y,
            rotated: false,
        }
    }

    #[test]
    fn test_compose_stacks_segments() {
        let data = FullPageScreenshotData {
            full_page_width:  100.0,
            full_page_height: 250.0,
            segments:         vec![
                segment(solid(100, 100, 10), 0.0, 0.0, 100.0),
                segment(solid(100, 100, 20), 100.0, 0.0, 100.0),
                segment(solid(100, 100, 30), 200.0, 50.0, 50.0),
            ],
        };

        let image = RasterCompositor::new().compose(&data).unwrap();
        assert_eq!(image.dimensions(), (100, 250));
        assert_eq!(image.pixel(0, 0)[0], 10);
        assert_eq!(image.pixel(50, 150)[0], 20);
        assert_eq!(image.pixel(99, 249)[0], 30);
    }

    #[test]
    fn test_compose_rotates_rotated_segments() {
        // Portrait-shaped capture of a landscape screen: 50 wide, 100 tall
        let portrait = ImageBuffer::from_fn(50, 100, |x, _| {
            if x < 25 { Rgba([1, 0, 0, 255]) } else { Rgba([2, 0, 0, 255]) }
        });
        let mut seg = segment(encode_screenshot(&portrait).unwrap(), 0.0, 0.0, 50.0);
        seg.rotated = true;
        seg.image_width = 100.0;

        let data = FullPageScreenshotData {
            full_page_width:  100.0,
            full_page_height: 50.0,
            segments:         vec![seg],
        };
        let image = RasterCompositor::new().compose(&data).unwrap();
        assert_eq!(image.dimensions(), (100, 50));
        // Counter-clockwise rotation puts the right half of the capture on top
        assert_eq!(image.pixel(0, 0)[0], 2);
        assert_eq!(image.pixel(0, 49)[0], 1);
    }

    #[test]
    fn test_compose_clamps_oversized_segments() {
        let data = FullPageScreenshotData {
            full_page_width:  100.0,
            full_page_height: 120.0,
            segments:         vec![segment(solid(100, 80, 7), 0.0, 0.0, 120.0)],
        };
        let image = RasterCompositor::new().compose(&data).unwrap();
        assert_eq!(image.pixel(0, 79)[0], 7);
        assert_eq!(image.pixel(0, 80)[3], 0);
    }

    #[test]
    fn test_compose_empty_page_rejected() {
        let data = FullPageScreenshotData {
            full_page_width:  0.0,
            full_page_height: 100.0,
            segments:         Vec::new(),
        };
        assert!(matches!(
            RasterCompositor::new().compose(&data),
            Err(CaptureError::EmptyRectangle { .. })
        ));
    }

    #[test]
    fn test_crop_and_dimensions() {
        let compositor = RasterCompositor::new();
        let shot = solid(200, 100, 5);
        assert_eq!(compositor.dimensions(&shot).unwrap(), (200, 100));

        let cropped = compositor
            .crop(&shot, &Rectangle::new(150.0, 50.0, 100.0, 100.0))
            .unwrap();
        assert_eq!(cropped.dimensions(), (50, 50));

        assert!(compositor.crop(&shot, &Rectangle::new(300.0, 0.0, 10.0, 10.0)).is_err());
    }
}
