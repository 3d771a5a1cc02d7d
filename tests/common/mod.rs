//! Shared test utilities for integration tests
//!
//! - Option builders for the platforms the engine supports
//! - Composition helpers and pixel assertions against the mock page
//! - Timing helpers

#![allow(dead_code)]

use std::time::{Duration, Instant};

use visreg_capture::{
    capture::{ImageBuffer, ImageCompositor, MockDriver, RasterCompositor},
    model::{DeviceRectangles, FullPageScreenshotData, Rectangle},
    options::{CaptureOptions, PlatformFlags},
};

/// Segment heights may differ from the page height by float noise only
pub const HEIGHT_EPSILON: f64 = 1e-6;

/// Options for a desktop browser with no settle delay
pub fn desktop_options(inner_width: f64, inner_height: f64, dpr: f64) -> CaptureOptions {
    CaptureOptions::builder()
        .device_pixel_ratio(dpr)
        .initial_device_pixel_ratio(dpr)
        .inner_size(inner_width, inner_height)
        .full_page_scroll_timeout_ms(0)
        .build()
}

/// Options for a device screenshot with the web view at `viewport`
pub fn native_options(
    platform: PlatformFlags,
    viewport: Rectangle,
    dpr: f64,
    shadow_padding: f64,
) -> CaptureOptions {
    CaptureOptions::builder()
        .device_pixel_ratio(dpr)
        .initial_device_pixel_ratio(dpr)
        .inner_size(viewport.width, viewport.height)
        .platform(platform)
        .device_rectangles(DeviceRectangles {
            viewport,
            ..Default::default()
        })
        .shadow_padding(shadow_padding, shadow_padding)
        .full_page_scroll_timeout_ms(0)
        .build()
}

/// Stitches a capture with the raster compositor
pub fn compose(data: &FullPageScreenshotData) -> ImageBuffer {
    RasterCompositor::new()
        .compose(data)
        .expect("capture composes into one image")
}

/// Asserts that the segments add up to the page height
pub fn assert_heights_sum(data: &FullPageScreenshotData) {
    let sum = data.stitched_height();
    assert!(
        (sum - data.full_page_height).abs() < HEIGHT_EPSILON,
        "segment heights sum to {sum}, page height is {}",
        data.full_page_height
    );
}

/// Asserts that every row of column `x` shows the expected document row
///
/// Composed row `r` must show document row `floor(r / dpr) + offset`.
pub fn assert_document_rows(image: &ImageBuffer, x: u32, dpr: f64, offset: u32) {
    for y in 0..image.height() {
        let expected = (f64::from(y) / dpr).floor() as u32 + offset;
        let pixel = image.pixel(x, y);
        let actual = MockDriver::document_row(pixel);
        assert_eq!(
            actual,
            Some(expected),
            "composed row {y} shows {pixel:?}, expected document row {expected}"
        );
    }
}

/// Measures the duration of an async operation
pub async fn time_async<F, T>(operation: F) -> (T, Duration)
where
    F: std::future::Future<Output = T>,
{
    let start = Instant::now();
    let result = operation.await;
    (result, start.elapsed())
}
