//! Crop rectangles for element and screen screenshots
//!
//! The resolvers here are pure: they take the capture's pixel dimensions and
//! the CSS boxes read from the page, pick a [`PlatformPositionResolver`] and
//! return physical-pixel rectangles scaled once by the effective DPR.

use tracing::debug;

use super::{
    dpr::{ScaleByDpr, validate_dpr},
    platform::{PlatformPositionResolver, PositionContext},
};
use crate::{
    capture::{Driver, ImageBuffer, page},
    error::{CaptureError, CaptureResult},
    model::{ElementBox, ElementHandle, Rectangle, Screenshot},
    options::CaptureOptions,
};

/// Resolves the crop rectangle of an element inside a capture
///
/// Fails with [`CaptureError::ElementNotVisible`] when the element has no
/// width or height. The error reports the CSS dimensions as read from the
/// page.
pub fn determine_element_rectangles(
    opts: &CaptureOptions,
    image_size: (u32, u32),
    element: &ElementBox,
) -> CaptureResult<Rectangle> {
    let dpr = validate_dpr(opts.effective_dpr())?;
    let resolver = PlatformPositionResolver::select(&opts.platform, &opts.device_rectangles);
    let ctx = PositionContext::new(opts, image_size.0, image_size.1);

    let raw = resolver.resolve_element_position(element, &ctx);
    if raw.has_zero_area() {
        return Err(CaptureError::ElementNotVisible {
            selector: element.selector.clone(),
            width:    raw.width,
            height:   raw.height,
        });
    }

    let rect = raw.scale_by_dpr(dpr);
    debug!(
        platform = resolver.name(),
        x = rect.x,
        y = rect.y,
        width = rect.width,
        height = rect.height,
        "Resolved element rectangle"
    );
    Ok(rect)
}

/// Resolves the screen rectangle of a capture
///
/// Width and height are swapped when the device is in landscape and the
/// capture is taller than it is wide.
pub fn determine_screen_rectangles(
    opts: &CaptureOptions,
    image_size: (u32, u32),
) -> CaptureResult<Rectangle> {
    let dpr = validate_dpr(opts.effective_dpr())?;
    let resolver = PlatformPositionResolver::select(&opts.platform, &opts.device_rectangles);
    let ctx = PositionContext::new(opts, image_size.0, image_size.1);

    let raw = resolver.resolve_screen_position(&ctx);
    if raw.has_zero_area() {
        return Err(CaptureError::EmptyRectangle {
            target: "screen".to_string(),
            width:  raw.width,
            height: raw.height,
        });
    }

    Ok(raw.scale_by_dpr(dpr))
}

/// Resolves an element's crop rectangle from a screenshot handle
pub fn element_rectangles_for_screenshot(
    opts: &CaptureOptions,
    screenshot: &Screenshot,
    element: &ElementBox,
) -> CaptureResult<Rectangle> {
    let image_size = ImageBuffer::screenshot_dimensions(screenshot)?;
    determine_element_rectangles(opts, image_size, element)
}

/// Resolves the screen rectangle from a screenshot handle
pub fn screen_rectangles_for_screenshot(
    opts: &CaptureOptions,
    screenshot: &Screenshot,
) -> CaptureResult<Rectangle> {
    let image_size = ImageBuffer::screenshot_dimensions(screenshot)?;
    determine_screen_rectangles(opts, image_size)
}

/// Reads an element's viewport-relative box and the current scroll offset
pub async fn fetch_element_box(
    driver: &dyn Driver,
    element: &ElementHandle,
) -> CaptureResult<ElementBox> {
    let mut element_box = fetch_element_box_by_id(driver, &element.element_id).await?;
    element_box.selector = element.selector.clone();
    Ok(element_box)
}

/// Like [`fetch_element_box`], for a bare element reference
pub async fn fetch_element_box_by_id(driver: &dyn Driver, element_id: &str) -> CaptureResult<ElementBox> {
    let document_rect = driver.element_rect(element_id).await?;
    let (scroll_x, scroll_y) = page::scroll_position(driver).await?;

    Ok(ElementBox::new(Rectangle::new(
        document_rect.x - scroll_x,
        document_rect.y - scroll_y,
        document_rect.width,
        document_rect.height,
    ))
    .with_scroll(scroll_x, scroll_y))
}
