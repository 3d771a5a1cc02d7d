//! Ignore region resolution
//!
//! Merges caller supplied block-outs and ignore regions with the device
//! chrome (status bar, address bar, toolbar, side padding, home indicator)
//! into edge-form boxes the diff engine can consume.
//!
//! Every input is CSS pixels, device chrome included, and every box is
//! scaled by the effective DPR exactly once on the way out.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    dpr::ScaleByDpr,
    platform::{PlatformPositionResolver, PositionContext},
    rectangles::fetch_element_box_by_id,
};
use crate::{
    capture::{Driver, ImageBuffer, page},
    error::{CaptureError, CaptureResult},
    model::{DeviceRectangles, ElementBox, IgnoredBox, Rectangle, Screenshot},
    options::{BlockOutOptions, CaptureOptions, PlatformFlags},
};

/// Output handed to the diff engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IgnoreRegions {
    pub ignored_boxes:         Vec<IgnoredBox>,
    pub has_ignore_rectangles: bool,
}

/// Rectangles and capture facts needed to build [`IgnoreRegions`]
#[derive(Debug, Clone, Default)]
pub struct IgnoreRequest {
    /// Resolved block-out rectangles
    pub block_outs:             Vec<Rectangle>,
    /// Resolved ignore regions (elements and manual regions)
    pub ignore_regions:         Vec<Rectangle>,
    /// The capture is a single viewport rather than a full page
    pub is_viewport_screenshot: bool,
    /// The captured image, needed to place the iOS home bar on full pages
    pub captured_image:         Option<Screenshot>,
}

/// Resolves every ignore source into DPR-scaled edge-form boxes
///
/// # Examples
///
/// ```
/// use visreg_capture::{
///     geometry::ignore::{IgnoreRequest, resolve_ignore_regions},
///     model::{DeviceRectangles, Rectangle},
///     options::{BlockOutOptions, CaptureOptions, PlatformFlags},
/// };
///
/// let opts = CaptureOptions::builder()
///     .device_pixel_ratio(2.0)
///     .platform(PlatformFlags::android_native_web_screenshot().native_context())
///     .device_rectangles(DeviceRectangles {
///         status_bar: Rectangle::new(0.0, 0.0, 390.0, 47.0),
///         ..Default::default()
///     })
///     .block_out(BlockOutOptions {
///         status_bar: Some(true),
///         ..Default::default()
///     })
///     .build();
///
/// let regions = resolve_ignore_regions(&IgnoreRequest::default(), &opts);
/// assert!(regions.has_ignore_rectangles);
/// assert_eq!(regions.ignored_boxes[0].bottom, 94.0);
/// ```
pub fn resolve_ignore_regions(request: &IgnoreRequest, opts: &CaptureOptions) -> IgnoreRegions {
    let platform = &opts.platform;
    let device = &opts.device_rectangles;

    let mut chrome = select_chrome_rectangles(
        platform,
        &opts.block_out,
        device,
        request.is_viewport_screenshot,
    );

    if !request.is_viewport_screenshot
        && platform.is_ios
        && device.home_bar.height > 0.0
        && !opts.block_out.tool_bar_disabled()
    {
        match full_page_home_bar(request.captured_image.as_ref(), device, opts.effective_dpr()) {
            Ok(home_bar) => chrome.push(home_bar),
            Err(e) => warn!("Skipping home bar block-out, captured image unreadable: {}", e),
        }
    }

    let scale = opts.effective_dpr();

    let ignored_boxes: Vec<IgnoredBox> = request
        .block_outs
        .iter()
        .chain(request.ignore_regions.iter())
        .chain(chrome.iter())
        .filter(|rect| is_usable(rect))
        .map(|rect| rect.to_ignored_box().scale_by_dpr(scale))
        .collect();

    debug!(
        count = ignored_boxes.len(),
        scale, "Resolved ignore regions"
    );

    IgnoreRegions {
        has_ignore_rectangles: !ignored_boxes.is_empty(),
        ignored_boxes,
    }
}

/// Picks the device chrome rectangles the block-out toggles ask for
///
/// Zero rectangles are dropped: an all-zero or zero-area box would make the
/// comparator block out the whole image or a whole axis.
pub fn select_chrome_rectangles(
    platform: &PlatformFlags,
    block_out: &BlockOutOptions,
    device: &DeviceRectangles,
    is_viewport_screenshot: bool,
) -> Vec<Rectangle> {
    let mut selected = Vec::new();

    if platform.is_mobile() && platform.is_native_context {
        if block_out.status_bar() {
            selected.push(device.status_bar);
        }
        if block_out.tool_bar() {
            selected.push(device.home_bar);
        }
    } else if platform.is_mobile()
        && is_viewport_screenshot
        && (platform.is_ios || platform.is_android_native_web_screenshot)
    {
        if block_out.status_bar() {
            selected.push(device.status_bar_and_address_bar);
        }
        if block_out.tool_bar() {
            // Android web screenshots have no browser toolbar, only the
            // navigation bar
            if platform.is_android_native_web_screenshot {
                selected.push(device.home_bar);
            } else {
                selected.push(device.bottom_bar);
            }
        }
        if block_out.side_bar() {
            selected.push(device.left_side_padding);
            selected.push(device.right_side_padding);
        }
    }

    selected.retain(|rect| !rect.is_all_zero() && !rect.has_zero_area());
    selected
}

/// Places the iOS home bar at the bottom of a full-page capture (CSS pixels)
fn full_page_home_bar(
    captured_image: Option<&Screenshot>,
    device: &DeviceRectangles,
    dpr: f64,
) -> CaptureResult<Rectangle> {
    let image = captured_image.ok_or_else(|| CaptureError::ImageError("no image supplied".to_string()))?;
    let (_, height) = ImageBuffer::screenshot_dimensions(image)?;
    let css_height = f64::from(height) / dpr;

    Ok(Rectangle::new(
        device.home_bar.x - device.viewport.x,
        css_height - device.home_bar.height,
        device.home_bar.width,
        device.home_bar.height,
    ))
}

fn is_usable(rect: &Rectangle) -> bool {
    [rect.x, rect.y, rect.width, rect.height]
        .iter()
        .all(|v| v.is_finite())
        && !rect.has_zero_area()
}

/// A caller supplied ignore entry after validation
#[derive(Debug, Clone, PartialEq)]
pub enum IgnoreEntry {
    /// A remote element, resolved to a rectangle through the driver
    Element(String),
    /// A manual region in CSS pixels
    Region(Rectangle),
}

/// Parses loosely typed ignore entries
///
/// Accepts W3C element references, `{x, y, width, height}` objects, and
/// arrays of either. Every invalid entry is reported in one
/// [`CaptureError::InvalidIgnoreRegions`].
pub fn parse_ignore_entries(values: &[Value]) -> CaptureResult<Vec<IgnoreEntry>> {
    let mut entries = Vec::new();
    let mut invalid = Vec::new();

    for (index, value) in values.iter().enumerate() {
        match value {
            Value::Array(items) => {
                for (inner, item) in items.iter().enumerate() {
                    match parse_entry(item) {
                        Some(entry) => entries.push(entry),
                        None => invalid.push(format!("#{index}.{inner}: {item}")),
                    }
                }
            }
            item => match parse_entry(item) {
                Some(entry) => entries.push(entry),
                None => invalid.push(format!("#{index}: {item}")),
            },
        }
    }

    if invalid.is_empty() {
        Ok(entries)
    } else {
        Err(CaptureError::InvalidIgnoreRegions { entries: invalid })
    }
}

fn parse_entry(value: &Value) -> Option<IgnoreEntry> {
    let object = value.as_object()?;

    for key in [page::W3C_ELEMENT_KEY, page::LEGACY_ELEMENT_KEY] {
        if let Some(id) = object.get(key).and_then(Value::as_str) {
            return Some(IgnoreEntry::Element(id.to_string()));
        }
    }

    let number = |key: &str| object.get(key).and_then(Value::as_f64).filter(|v| v.is_finite());
    let rect = Rectangle::new(
        number("x")?,
        number("y")?,
        number("width")?,
        number("height")?,
    );
    if rect.width < 0.0 || rect.height < 0.0 {
        return None;
    }
    Some(IgnoreEntry::Region(rect))
}

/// Resolves parsed entries to CSS rectangles on the capture
///
/// Elements are read through the driver and placed the way the capture shows
/// them: a viewport capture goes through the platform resolver (device
/// screenshots add the web view offset), a stitched page uses the document
/// position. Manual regions are taken as they are. The result feeds
/// [`IgnoreRequest::ignore_regions`], which applies the DPR.
pub async fn resolve_ignore_entries(
    driver: &dyn Driver,
    entries: &[IgnoreEntry],
    opts: &CaptureOptions,
    image_size: (u32, u32),
    is_viewport_screenshot: bool,
) -> CaptureResult<Vec<Rectangle>> {
    let resolver = PlatformPositionResolver::select(&opts.platform, &opts.device_rectangles);
    let ctx = PositionContext::new(opts, image_size.0, image_size.1);

    let mut rects = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            IgnoreEntry::Element(id) => {
                let element = fetch_element_box_by_id(driver, id).await?;
                let rect = if is_viewport_screenshot {
                    resolver.resolve_element_position(&element, &ctx)
                } else {
                    stitched_position(&resolver, &element, opts)
                };
                debug!(element = %id, platform = resolver.name(), ?rect, "Resolved ignored element");
                rects.push(rect);
            }
            IgnoreEntry::Region(rect) => rects.push(*rect),
        }
    }
    Ok(rects)
}

/// Where an element lands on a stitched page (CSS pixels)
///
/// Device captures crop the address bar shadow off the top of the page, so
/// every document row moves up by that padding.
fn stitched_position(
    resolver: &PlatformPositionResolver,
    element: &ElementBox,
    opts: &CaptureOptions,
) -> Rectangle {
    let rect = element.document_rect();
    match resolver.viewport() {
        Some(_) => Rectangle::new(rect.x, rect.y - opts.address_bar_shadow_padding, rect.width, rect.height),
        None => rect,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{capture::MockDriver, model::WindowSize, util::encode::encode_screenshot};

    fn ios_device() -> DeviceRectangles {
        DeviceRectangles {
            status_bar: Rectangle::new(0.0, 0.0, 390.0, 47.0),
            status_bar_and_address_bar: Rectangle::new(0.0, 0.0, 390.0, 94.0),
            bottom_bar: Rectangle::new(0.0, 760.0, 390.0, 84.0),
            home_bar: Rectangle::new(0.0, 810.0, 390.0, 34.0),
            left_side_padding: Rectangle::default(),
            right_side_padding: Rectangle::new(390.0, 94.0, 0.0, 666.0),
            viewport: Rectangle::new(0.0, 94.0, 390.0, 666.0),
            screen_size: Rectangle::from_size(390.0, 844.0),
        }
    }

    fn block_all() -> BlockOutOptions {
        BlockOutOptions {
            status_bar: Some(true),
            tool_bar:   Some(true),
            side_bar:   Some(true),
        }
    }

    #[test]
    fn test_android_native_context_status_bar_at_dpr_one() {
        let opts = CaptureOptions::builder()
            .device_pixel_ratio(1.0)
            .platform(PlatformFlags::android_native_web_screenshot().native_context())
            .device_rectangles(DeviceRectangles {
                status_bar: Rectangle::new(0.0, 0.0, 390.0, 47.0),
                ..Default::default()
            })
            .block_out(BlockOutOptions {
                status_bar: Some(true),
                ..Default::default()
            })
            .build();

        let regions = resolve_ignore_regions(&IgnoreRequest::default(), &opts);
        assert!(regions.has_ignore_rectangles);
        assert_eq!(regions.ignored_boxes, vec![IgnoredBox {
            top:    0.0,
            left:   0.0,
            right:  390.0,
            bottom: 47.0,
        }]);
    }

    #[test]
    fn test_android_web_view_tool_bar_uses_home_bar() {
        let device = DeviceRectangles {
            status_bar_and_address_bar: Rectangle::new(0.0, 0.0, 392.0, 76.0),
            bottom_bar: Rectangle::new(0.0, 800.0, 392.0, 26.0),
            home_bar: Rectangle::new(0.0, 826.0, 392.0, 47.0),
            ..Default::default()
        };
        let opts = CaptureOptions::builder()
            .device_pixel_ratio(2.75)
            .platform(PlatformFlags::android_native_web_screenshot())
            .device_rectangles(device)
            .block_out(BlockOutOptions {
                tool_bar: Some(true),
                ..Default::default()
            })
            .build();

        let request = IgnoreRequest {
            is_viewport_screenshot: true,
            ..Default::default()
        };
        let regions = resolve_ignore_regions(&request, &opts);
        assert_eq!(regions.ignored_boxes, vec![device.home_bar.to_ignored_box().scale_by_dpr(2.75)]);
    }

    #[test]
    fn test_ios_viewport_chrome_scaled_by_dpr() {
        let opts = CaptureOptions::builder()
            .device_pixel_ratio(3.0)
            .platform(PlatformFlags::ios())
            .device_rectangles(ios_device())
            .block_out(block_all())
            .build();
        let request = IgnoreRequest {
            is_viewport_screenshot: true,
            ..Default::default()
        };

        let regions = resolve_ignore_regions(&request, &opts);
        // left padding is all-zero and right padding has no width
        assert_eq!(regions.ignored_boxes.len(), 2);
        assert_eq!(regions.ignored_boxes[0], IgnoredBox {
            top:    0.0,
            left:   0.0,
            right:  1170.0,
            bottom: 282.0,
        });
        assert_eq!(regions.ignored_boxes[1].top, 2280.0);
    }

    #[test]
    fn test_chrome_skipped_for_desktop_and_chromedriver() {
        for platform in [PlatformFlags::desktop(), PlatformFlags::android_chrome_driver()] {
            let selected = select_chrome_rectangles(&platform, &block_all(), &ios_device(), true);
            assert!(selected.is_empty());
        }
    }

    #[test]
    fn test_native_context_tool_bar_selects_home_bar() {
        let selected = select_chrome_rectangles(
            &PlatformFlags::ios().native_context(),
            &block_all(),
            &ios_device(),
            true,
        );
        assert_eq!(selected, vec![ios_device().status_bar, ios_device().home_bar]);
    }

    #[test]
    fn test_ios_full_page_home_bar_at_bottom() {
        let shot = encode_screenshot(&ImageBuffer::from_test_pattern(780, 6000)).unwrap();
        let opts = CaptureOptions::builder()
            .device_pixel_ratio(2.0)
            .platform(PlatformFlags::ios())
            .device_rectangles(DeviceRectangles {
                home_bar: Rectangle::new(10.0, 810.0, 370.0, 34.0),
                viewport: Rectangle::new(5.0, 94.0, 380.0, 666.0),
                ..Default::default()
            })
            .build();
        let request = IgnoreRequest {
            captured_image: Some(shot),
            ..Default::default()
        };

        let regions = resolve_ignore_regions(&request, &opts);
        assert_eq!(regions.ignored_boxes, vec![IgnoredBox {
            top:    (3000.0 - 34.0) * 2.0,
            left:   10.0,
            right:  (5.0 + 370.0) * 2.0,
            bottom: 6000.0,
        }]);
    }

    #[test]
    fn test_ios_full_page_home_bar_disabled_or_unreadable() {
        let base = CaptureOptions::builder()
            .device_pixel_ratio(2.0)
            .platform(PlatformFlags::ios())
            .device_rectangles(ios_device());

        let disabled = base
            .clone()
            .block_out(BlockOutOptions {
                tool_bar: Some(false),
                ..Default::default()
            })
            .build();
        let shot = encode_screenshot(&ImageBuffer::from_test_pattern(780, 2000)).unwrap();
        let request = IgnoreRequest {
            captured_image: Some(shot),
            ..Default::default()
        };
        assert!(!resolve_ignore_regions(&request, &disabled).has_ignore_rectangles);

        let unreadable = IgnoreRequest {
            captured_image: Some(Screenshot::from_bytes(b"garbage")),
            ..Default::default()
        };
        let regions = resolve_ignore_regions(&unreadable, &base.build());
        assert!(regions.ignored_boxes.is_empty());
    }

    #[test]
    fn test_caller_regions_filtered_and_never_inverted() {
        let opts = CaptureOptions::builder().device_pixel_ratio(1.5).build();
        let request = IgnoreRequest {
            block_outs: vec![Rectangle::new(0.0, 0.0, 100.0, 20.0), Rectangle::new(5.0, 5.0, 0.0, 10.0)],
            ignore_regions: vec![
                Rectangle::new(10.0, 10.0, -5.0, 10.0),
                Rectangle::new(10.0, 10.0, 10.0, 0.0),
                Rectangle::new(50.0, 60.0, 70.0, 80.0),
            ],
            ..Default::default()
        };

        let regions = resolve_ignore_regions(&request, &opts);
        assert_eq!(regions.ignored_boxes.len(), 2);
        for ignored in &regions.ignored_boxes {
            assert!(ignored.right > ignored.left);
            assert!(ignored.bottom > ignored.top);
        }
        assert_eq!(regions.ignored_boxes[1], IgnoredBox {
            top:    90.0,
            left:   75.0,
            right:  180.0,
            bottom: 210.0,
        });
    }

    #[test]
    fn test_no_sources_yields_empty_output() {
        let regions = resolve_ignore_regions(&IgnoreRequest::default(), &CaptureOptions::default());
        assert!(!regions.has_ignore_rectangles);
        assert!(regions.ignored_boxes.is_empty());

        let json = serde_json::to_value(&regions).unwrap();
        assert_eq!(json["hasIgnoreRectangles"], false);
    }

    #[test]
    fn test_parse_entries_mixed_shapes() {
        let values = vec![
            json!({"element-6066-11e4-a52e-4f735466cecf": "el-1"}),
            json!({"x": 1, "y": 2, "width": 3, "height": 4}),
            json!([{"ELEMENT": "el-2"}, {"x": 0, "y": 0, "width": 10.5, "height": 1}]),
        ];

        let entries = parse_ignore_entries(&values).unwrap();
        assert_eq!(entries, vec![
            IgnoreEntry::Element("el-1".to_string()),
            IgnoreEntry::Region(Rectangle::new(1.0, 2.0, 3.0, 4.0)),
            IgnoreEntry::Element("el-2".to_string()),
            IgnoreEntry::Region(Rectangle::new(0.0, 0.0, 10.5, 1.0)),
        ]);
    }

    #[test]
    fn test_parse_entries_reports_every_invalid_entry() {
        let values = vec![
            json!("#header"),
            json!({"x": 1, "y": 2, "width": 3, "height": 4}),
            json!({"x": 1, "y": 2, "width": 3}),
            json!([{"x": 1, "y": 2, "width": -3, "height": 4}, {"ELEMENT": "ok"}]),
        ];

        match parse_ignore_entries(&values).unwrap_err() {
            CaptureError::InvalidIgnoreRegions { entries } => {
                assert_eq!(entries.len(), 3);
                assert!(entries[0].starts_with("#0:"));
                assert!(entries[1].starts_with("#2:"));
                assert!(entries[2].starts_with("#3.0:"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_entries_through_driver() {
        let driver = MockDriver::desktop(1280.0, 800.0)
            .with_scroll_heights([Some(3000.0)])
            .with_element("el-1", Rectangle::new(20.0, 1400.0, 200.0, 30.0));
        driver.scroll_to(1000.0).await.unwrap();
        let opts = CaptureOptions::builder().inner_size(1280.0, 800.0).build();
        let entries = vec![
            IgnoreEntry::Element("el-1".to_string()),
            IgnoreEntry::Region(Rectangle::new(1.0, 2.0, 3.0, 4.0)),
        ];

        // Viewport capture: where the element is on screen
        let rects = resolve_ignore_entries(&driver, &entries, &opts, (1280, 800), true)
            .await
            .unwrap();
        assert_eq!(rects, vec![
            Rectangle::new(20.0, 400.0, 200.0, 30.0),
            Rectangle::new(1.0, 2.0, 3.0, 4.0),
        ]);

        // Stitched page: where the element is in the document
        let rects = resolve_ignore_entries(&driver, &entries, &opts, (1280, 3000), false)
            .await
            .unwrap();
        assert_eq!(rects[0], Rectangle::new(20.0, 1400.0, 200.0, 30.0));

        let missing = vec![IgnoreEntry::Element("nope".to_string())];
        assert!(
            resolve_ignore_entries(&driver, &missing, &opts, (1280, 800), true)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_ios_element_entry_offset_by_web_view() {
        let viewport = Rectangle::new(0.0, 94.0, 390.0, 666.0);
        let driver = MockDriver::native(WindowSize::new(390.0, 844.0), viewport)
            .with_device_pixel_ratio(3.0)
            .with_element("ad", Rectangle::new(10.0, 100.0, 300.0, 50.0));
        let opts = CaptureOptions::builder()
            .device_pixel_ratio(3.0)
            .platform(PlatformFlags::ios())
            .device_rectangles(DeviceRectangles {
                viewport,
                ..Default::default()
            })
            .build();

        let entries = [IgnoreEntry::Element("ad".to_string())];
        let rects = resolve_ignore_entries(&driver, &entries, &opts, (1170, 2532), true)
            .await
            .unwrap();
        assert_eq!(rects, vec![Rectangle::new(10.0, 194.0, 300.0, 50.0)]);

        let request = IgnoreRequest {
            ignore_regions: rects,
            is_viewport_screenshot: true,
            ..Default::default()
        };
        assert_eq!(resolve_ignore_regions(&request, &opts).ignored_boxes, vec![IgnoredBox {
            top:    194.0 * 3.0,
            left:   30.0,
            right:  930.0,
            bottom: 244.0 * 3.0,
        }]);
    }

    #[tokio::test]
    async fn test_element_entry_on_stitched_device_page_skips_shadow() {
        let viewport = Rectangle::new(0.0, 47.0, 390.0, 733.0);
        let driver = MockDriver::native(WindowSize::new(390.0, 844.0), viewport)
            .with_element("footer", Rectangle::new(0.0, 1800.0, 390.0, 80.0));
        let opts = CaptureOptions::builder()
            .platform(PlatformFlags::android_native_web_screenshot())
            .device_rectangles(DeviceRectangles {
                viewport,
                ..Default::default()
            })
            .shadow_padding(6.0, 6.0)
            .build();

        let entries = [IgnoreEntry::Element("footer".to_string())];
        let rects = resolve_ignore_entries(&driver, &entries, &opts, (390, 1988), false)
            .await
            .unwrap();
        assert_eq!(rects, vec![Rectangle::new(0.0, 1794.0, 390.0, 80.0)]);
    }
}
