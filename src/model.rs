//! Data models and type definitions for visreg-capture
//!
//! This module defines the geometry and capture records shared by the
//! resolvers, the full-page orchestrator and the compositor:
//! - Pixel rectangles in box form ([`Rectangle`]) and edge form
//!   ([`IgnoredBox`])
//! - Device chrome rectangles ([`DeviceRectangles`])
//! - Full-page capture output ([`ViewportSegment`],
//!   [`FullPageScreenshotData`])
//! - Driver-facing handles ([`Screenshot`], [`ElementHandle`])
//!
//! All records serialize to camelCase JSON, which is the shape the diff
//! engine consumes.

use base64::{Engine, engine::general_purpose::STANDARD};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, CaptureResult};

/// A pixel box expressed as origin plus size
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Rectangle {
    /// Left edge
    pub x:      f64,
    /// Top edge
    pub y:      f64,
    /// Width (never negative once resolved)
    pub width:  f64,
    /// Height (never negative once resolved)
    pub height: f64,
}

impl Rectangle {
    /// Creates a new rectangle
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rectangle at the origin with the given size
    pub fn from_size(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    /// Returns true when every field is zero
    pub fn is_all_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.width == 0.0 && self.height == 0.0
    }

    /// Returns true when either axis has no extent
    ///
    /// Such a box passed to the comparator either blocks the whole image or
    /// silently drops an axis, so it must never be used as an ignore region.
    pub fn has_zero_area(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Right edge (`x + width`)
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge (`y + height`)
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Returns the rectangle with width and height exchanged
    pub fn swapped(&self) -> Self {
        Self::new(self.x, self.y, self.height, self.width)
    }

    /// Converts to the edge form expected by the diff engine
    pub fn to_ignored_box(&self) -> IgnoredBox {
        IgnoredBox {
            top:    self.y,
            left:   self.x,
            right:  self.right(),
            bottom: self.bottom(),
        }
    }
}

/// A pixel box expressed as edges
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IgnoredBox {
    pub top:    f64,
    pub left:   f64,
    pub right:  f64,
    pub bottom: f64,
}

/// Physical screen orientation reported by the driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    /// Returns the orientation as the uppercase driver string
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "PORTRAIT",
            Orientation::Landscape => "LANDSCAPE",
        }
    }

    pub fn is_landscape(&self) -> bool {
        matches!(self, Orientation::Landscape)
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Window or screen size reported by the driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WindowSize {
    pub width:  f64,
    pub height: f64,
}

impl WindowSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Named device chrome rectangles for one session context
///
/// All values are CSS pixels on every platform. Android capabilities are
/// converted on the way in (see `android_device_rectangles`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRectangles {
    pub status_bar:                Rectangle,
    pub status_bar_and_address_bar: Rectangle,
    /// Browser toolbar below the web view
    pub bottom_bar:                Rectangle,
    /// Home indicator (iOS) or navigation bar (Android)
    pub home_bar:                  Rectangle,
    pub left_side_padding:         Rectangle,
    pub right_side_padding:        Rectangle,
    /// Web view area inside the device screenshot
    pub viewport:                  Rectangle,
    pub screen_size:               Rectangle,
}

/// An opaque screenshot handle: base64-encoded image bytes from the driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Screenshot(String);

impl Screenshot {
    /// Wraps a base64 payload returned by the driver
    pub fn from_base64(data: impl Into<String>) -> Self {
        Self(data.into())
    }

    /// Encodes raw image bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(STANDARD.encode(bytes))
    }

    pub fn as_base64(&self) -> &str {
        &self.0
    }

    /// Decodes the payload into raw image bytes
    pub fn decode(&self) -> CaptureResult<Vec<u8>> {
        // Some drivers wrap lines in their base64 output
        let cleaned: String = self.0.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD
            .decode(cleaned.as_bytes())
            .map_err(|e| CaptureError::ImageError(format!("Invalid base64 screenshot: {e}")))
    }
}

/// One scrolled-and-captured slice of a full-page screenshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ViewportSegment {
    pub screenshot:        Screenshot,
    /// Width of the slice on the output canvas
    pub canvas_width:      f64,
    /// Vertical position of the slice on the output canvas
    pub canvas_y_position: f64,
    pub image_width:       f64,
    pub image_height:      f64,
    /// Crop origin inside the raw capture
    pub image_x_position:  f64,
    pub image_y_position:  f64,
    /// The raw capture is portrait-shaped while the device is in landscape
    #[serde(default)]
    pub rotated:           bool,
}

/// The ordered segments of one full-page capture plus total page size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FullPageScreenshotData {
    pub full_page_width:  f64,
    pub full_page_height: f64,
    #[serde(rename = "data")]
    pub segments:         Vec<ViewportSegment>,
}

impl FullPageScreenshotData {
    /// Sum of all segment heights; equals the page height up to rounding
    pub fn stitched_height(&self) -> f64 {
        self.segments.iter().map(|s| s.image_height).sum()
    }
}

/// Identifier of an automation session in the [`SessionRegistry`](crate::session::SessionRegistry)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reference to a remote element together with the session that owns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ElementHandle {
    pub session:    SessionId,
    /// W3C web element reference
    pub element_id: String,
    /// Selector the element was located with, used in error messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector:   Option<String>,
}

impl ElementHandle {
    pub fn new(session: SessionId, element_id: impl Into<String>) -> Self {
        Self {
            session,
            element_id: element_id.into(),
            selector: None,
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }
}

/// An element's bounding box as read from the page
///
/// `rect` is relative to the top of the visual viewport; `scroll_x` and
/// `scroll_y` are the document scroll offsets at the time it was read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ElementBox {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    pub rect:     Rectangle,
    #[serde(default)]
    pub scroll_x: f64,
    #[serde(default)]
    pub scroll_y: f64,
}

impl ElementBox {
    pub fn new(rect: Rectangle) -> Self {
        Self {
            selector: None,
            rect,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_scroll(mut self, scroll_x: f64, scroll_y: f64) -> Self {
        self.scroll_x = scroll_x;
        self.scroll_y = scroll_y;
        self
    }

    /// The bounding box relative to the top of the document
    pub fn document_rect(&self) -> Rectangle {
        Rectangle::new(
            self.rect.x + self.scroll_x,
            self.rect.y + self.scroll_y,
            self.rect.width,
            self.rect.height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_edges() {
        let rect = Rectangle::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(rect.right(), 40.0);
        assert_eq!(rect.bottom(), 60.0);

        let ignored = rect.to_ignored_box();
        assert_eq!(ignored, IgnoredBox {
            top:    20.0,
            left:   10.0,
            right:  40.0,
            bottom: 60.0,
        });
    }

    #[test]
    fn test_rectangle_zero_checks() {
        assert!(Rectangle::default().is_all_zero());
        assert!(Rectangle::default().has_zero_area());
        assert!(Rectangle::new(5.0, 5.0, 0.0, 10.0).has_zero_area());
        assert!(Rectangle::new(5.0, 5.0, 10.0, 0.0).has_zero_area());
        assert!(!Rectangle::new(5.0, 5.0, 0.0, 10.0).is_all_zero());
        assert!(!Rectangle::new(0.0, 0.0, 1.0, 1.0).has_zero_area());
    }

    #[test]
    fn test_rectangle_swapped() {
        let rect = Rectangle::new(1.0, 2.0, 300.0, 600.0);
        assert_eq!(rect.swapped(), Rectangle::new(1.0, 2.0, 600.0, 300.0));
    }

    #[test]
    fn test_orientation_serialization() {
        assert_eq!(serde_json::to_string(&Orientation::Portrait).unwrap(), r#""PORTRAIT""#);
        assert_eq!(
            serde_json::from_str::<Orientation>(r#""LANDSCAPE""#).unwrap(),
            Orientation::Landscape
        );
        assert_eq!(format!("{}", Orientation::Landscape), "LANDSCAPE");
    }

    #[test]
    fn test_device_rectangles_camel_case() {
        let rects = DeviceRectangles {
            status_bar: Rectangle::new(0.0, 0.0, 390.0, 47.0),
            ..Default::default()
        };
        let json = serde_json::to_value(rects).unwrap();
        assert_eq!(json["statusBar"]["height"], 47.0);
        assert!(json.get("statusBarAndAddressBar").is_some());
        assert!(json.get("homeBar").is_some());
    }

    #[test]
    fn test_screenshot_round_trip_bytes() {
        let shot = Screenshot::from_bytes(b"\x89PNG");
        assert_eq!(shot.decode().unwrap(), b"\x89PNG");
    }

    #[test]
    fn test_screenshot_decode_tolerates_line_breaks() {
        let encoded = STANDARD.encode(b"hello world, this is a screenshot");
        let (head, tail) = encoded.split_at(10);
        let shot = Screenshot::from_base64(format!("{head}\n{tail}"));
        assert_eq!(shot.decode().unwrap(), b"hello world, this is a screenshot");
    }

    #[test]
    fn test_screenshot_decode_invalid() {
        let shot = Screenshot::from_base64("***not base64***");
        assert!(matches!(shot.decode(), Err(CaptureError::ImageError(_))));
    }

    #[test]
    fn test_full_page_data_serialization() {
        let data = FullPageScreenshotData {
            full_page_width:  100.0,
            full_page_height: 200.0,
            segments:         vec![ViewportSegment {
                screenshot:        Screenshot::from_base64("abc"),
                canvas_width:      100.0,
                canvas_y_position: 0.0,
                image_width:       100.0,
                image_height:      200.0,
                image_x_position:  0.0,
                image_y_position:  0.0,
                rotated:           false,
            }],
        };

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["fullPageHeight"], 200.0);
        assert_eq!(json["data"][0]["canvasYPosition"], 0.0);
        assert_eq!(json["data"][0]["screenshot"], "abc");
        assert_eq!(data.stitched_height(), 200.0);
    }

    #[test]
    fn test_element_box_document_rect() {
        let element = ElementBox::new(Rectangle::new(10.0, 50.0, 100.0, 20.0)).with_scroll(0.0, 400.0);
        assert_eq!(element.document_rect(), Rectangle::new(10.0, 450.0, 100.0, 20.0));
    }

    #[test]
    fn test_element_handle_selector() {
        let handle = ElementHandle::new(SessionId::new("s-1"), "el-1").with_selector("#header");
        assert_eq!(handle.selector.as_deref(), Some("#header"));
        assert_eq!(handle.session.to_string(), "s-1");
    }

    #[test]
    fn test_json_schema_generation() {
        let _rect_schema = schemars::schema_for!(Rectangle);
        let _device_schema = schemars::schema_for!(DeviceRectangles);
        let _data_schema = schemars::schema_for!(FullPageScreenshotData);
    }
}
