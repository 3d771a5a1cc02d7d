//! Device chrome rectangles
//!
//! Three sources feed [`DeviceRectangles`]:
//! - Android sessions report status bar, viewport and screen size in their
//!   capabilities. Those are device pixels and are divided by the DPR here.
//! - iOS sessions report none of it, so status bar and home indicator come
//!   from a table of known devices (CSS points).
//! - The web view position inside the screen is measured by a calibration
//!   probe: an overlay records where a native tap at the screen centre lands
//!   in the page.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::dpr::{ScaleByDpr, validate_dpr};
use crate::{
    capture::{Driver, constants, page},
    error::{CaptureError, CaptureResult},
    model::{DeviceRectangles, Orientation, Rectangle},
};

/// The subset of Android session capabilities that describes the screen
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidCapabilities {
    /// Status bar height
    #[serde(rename = "statBarHeight")]
    pub status_bar_height: f64,
    pub viewport_rect:     AndroidViewportRect,
    /// Screen size as "WIDTHxHEIGHT"
    #[serde(rename = "deviceScreenSize", deserialize_with = "deserialize_screen_size")]
    pub screen_size:       (f64, f64),
    /// Navigation bar height, when the session reports it
    #[serde(default)]
    pub nav_bar_height:    f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AndroidViewportRect {
    pub left:   f64,
    pub top:    f64,
    pub width:  f64,
    pub height: f64,
}

fn deserialize_screen_size<'de, D>(deserializer: D) -> Result<(f64, f64), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_screen_size(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid screen size '{raw}'")))
}

fn parse_screen_size(raw: &str) -> Option<(f64, f64)> {
    let (width, height) = raw.trim().split_once(['x', 'X'])?;
    Some((width.trim().parse().ok()?, height.trim().parse().ok()?))
}

/// Derives chrome rectangles from Android capabilities
///
/// Capabilities are device pixels. The result is CSS pixels like every other
/// [`DeviceRectangles`], so it can feed both the capture loop and the ignore
/// regions unchanged.
pub fn android_device_rectangles(caps: &AndroidCapabilities, dpr: f64) -> CaptureResult<DeviceRectangles> {
    let dpr = validate_dpr(dpr)?;
    let (screen_width, screen_height) = caps.screen_size;
    let vp = &caps.viewport_rect;
    let viewport = Rectangle::new(vp.left, vp.top, vp.width, vp.height);
    let nav_top = screen_height - caps.nav_bar_height;

    let rects = DeviceRectangles {
        status_bar: Rectangle::from_size(screen_width, caps.status_bar_height),
        status_bar_and_address_bar: Rectangle::from_size(screen_width, viewport.y),
        bottom_bar: Rectangle::new(
            0.0,
            viewport.bottom(),
            screen_width,
            (nav_top - viewport.bottom()).max(0.0),
        ),
        home_bar: Rectangle::new(0.0, nav_top, screen_width, caps.nav_bar_height),
        left_side_padding: Rectangle::new(0.0, viewport.y, viewport.x, viewport.height),
        right_side_padding: Rectangle::new(
            viewport.right(),
            viewport.y,
            (screen_width - viewport.right()).max(0.0),
            viewport.height,
        ),
        viewport,
        screen_size: Rectangle::from_size(screen_width, screen_height),
    }
    .scale_by_dpr(1.0 / dpr);

    debug!(dpr, viewport = ?rects.viewport, "Derived Android device rectangles");
    Ok(rects)
}

/// Portrait metrics of a known iOS device, CSS points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IosDeviceMetrics {
    pub width:             f64,
    pub height:            f64,
    pub status_bar:        f64,
    /// Status bar height in landscape (hidden on notched iPhones)
    pub landscape_status:  f64,
    pub home_bar:          f64,
    pub landscape_home_bar: f64,
}

const fn metrics(
    width: f64,
    height: f64,
    status_bar: f64,
    landscape_status: f64,
    home_bar: f64,
    landscape_home_bar: f64,
) -> IosDeviceMetrics {
    IosDeviceMetrics {
        width,
        height,
        status_bar,
        landscape_status,
        home_bar,
        landscape_home_bar,
    }
}

const IPHONE_HOME_BUTTON: IosDeviceMetrics = metrics(375.0, 667.0, 20.0, 0.0, 0.0, 0.0);
const IPHONE_PLUS: IosDeviceMetrics = metrics(414.0, 736.0, 20.0, 0.0, 0.0, 0.0);
const IPHONE_X: IosDeviceMetrics = metrics(375.0, 812.0, 44.0, 0.0, 34.0, 21.0);
const IPHONE_XR: IosDeviceMetrics = metrics(414.0, 896.0, 48.0, 0.0, 34.0, 21.0);
const IPHONE_XS_MAX: IosDeviceMetrics = metrics(414.0, 896.0, 44.0, 0.0, 34.0, 21.0);
const IPHONE_MINI: IosDeviceMetrics = metrics(375.0, 812.0, 50.0, 0.0, 34.0, 21.0);
const IPHONE_12: IosDeviceMetrics = metrics(390.0, 844.0, 47.0, 0.0, 34.0, 21.0);
const IPHONE_12_MAX: IosDeviceMetrics = metrics(428.0, 926.0, 47.0, 0.0, 34.0, 21.0);
const IPHONE_14_PRO: IosDeviceMetrics = metrics(393.0, 852.0, 54.0, 0.0, 34.0, 21.0);
const IPHONE_14_PRO_MAX: IosDeviceMetrics = metrics(430.0, 932.0, 54.0, 0.0, 34.0, 21.0);
const IPAD: IosDeviceMetrics = metrics(810.0, 1080.0, 20.0, 20.0, 0.0, 0.0);
const IPAD_AIR: IosDeviceMetrics = metrics(820.0, 1180.0, 24.0, 24.0, 20.0, 20.0);
const IPAD_PRO_11: IosDeviceMetrics = metrics(834.0, 1194.0, 24.0, 24.0, 20.0, 20.0);
const IPAD_PRO_12_9: IosDeviceMetrics = metrics(1024.0, 1366.0, 24.0, 24.0, 20.0, 20.0);

static IOS_DEVICES: &[(&str, IosDeviceMetrics)] = &[
    ("iphone se", IPHONE_HOME_BUTTON),
    ("iphone 8", IPHONE_HOME_BUTTON),
    ("iphone 8 plus", IPHONE_PLUS),
    ("iphone x", IPHONE_X),
    ("iphone xs", IPHONE_X),
    ("iphone 11 pro", IPHONE_X),
    ("iphone xr", IPHONE_XR),
    ("iphone 11", IPHONE_XR),
    ("iphone xs max", IPHONE_XS_MAX),
    ("iphone 11 pro max", IPHONE_XS_MAX),
    ("iphone 12 mini", IPHONE_MINI),
    ("iphone 13 mini", IPHONE_MINI),
    ("iphone 12", IPHONE_12),
    ("iphone 12 pro", IPHONE_12),
    ("iphone 13", IPHONE_12),
    ("iphone 13 pro", IPHONE_12),
    ("iphone 14", IPHONE_12),
    ("iphone 12 pro max", IPHONE_12_MAX),
    ("iphone 13 pro max", IPHONE_12_MAX),
    ("iphone 14 plus", IPHONE_12_MAX),
    ("iphone 14 pro", IPHONE_14_PRO),
    ("iphone 15", IPHONE_14_PRO),
    ("iphone 15 pro", IPHONE_14_PRO),
    ("iphone 14 pro max", IPHONE_14_PRO_MAX),
    ("iphone 15 plus", IPHONE_14_PRO_MAX),
    ("iphone 15 pro max", IPHONE_14_PRO_MAX),
    ("ipad", IPAD),
    ("ipad air", IPAD_AIR),
    ("ipad pro 11-inch", IPAD_PRO_11),
    ("ipad pro 12.9-inch", IPAD_PRO_12_9),
];

static PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^)]*\)").expect("parenthetical regex compiles"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex compiles"));

/// Normalizes a device name for table lookup
///
/// Lowercases, drops parenthesised qualifiers such as "(3rd generation)" and
/// collapses whitespace.
///
/// # Examples
///
/// ```
/// use visreg_capture::geometry::device::normalize_device_name;
///
/// assert_eq!(normalize_device_name("iPhone SE (3rd generation)"), "iphone se");
/// assert_eq!(normalize_device_name("  iPad Pro 11-inch (4th generation) "), "ipad pro 11-inch");
/// ```
pub fn normalize_device_name(name: &str) -> String {
    let stripped = PARENTHETICAL.replace_all(name, "");
    WHITESPACE
        .replace_all(stripped.trim(), " ")
        .to_lowercase()
}

/// Looks up a known iOS device
pub fn ios_device_metrics(device_name: &str) -> CaptureResult<IosDeviceMetrics> {
    let normalized = normalize_device_name(device_name);
    IOS_DEVICES
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, metrics)| *metrics)
        .ok_or_else(|| CaptureError::UnknownDevice {
            device: device_name.to_string(),
        })
}

/// Status bar, home bar and screen size of a known iOS device
///
/// The web view dependent rectangles (viewport, address bar, toolbar,
/// paddings) stay zero until [`calibrate_webview`] fills them in.
pub fn ios_device_rectangles(
    device_name: &str,
    orientation: Orientation,
) -> CaptureResult<DeviceRectangles> {
    let metrics = ios_device_metrics(device_name)?;
    let (width, height, status, home) = match orientation {
        Orientation::Portrait => (metrics.width, metrics.height, metrics.status_bar, metrics.home_bar),
        Orientation::Landscape => (
            metrics.height,
            metrics.width,
            metrics.landscape_status,
            metrics.landscape_home_bar,
        ),
    };

    Ok(DeviceRectangles {
        status_bar: Rectangle::from_size(width, status),
        home_bar: if home > 0.0 {
            Rectangle::new(0.0, height - home, width, home)
        } else {
            Rectangle::default()
        },
        screen_size: Rectangle::from_size(width, height),
        ..Default::default()
    })
}

/// Derives the web view dependent rectangles from a calibration measurement
///
/// `tap` is where the native tap hit the screen, `click` where the page saw
/// it, `overlay` the size of the full-viewport overlay and `screen` the
/// screen size. Status bar and home bar are kept from `base`.
pub fn derive_webview_rectangles(
    base: &DeviceRectangles,
    tap: (f64, f64),
    click: &page::CalibrationClick,
    screen: (f64, f64),
) -> CaptureResult<DeviceRectangles> {
    let viewport = Rectangle::new(
        (tap.0 - click.x).max(0.0),
        (tap.1 - click.y).max(0.0),
        click.width,
        click.height,
    );
    if viewport.has_zero_area() {
        return Err(CaptureError::EmptyRectangle {
            target: "viewport".to_string(),
            width:  viewport.width,
            height: viewport.height,
        });
    }

    let (screen_width, screen_height) = screen;
    Ok(DeviceRectangles {
        status_bar: base.status_bar,
        status_bar_and_address_bar: Rectangle::from_size(screen_width, viewport.y),
        bottom_bar: Rectangle::new(
            0.0,
            viewport.bottom(),
            screen_width,
            (screen_height - viewport.bottom()).max(0.0),
        ),
        home_bar: base.home_bar,
        left_side_padding: Rectangle::new(0.0, viewport.y, viewport.x, viewport.height),
        right_side_padding: Rectangle::new(
            viewport.right(),
            viewport.y,
            (screen_width - viewport.right()).max(0.0),
            viewport.height,
        ),
        viewport,
        screen_size: Rectangle::from_size(screen_width, screen_height),
    })
}

/// Measures where the web view sits on the device screen
///
/// Injects a click-recording overlay, taps the screen centre natively and
/// reads back the page coordinates of the tap. The overlay is removed on
/// every path.
pub async fn calibrate_webview(
    driver: &dyn Driver,
    base: &DeviceRectangles,
) -> CaptureResult<DeviceRectangles> {
    page::inject_calibration_overlay(driver).await?;

    let measured = measure_tap(driver).await;

    if let Err(e) = page::remove_calibration_overlay(driver).await {
        warn!("Failed to remove calibration overlay: {}", e);
    }

    let (tap, click, screen) = measured?;
    let rectangles = derive_webview_rectangles(base, tap, &click, screen)?;
    info!(
        x = rectangles.viewport.x,
        y = rectangles.viewport.y,
        width = rectangles.viewport.width,
        height = rectangles.viewport.height,
        "Calibrated web view"
    );
    Ok(rectangles)
}

async fn measure_tap(
    driver: &dyn Driver,
) -> CaptureResult<((f64, f64), page::CalibrationClick, (f64, f64))> {
    let window = driver.window_size().await?;
    let tap = (window.width / 2.0, window.height / 2.0);
    debug!(x = tap.0, y = tap.1, "Calibration tap");

    driver.native_tap(tap.0, tap.1).await?;
    tokio::time::sleep(Duration::from_millis(constants::calibration_settle_ms())).await;

    let click = page::read_calibration_click(driver).await?;
    Ok((tap, click, (window.width, window.height)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{capture::MockDriver, model::WindowSize};

    fn pixel_7_caps() -> AndroidCapabilities {
        serde_json::from_value(serde_json::json!({
            "statBarHeight": 118,
            "viewportRect": {"left": 0, "top": 118, "width": 1080, "height": 2062},
            "deviceScreenSize": "1080x2400",
            "navBarHeight": 132
        }))
        .unwrap()
    }

    #[test]
    fn test_android_rectangles_from_capabilities() {
        let rects = android_device_rectangles(&pixel_7_caps(), 1.0).unwrap();

        assert_eq!(rects.status_bar, Rectangle::new(0.0, 0.0, 1080.0, 118.0));
        assert_eq!(rects.status_bar_and_address_bar, Rectangle::new(0.0, 0.0, 1080.0, 118.0));
        assert_eq!(rects.viewport, Rectangle::new(0.0, 118.0, 1080.0, 2062.0));
        assert_eq!(rects.bottom_bar, Rectangle::new(0.0, 2180.0, 1080.0, 88.0));
        assert_eq!(rects.home_bar, Rectangle::new(0.0, 2268.0, 1080.0, 132.0));
        assert!(rects.left_side_padding.has_zero_area());
        assert!(rects.right_side_padding.has_zero_area());
        assert_eq!(rects.screen_size, Rectangle::from_size(1080.0, 2400.0));
    }

    #[test]
    fn test_android_rectangles_converted_to_css() {
        let rects = android_device_rectangles(&pixel_7_caps(), 2.0).unwrap();

        assert_eq!(rects.status_bar, Rectangle::new(0.0, 0.0, 540.0, 59.0));
        assert_eq!(rects.viewport, Rectangle::new(0.0, 59.0, 540.0, 1031.0));
        assert_eq!(rects.home_bar, Rectangle::new(0.0, 1134.0, 540.0, 66.0));
        assert_eq!(rects.screen_size, Rectangle::from_size(540.0, 1200.0));

        assert!(android_device_rectangles(&pixel_7_caps(), 0.0).is_err());
    }

    #[test]
    fn test_android_capabilities_bad_screen_size() {
        let result: Result<AndroidCapabilities, _> = serde_json::from_value(serde_json::json!({
            "statBarHeight": 10,
            "viewportRect": {"left": 0, "top": 0, "width": 1, "height": 1},
            "deviceScreenSize": "big"
        }));
        assert!(result.is_err());
        assert_eq!(parse_screen_size("1080 X 1920"), Some((1080.0, 1920.0)));
    }

    #[test]
    fn test_ios_table_lookup() {
        let rects = ios_device_rectangles("iPhone 14", Orientation::Portrait).unwrap();
        assert_eq!(rects.status_bar, Rectangle::new(0.0, 0.0, 390.0, 47.0));
        assert_eq!(rects.home_bar, Rectangle::new(0.0, 810.0, 390.0, 34.0));
        assert_eq!(rects.screen_size, Rectangle::from_size(390.0, 844.0));
        assert!(rects.viewport.is_all_zero());
    }

    #[test]
    fn test_ios_table_landscape() {
        let rects = ios_device_rectangles("iPhone 13 Pro", Orientation::Landscape).unwrap();
        assert!(rects.status_bar.has_zero_area());
        assert_eq!(rects.home_bar, Rectangle::new(0.0, 369.0, 844.0, 21.0));

        let ipad = ios_device_rectangles("iPad Air (5th generation)", Orientation::Landscape).unwrap();
        assert_eq!(ipad.status_bar.height, 24.0);
    }

    #[test]
    fn test_ios_home_button_devices_have_no_home_bar() {
        let rects = ios_device_rectangles("iPhone SE (3rd generation)", Orientation::Portrait).unwrap();
        assert!(rects.home_bar.is_all_zero());
    }

    #[test]
    fn test_unknown_ios_device() {
        let err = ios_device_rectangles("iPhone 99 Ultra", Orientation::Portrait).unwrap_err();
        assert!(matches!(err, CaptureError::UnknownDevice { ref device } if device == "iPhone 99 Ultra"));
        assert!(err.is_geometry_error());
    }

    #[test]
    fn test_derive_webview_rectangles() {
        let base = ios_device_rectangles("iPhone 14", Orientation::Portrait).unwrap();
        let click = page::CalibrationClick {
            x:      195.0,
            y:      333.0,
            width:  390.0,
            height: 664.0,
        };

        let rects = derive_webview_rectangles(&base, (195.0, 422.0), &click, (390.0, 844.0)).unwrap();
        assert_eq!(rects.viewport, Rectangle::new(0.0, 89.0, 390.0, 664.0));
        assert_eq!(rects.status_bar_and_address_bar, Rectangle::new(0.0, 0.0, 390.0, 89.0));
        assert_eq!(rects.bottom_bar, Rectangle::new(0.0, 753.0, 390.0, 91.0));
        assert_eq!(rects.status_bar, base.status_bar);
        assert_eq!(rects.home_bar, base.home_bar);
    }

    #[test]
    fn test_derive_rejects_empty_overlay() {
        let click = page::CalibrationClick {
            x:      0.0,
            y:      0.0,
            width:  0.0,
            height: 0.0,
        };
        let err = derive_webview_rectangles(&DeviceRectangles::default(), (10.0, 10.0), &click, (20.0, 20.0))
            .unwrap_err();
        assert!(matches!(err, CaptureError::EmptyRectangle { .. }));
    }

    #[tokio::test]
    async fn test_calibrate_webview_removes_overlay() {
        let driver = MockDriver::desktop(390.0, 664.0)
            .with_window_size(WindowSize::new(390.0, 844.0))
            .with_webview(Rectangle::new(0.0, 89.0, 390.0, 664.0));

        let base = ios_device_rectangles("iPhone 14", Orientation::Portrait).unwrap();
        let rects = calibrate_webview(&driver, &base).await.unwrap();

        assert_eq!(rects.viewport, Rectangle::new(0.0, 89.0, 390.0, 664.0));
        assert_eq!(driver.taps(), vec![(195.0, 422.0)]);
        assert!(!driver.calibration_overlay_present());
    }

    #[tokio::test]
    async fn test_calibrate_webview_failed_tap_still_removes_overlay() {
        let driver = MockDriver::desktop(390.0, 664.0)
            .with_window_size(WindowSize::new(390.0, 844.0))
            .with_failure("nativeTap");

        let err = calibrate_webview(&driver, &DeviceRectangles::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Driver { ref operation, .. } if operation == "nativeTap"));
        assert!(!driver.calibration_overlay_present());
    }
}
