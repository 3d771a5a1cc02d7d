//! Mock driver for testing
//!
//! This module provides a `MockDriver` implementation of the [`Driver`] trait
//! that simulates a scrollable page without a real browser or device.
//!
//! # Features
//!
//! - **Simulated page:** Every screenshot pixel encodes the document row it
//!   shows (see [`MockDriver::document_row`]), so stitched output can be
//!   checked row by row
//! - **Lazy loading:** Scroll height reads walk through a scripted sequence
//! - **Device screens:** Native mode renders the whole device screen with
//!   grey chrome around the web view, optionally portrait-shaped in landscape
//! - **Page state:** Tracks hidden scrollbars, hidden and removed elements and
//!   the calibration overlay
//! - **Configurable Delay:** Simulate driver round-trip latency
//! - **Error Injection:** Fail any operation by name, immediately or after a
//!   number of successful calls
//!
//! # Examples
//!
//! ```
//! use visreg_capture::capture::{Driver, MockDriver};
//!
//! #[tokio::main]
//! async fn main() {
//!     let driver = MockDriver::desktop(1280.0, 800.0).with_scroll_heights([Some(2400.0)]);
//!
//!     driver.scroll_to(800.0).await.unwrap();
//!     let shot = driver.take_screenshot().await.unwrap();
//!     assert!(!shot.as_base64().is_empty());
//!     assert_eq!(driver.scroll_log(), vec![800.0]);
//! }
//! ```

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use image::{Rgba, codecs::png::CompressionType};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::time::sleep;

use super::{Driver, ImageBuffer, page};
use crate::{
    error::{CaptureError, CaptureResult},
    model::{Orientation, Rectangle, Screenshot, WindowSize},
    util::encode::encode_png_with_compression,
};

/// Blue channel of pixels showing page content
const CONTENT_MARKER: u8 = 128;

/// Colour of device chrome outside the web view
const CHROME_PIXEL: Rgba<u8> = Rgba([90, 90, 90, 255]);

/// A device screen with a web view, CSS pixels
#[derive(Debug, Clone, Copy)]
struct NativeScreen {
    screen:   WindowSize,
    viewport: Rectangle,
}

#[derive(Debug, Default)]
struct PageState {
    scroll_heights:    Vec<Option<f64>>,
    height_reads:      usize,
    scroll_y:          f64,
    scrollbars_hidden: bool,
    hidden:            Vec<String>,
    removed:           Vec<String>,
    overlay:           bool,
    click:             Option<(f64, f64)>,
    calls:             HashMap<String, usize>,
    scroll_log:        Vec<f64>,
    script_log:        Vec<String>,
    taps:              Vec<(f64, f64)>,
    events:            Vec<String>,
}

impl PageState {
    /// Height of the document as last observed by the engine
    fn current_height(&self) -> Option<f64> {
        let index = self.height_reads.saturating_sub(1);
        self.scroll_heights
            .get(index)
            .or_else(|| self.scroll_heights.last())
            .copied()
            .flatten()
    }
}

/// Mock driver for testing and development
///
/// `MockDriver` is thread-safe and can be shared across tasks using `Arc`.
/// Page state sits behind a `parking_lot::Mutex` that is never held across an
/// await point.
#[derive(Debug)]
pub struct MockDriver {
    delay:        Option<Duration>,
    /// Operation name -> number of calls that succeed before it fails
    failures:     HashMap<String, usize>,
    inner_width:  f64,
    inner_height: f64,
    dpr:          f64,
    native:       Option<NativeScreen>,
    orientation:  Orientation,
    rotate_shots: bool,
    image_height: Option<u32>,
    window_size:  Option<WindowSize>,
    webview:      Option<Rectangle>,
    elements:     HashMap<String, Rectangle>,
    state:        Mutex<PageState>,
}

impl MockDriver {
    /// A desktop browser whose viewport is `inner_width` x `inner_height`
    pub fn desktop(inner_width: f64, inner_height: f64) -> Self {
        Self {
            delay: None,
            failures: HashMap::new(),
            inner_width,
            inner_height,
            dpr: 1.0,
            native: None,
            orientation: Orientation::Portrait,
            rotate_shots: false,
            image_height: None,
            window_size: None,
            webview: None,
            elements: HashMap::new(),
            state: Mutex::new(PageState {
                scroll_heights: vec![Some(inner_height)],
                ..PageState::default()
            }),
        }
    }

    /// A device whose screenshots cover the whole `screen`, with the page
    /// rendered inside `viewport`
    ///
    /// # Examples
    ///
    /// ```
    /// use visreg_capture::{
    ///     capture::MockDriver,
    ///     model::{Rectangle, WindowSize},
    /// };
    ///
    /// let driver = MockDriver::native(
    ///     WindowSize::new(390.0, 844.0),
    ///     Rectangle::new(0.0, 47.0, 390.0, 733.0),
    /// )
    /// .with_device_pixel_ratio(2.0);
    /// ```
    pub fn native(screen: WindowSize, viewport: Rectangle) -> Self {
        let mut driver = Self::desktop(viewport.width, viewport.height);
        driver.native = Some(NativeScreen { screen, viewport });
        driver.webview = Some(viewport);
        driver
    }

    pub fn with_device_pixel_ratio(mut self, dpr: f64) -> Self {
        self.dpr = dpr;
        self
    }

    /// Scroll height reported by successive reads; the last value repeats
    pub fn with_scroll_heights(self, heights: impl IntoIterator<Item = Option<f64>>) -> Self {
        self.state.lock().scroll_heights = heights.into_iter().collect();
        self
    }

    /// Registers an element at a document-relative position
    pub fn with_element(mut self, id: impl Into<String>, rect: Rectangle) -> Self {
        self.elements.insert(id.into(), rect);
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Returns landscape device screenshots portrait-shaped
    pub fn with_rotated_screenshots(mut self) -> Self {
        self.rotate_shots = true;
        self
    }

    /// Overrides the physical height of viewport screenshots
    pub fn with_image_height(mut self, height: u32) -> Self {
        self.image_height = Some(height);
        self
    }

    pub fn with_window_size(mut self, size: WindowSize) -> Self {
        self.window_size = Some(size);
        self
    }

    /// Web view position used to answer calibration taps
    pub fn with_webview(mut self, viewport: Rectangle) -> Self {
        self.webview = Some(viewport);
        self
    }

    /// Sets a configurable delay for all driver operations
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use visreg_capture::capture::MockDriver;
    ///
    /// let driver = MockDriver::desktop(1280.0, 800.0).with_delay(Duration::from_millis(100));
    /// ```
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Makes every call of `operation` fail
    ///
    /// Operation names are the driver commands (`scrollTo`, `takeScreenshot`,
    /// `elementRect`, `nativeTap`, ...) and the page script names
    /// (`scrollHeight`, `hideScrollbars`, `mutateElements`, ...).
    pub fn with_failure(self, operation: impl Into<String>) -> Self {
        self.with_failure_after(operation, 0)
    }

    /// Makes `operation` fail once it has succeeded `successes` times
    pub fn with_failure_after(mut self, operation: impl Into<String>, successes: usize) -> Self {
        self.failures.insert(operation.into(), successes);
        self
    }

    /// Decodes the document row a content pixel shows
    ///
    /// Returns `None` for chrome and transparent pixels.
    pub fn document_row(pixel: Rgba<u8>) -> Option<u32> {
        if pixel[2] != CONTENT_MARKER || pixel[3] != 255 {
            return None;
        }
        Some(u32::from(pixel[0]) + u32::from(pixel[1]) * 256)
    }

    pub fn scrollbars_hidden(&self) -> bool {
        self.state.lock().scrollbars_hidden
    }

    pub fn hidden_elements(&self) -> Vec<String> {
        self.state.lock().hidden.clone()
    }

    pub fn removed_elements(&self) -> Vec<String> {
        self.state.lock().removed.clone()
    }

    pub fn calibration_overlay_present(&self) -> bool {
        self.state.lock().overlay
    }

    /// Scroll targets requested, in order
    pub fn scroll_log(&self) -> Vec<f64> {
        self.state.lock().scroll_log.clone()
    }

    /// Names of the scripts executed, in order
    pub fn script_log(&self) -> Vec<String> {
        self.state.lock().script_log.clone()
    }

    pub fn taps(&self) -> Vec<(f64, f64)> {
        self.state.lock().taps.clone()
    }

    /// Ordered log of state-changing calls, e.g. `scrollTo:800`,
    /// `hideScrollbars:true`, `takeScreenshot`, `hide:true:header`
    pub fn events(&self) -> Vec<String> {
        self.state.lock().events.clone()
    }

    /// Number of successful calls of `operation`
    pub fn call_count(&self, operation: &str) -> usize {
        self.state.lock().calls.get(operation).copied().unwrap_or(0)
    }

    async fn apply_delay(&self) {
        if let Some(duration) = self.delay {
            sleep(duration).await;
        }
    }

    /// Counts the call or returns the injected failure
    fn check_failure(&self, operation: &str) -> CaptureResult<()> {
        let mut state = self.state.lock();
        let count = state.calls.entry(operation.to_string()).or_insert(0);
        if self
            .failures
            .get(operation)
            .is_some_and(|successes| *count >= *successes)
        {
            return Err(CaptureError::driver(operation, "injected failure"));
        }
        *count += 1;
        Ok(())
    }

    fn script_name(script: &str) -> &'static str {
        match script {
            page::SCROLL_HEIGHT_SCRIPT => "scrollHeight",
            page::SCROLL_POSITION_SCRIPT => "scrollPosition",
            page::HIDE_SCROLLBARS_SCRIPT => "hideScrollbars",
            page::MUTATE_ELEMENTS_SCRIPT => "mutateElements",
            page::INJECT_CALIBRATION_OVERLAY_SCRIPT => "injectCalibrationOverlay",
            page::READ_CALIBRATION_CLICK_SCRIPT => "readCalibrationClick",
            page::REMOVE_CALIBRATION_OVERLAY_SCRIPT => "removeCalibrationOverlay",
            _ => "unknown",
        }
    }

    fn run_script(&self, name: &str, args: &[Value]) -> Value {
        let mut state = self.state.lock();
        state.script_log.push(name.to_string());

        match name {
            "scrollHeight" => {
                let value = state
                    .scroll_heights
                    .get(state.height_reads)
                    .or_else(|| state.scroll_heights.last())
                    .copied()
                    .flatten();
                state.height_reads += 1;
                value.map_or(Value::Null, Value::from)
            }
            "scrollPosition" => json!({"x": 0.0, "y": state.scroll_y}),
            "hideScrollbars" => {
                let hide = args.first().and_then(Value::as_bool).unwrap_or(false);
                state.scrollbars_hidden = hide;
                state.events.push(format!("hideScrollbars:{hide}"));
                Value::Bool(true)
            }
            "mutateElements" => {
                let mutation = args.first().and_then(Value::as_str).unwrap_or("hide");
                let apply = args.get(1).and_then(Value::as_bool).unwrap_or(false);
                let ids: Vec<String> = args
                    .iter()
                    .skip(2)
                    .filter_map(|arg| arg.get(page::W3C_ELEMENT_KEY).and_then(Value::as_str))
                    .map(str::to_string)
                    .collect();

                let list = if mutation == "remove" {
                    &mut state.removed
                } else {
                    &mut state.hidden
                };
                for id in &ids {
                    list.retain(|existing| existing != id);
                    if apply {
                        list.push(id.clone());
                    }
                }
                state
                    .events
                    .push(format!("{mutation}:{apply}:{}", ids.join(",")));
                Value::from(ids.len() as u64)
            }
            "injectCalibrationOverlay" => {
                state.overlay = true;
                state.click = None;
                Value::Bool(true)
            }
            "readCalibrationClick" => match (state.overlay, state.click, self.webview) {
                (true, Some((x, y)), Some(viewport)) => json!({
                    "x": x,
                    "y": y,
                    "width": viewport.width,
                    "height": viewport.height,
                }),
                _ => Value::Null,
            },
            "removeCalibrationOverlay" => {
                state.overlay = false;
                Value::Bool(true)
            }
            _ => Value::Null,
        }
    }

    /// Renders the visible part of the page as it looks right now
    fn render(&self, scroll_y: f64) -> ImageBuffer {
        let dpr = self.dpr;
        match self.native {
            None => {
                let width = (self.inner_width * dpr).round() as u32;
                let height = self
                    .image_height
                    .unwrap_or_else(|| (self.inner_height * dpr).round() as u32);
                ImageBuffer::from_fn(width, height, |_, y| {
                    content_pixel(scroll_y + f64::from(y) / dpr)
                })
            }
            Some(NativeScreen { screen, viewport }) => {
                let (screen_width, screen_height) = if self.orientation.is_landscape() {
                    (screen.width.max(screen.height), screen.width.min(screen.height))
                } else {
                    (screen.width, screen.height)
                };
                let image = ImageBuffer::from_fn(
                    (screen_width * dpr).round() as u32,
                    (screen_height * dpr).round() as u32,
                    |x, y| {
                        let (css_x, css_y) = (f64::from(x) / dpr, f64::from(y) / dpr);
                        let inside = css_x >= viewport.x
                            && css_x < viewport.right()
                            && css_y >= viewport.y
                            && css_y < viewport.bottom();
                        if inside {
                            content_pixel(scroll_y + css_y - viewport.y)
                        } else {
                            CHROME_PIXEL
                        }
                    },
                );
                if self.rotate_shots && self.orientation.is_landscape() {
                    ImageBuffer::new(image.inner().rotate90())
                } else {
                    image
                }
            }
        }
    }

    fn encode(image: &ImageBuffer) -> CaptureResult<Screenshot> {
        encode_png_with_compression(image, CompressionType::Fast)
            .map(|bytes| Screenshot::from_bytes(&bytes))
    }
}

fn content_pixel(document_y: f64) -> Rgba<u8> {
    let row = document_y.max(0.0).floor() as u32;
    Rgba([(row % 256) as u8, ((row / 256) % 256) as u8, CONTENT_MARKER, 255])
}

#[async_trait]
impl Driver for MockDriver {
    async fn scroll_to(&self, y: f64) -> CaptureResult<()> {
        self.apply_delay().await;
        self.check_failure("scrollTo")?;

        let visible_height = self
            .native
            .map_or(self.inner_height, |native| native.viewport.height);
        let mut state = self.state.lock();
        let max_scroll = state
            .current_height()
            .map_or(0.0, |height| (height - visible_height).max(0.0));
        state.scroll_y = y.clamp(0.0, max_scroll);
        state.scroll_log.push(y);
        state.events.push(format!("scrollTo:{y}"));
        Ok(())
    }

    async fn execute_script(&self, script: &str, args: Vec<Value>) -> CaptureResult<Value> {
        self.apply_delay().await;
        self.check_failure("executeScript")?;
        let name = Self::script_name(script);
        self.check_failure(name)?;
        Ok(self.run_script(name, &args))
    }

    async fn take_screenshot(&self) -> CaptureResult<Screenshot> {
        self.apply_delay().await;
        self.check_failure("takeScreenshot")?;

        let scroll_y = {
            let mut state = self.state.lock();
            state.events.push("takeScreenshot".to_string());
            state.scroll_y
        };
        Self::encode(&self.render(scroll_y))
    }

    async fn take_element_screenshot(&self, element_id: &str) -> CaptureResult<Screenshot> {
        self.apply_delay().await;
        self.check_failure("takeElementScreenshot")?;

        let rect = self.elements.get(element_id).ok_or_else(|| {
            CaptureError::driver("takeElementScreenshot", format!("no such element '{element_id}'"))
        })?;
        let dpr = self.dpr;
        let image = ImageBuffer::from_fn(
            (rect.width * dpr).round().max(1.0) as u32,
            (rect.height * dpr).round().max(1.0) as u32,
            |_, y| content_pixel(rect.y + f64::from(y) / dpr),
        );
        Self::encode(&image)
    }

    async fn element_rect(&self, element_id: &str) -> CaptureResult<Rectangle> {
        self.apply_delay().await;
        self.check_failure("elementRect")?;

        self.elements
            .get(element_id)
            .copied()
            .ok_or_else(|| CaptureError::driver("elementRect", format!("no such element '{element_id}'")))
    }

    async fn orientation(&self) -> CaptureResult<Orientation> {
        self.apply_delay().await;
        self.check_failure("orientation")?;
        Ok(self.orientation)
    }

    async fn window_size(&self) -> CaptureResult<WindowSize> {
        self.apply_delay().await;
        self.check_failure("windowSize")?;

        Ok(self.window_size.unwrap_or_else(|| {
            self.native.map_or(
                WindowSize::new(self.inner_width, self.inner_height),
                |native| native.screen,
            )
        }))
    }

    async fn native_tap(&self, x: f64, y: f64) -> CaptureResult<()> {
        self.apply_delay().await;
        self.check_failure("nativeTap")?;

        let mut state = self.state.lock();
        state.taps.push((x, y));
        if let (true, Some(viewport)) = (state.overlay, self.webview) {
            let inside =
                x >= viewport.x && x < viewport.right() && y >= viewport.y && y < viewport.bottom();
            if inside {
                state.click = Some((x - viewport.x, y - viewport.y));
            }
        }
        Ok(())
    }
}
