//! Driver abstraction and capture implementations
//!
//! This module provides the seam between the capture engine and a remote
//! automation session, plus everything that talks to it:
//!
//! - [`Driver`]: Trait for the remote browser/app session (WebDriver,
//!   Appium, ...)
//! - [`ImageBuffer`]: A wrapper around `image::DynamicImage` used for
//!   measuring, cropping and composing screenshots
//! - [`full_page`]: The scroll/settle/capture/evaluate loop
//! - [`compositor`]: Turns captured segments into one image
//! - [`page`]: Page scripts (scroll height, scrollbars, hiding elements)
//! - [`mock`]: A scripted in-memory driver for tests

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    error::CaptureResult,
    model::{Orientation, Rectangle, Screenshot, WindowSize},
};

pub mod compositor;
pub mod constants;
pub mod full_page;
pub mod image_buffer;
pub mod mock;
pub mod page;

pub use compositor::{ImageCompositor, RasterCompositor};
pub use full_page::capture_full_page;
pub use image_buffer::ImageBuffer;
pub use mock::MockDriver;

/// A remote automation session
///
/// `Driver` is the only way the capture engine touches the outside world.
/// Every call is one round-trip to the session and is awaited before the
/// next one starts; the engine never issues concurrent calls against the same
/// driver. Implementations must still be `Send + Sync` so independent
/// sessions can capture on different tasks.
///
/// # Examples
///
/// ## Implementing a driver
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use visreg_capture::{
///     capture::Driver,
///     error::{CaptureError, CaptureResult},
///     model::*,
/// };
///
/// struct WebDriverSession {
///     client: MyWebDriverClient,
/// }
///
/// #[async_trait]
/// impl Driver for WebDriverSession {
///     async fn scroll_to(&self, y: f64) -> CaptureResult<()> {
///         self.execute_script("window.scrollTo(0, arguments[0]);", vec![y.into()])
///             .await
///             .map(|_| ())
///     }
///
///     async fn take_screenshot(&self) -> CaptureResult<Screenshot> {
///         let base64 = self.client.screenshot().await.map_err(|e| {
///             CaptureError::driver("takeScreenshot", e)
///         })?;
///         Ok(Screenshot::from_base64(base64))
///     }
///
///     // ...
/// }
/// ```
#[async_trait]
pub trait Driver: Send + Sync {
    /// Scrolls the document to vertical position `y` (CSS pixels)
    async fn scroll_to(&self, y: f64) -> CaptureResult<()>;

    /// Runs a script in the page and returns its JSON result
    ///
    /// `args` are passed as `arguments[0..]`. Element arguments use the W3C
    /// element reference shape (see [`page::element_reference`]).
    async fn execute_script(&self, script: &str, args: Vec<Value>) -> CaptureResult<Value>;

    /// Takes a screenshot of the current viewport (or device screen)
    async fn take_screenshot(&self) -> CaptureResult<Screenshot>;

    /// Takes a screenshot of a single element
    ///
    /// Not used by the full-page loop. It is there for callers that capture a
    /// single element directly rather than cropping a viewport capture.
    async fn take_element_screenshot(&self, element_id: &str) -> CaptureResult<Screenshot>;

    /// Returns the element's rectangle relative to the document origin
    async fn element_rect(&self, element_id: &str) -> CaptureResult<Rectangle>;

    /// Returns the device orientation
    ///
    /// Full-page device captures ask for it unless the platform flags already
    /// say landscape.
    async fn orientation(&self) -> CaptureResult<Orientation>;

    /// Returns the window (or device screen) size in CSS pixels
    async fn window_size(&self) -> CaptureResult<WindowSize>;

    /// Taps the screen at `(x, y)` using the platform's native input
    ///
    /// Only needed for web view calibration on mobile devices.
    async fn native_tap(&self, x: f64, y: f64) -> CaptureResult<()>;
}
