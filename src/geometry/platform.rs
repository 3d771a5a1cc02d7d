//! Platform-specific positioning
//!
//! Screenshots differ per platform: desktop and ChromeDriver captures contain
//! only the viewport, while iOS and Android native screenshots contain the
//! whole device screen including status bar, address bar and toolbar. A
//! [`PlatformPositionResolver`] is selected once per capture from the
//! [`PlatformFlags`] and knows how to place CSS boxes onto the capture.
//!
//! All positions returned here are CSS pixels; scaling happens in
//! [`super::rectangles`].

use crate::{
    model::{DeviceRectangles, ElementBox, Rectangle},
    options::{CaptureOptions, PlatformFlags},
};

/// What a single screenshot looks like, needed to place boxes onto it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionContext {
    pub inner_width:  f64,
    pub inner_height: f64,
    /// Raw capture width in physical pixels
    pub image_width:  f64,
    /// Raw capture height in physical pixels
    pub image_height: f64,
    pub dpr:          f64,
    pub is_landscape: bool,
}

impl PositionContext {
    /// Builds the context for a capture of `image_width` x `image_height`
    /// physical pixels
    pub fn new(opts: &CaptureOptions, image_width: u32, image_height: u32) -> Self {
        Self {
            inner_width:  opts.inner_width,
            inner_height: opts.inner_height,
            image_width:  f64::from(image_width),
            image_height: f64::from(image_height),
            dpr:          opts.effective_dpr(),
            is_landscape: opts.platform.is_landscape,
        }
    }

    /// The device is in landscape but the driver returned a portrait-shaped
    /// image
    pub fn is_rotated(&self) -> bool {
        self.is_landscape && self.image_height > self.image_width
    }

    /// Captured size in CSS pixels, corrected for rotation
    pub fn captured_css_size(&self) -> (f64, f64) {
        let (width, height) = (self.image_width / self.dpr, self.image_height / self.dpr);
        if self.is_rotated() {
            (height, width)
        } else {
            (width, height)
        }
    }
}

/// Places element and screen boxes onto a capture for one platform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlatformPositionResolver {
    /// Viewport screenshots from a desktop browser
    Desktop,
    /// Android device screenshots, chrome included
    AndroidNative {
        /// Web view area inside the device screenshot, CSS pixels
        viewport: Rectangle,
    },
    /// Android screenshots taken through ChromeDriver, viewport only
    AndroidChromeDriver,
    /// iOS device screenshots, chrome included
    IosWebview {
        /// Web view area inside the device screenshot, CSS pixels
        viewport: Rectangle,
    },
}

impl PlatformPositionResolver {
    /// Selects the resolver for a capture
    ///
    /// # Examples
    ///
    /// ```
    /// use visreg_capture::{
    ///     geometry::platform::PlatformPositionResolver,
    ///     model::DeviceRectangles,
    ///     options::PlatformFlags,
    /// };
    ///
    /// let resolver = PlatformPositionResolver::select(
    ///     &PlatformFlags::android_chrome_driver(),
    ///     &DeviceRectangles::default(),
    /// );
    /// assert_eq!(resolver, PlatformPositionResolver::AndroidChromeDriver);
    /// ```
    pub fn select(platform: &PlatformFlags, device: &DeviceRectangles) -> Self {
        if platform.is_ios {
            PlatformPositionResolver::IosWebview {
                viewport: device.viewport,
            }
        } else if platform.is_android && platform.is_android_native_web_screenshot {
            PlatformPositionResolver::AndroidNative {
                viewport: device.viewport,
            }
        } else if platform.is_android {
            PlatformPositionResolver::AndroidChromeDriver
        } else {
            PlatformPositionResolver::Desktop
        }
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            PlatformPositionResolver::Desktop => "desktop",
            PlatformPositionResolver::AndroidNative { .. } => "android-native",
            PlatformPositionResolver::AndroidChromeDriver => "android-chromedriver",
            PlatformPositionResolver::IosWebview { .. } => "ios-webview",
        }
    }

    /// Returns the web view offset inside device screenshots
    pub fn viewport(&self) -> Option<Rectangle> {
        match self {
            PlatformPositionResolver::AndroidNative { viewport }
            | PlatformPositionResolver::IosWebview { viewport } => Some(*viewport),
            _ => None,
        }
    }

    /// Places an element's box onto the capture (CSS pixels)
    pub fn resolve_element_position(&self, element: &ElementBox, ctx: &PositionContext) -> Rectangle {
        match self {
            PlatformPositionResolver::Desktop => {
                // A capture taller than the viewport is a full-page screenshot,
                // so the element sits at its document position
                let (_, captured_height) = ctx.captured_css_size();
                if captured_height > ctx.inner_height {
                    element.document_rect()
                } else {
                    element.rect
                }
            }
            PlatformPositionResolver::AndroidChromeDriver => element.rect,
            PlatformPositionResolver::AndroidNative { viewport }
            | PlatformPositionResolver::IosWebview { viewport } => Rectangle::new(
                element.rect.x + viewport.x,
                element.rect.y + viewport.y,
                element.rect.width,
                element.rect.height,
            ),
        }
    }

    /// Returns the area of the capture that shows the screen (CSS pixels)
    pub fn resolve_screen_position(&self, ctx: &PositionContext) -> Rectangle {
        let (width, height) = ctx.captured_css_size();
        match self {
            PlatformPositionResolver::Desktop => {
                Rectangle::from_size(ctx.inner_width.min(width), ctx.inner_height.min(height))
            }
            _ => Rectangle::from_size(width, height),
        }
    }
}
