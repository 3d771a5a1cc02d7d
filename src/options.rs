//! Capture configuration
//!
//! Options come from two levels. [`InstanceOptions`] holds the defaults of a
//! capture service instance; [`MethodOptions`] holds what a single call asks
//! for. Method-level values override instance-level values field by field
//! (see [`MethodOptions::merge_over`]). The merged result, together with what
//! the session reports about itself (DPR, viewport, platform), is folded into
//! a [`CaptureOptions`] through [`CaptureOptionsBuilder`].

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    capture::constants,
    geometry::dpr::effective_dpr,
    model::{DeviceRectangles, ElementHandle},
};

/// What kind of session and screenshot a capture runs against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlatformFlags {
    pub is_android: bool,
    /// Android screenshot taken by the native screenshot API (includes chrome)
    pub is_android_native_web_screenshot: bool,
    /// Android screenshot taken through ChromeDriver (viewport only)
    pub is_android_chrome_driver_screenshot: bool,
    pub is_ios: bool,
    pub is_landscape: bool,
    /// Device emulation not started through emulation capabilities
    pub is_emulated: bool,
    /// Automation runs against the native UI tree rather than a web view
    pub is_native_context: bool,
}

impl PlatformFlags {
    pub fn desktop() -> Self {
        Self::default()
    }

    pub fn ios() -> Self {
        Self {
            is_ios: true,
            ..Self::default()
        }
    }

    pub fn android_native_web_screenshot() -> Self {
        Self {
            is_android: true,
            is_android_native_web_screenshot: true,
            ..Self::default()
        }
    }

    pub fn android_chrome_driver() -> Self {
        Self {
            is_android: true,
            is_android_chrome_driver_screenshot: true,
            ..Self::default()
        }
    }

    pub fn landscape(mut self) -> Self {
        self.is_landscape = true;
        self
    }

    pub fn native_context(mut self) -> Self {
        self.is_native_context = true;
        self
    }

    pub fn is_mobile(&self) -> bool {
        self.is_android || self.is_ios
    }
}

/// Which device chrome regions a caller wants excluded from comparison
///
/// `None` means "not specified"; the iOS home bar of full-page captures is
/// blocked out unless `tool_bar` is explicitly `Some(false)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlockOutOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_bar: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_bar:   Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side_bar:   Option<bool>,
}

impl BlockOutOptions {
    pub fn status_bar(&self) -> bool {
        self.status_bar == Some(true)
    }

    pub fn tool_bar(&self) -> bool {
        self.tool_bar == Some(true)
    }

    pub fn side_bar(&self) -> bool {
        self.side_bar == Some(true)
    }

    pub fn any(&self) -> bool {
        self.status_bar() || self.tool_bar() || self.side_bar()
    }

    pub fn tool_bar_disabled(&self) -> bool {
        self.tool_bar == Some(false)
    }

    /// Field-by-field merge; values set on `self` win
    pub fn merge_over(&self, base: &BlockOutOptions) -> BlockOutOptions {
        BlockOutOptions {
            status_bar: self.status_bar.or(base.status_bar),
            tool_bar:   self.tool_bar.or(base.tool_bar),
            side_bar:   self.side_bar.or(base.side_bar),
        }
    }
}

/// Defaults configured once for a capture service instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstanceOptions {
    pub full_page_scroll_timeout_ms:     u64,
    pub hide_scrollbars:                 bool,
    pub address_bar_shadow_padding:      f64,
    pub tool_bar_shadow_padding:         f64,
    pub enable_legacy_screenshot_method: bool,
    #[serde(default)]
    pub block_out:                       BlockOutOptions,
}

impl Default for InstanceOptions {
    fn default() -> Self {
        Self {
            full_page_scroll_timeout_ms:     constants::full_page_scroll_timeout_ms(),
            hide_scrollbars:                 true,
            address_bar_shadow_padding:      constants::address_bar_shadow_padding(),
            tool_bar_shadow_padding:         constants::tool_bar_shadow_padding(),
            enable_legacy_screenshot_method: false,
            block_out:                       BlockOutOptions::default(),
        }
    }
}

/// Per-call options; every field left `None` falls back to the instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MethodOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_page_scroll_timeout_ms:     Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_scrollbars:                 Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_bar_shadow_padding:      Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_bar_shadow_padding:         Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_legacy_screenshot_method: Option<bool>,
    #[serde(default)]
    pub block_out:                       BlockOutOptions,
    /// Elements shown only in the first segment of a full-page capture
    #[serde(default)]
    pub hide_after_first_scroll:         Vec<ElementHandle>,
}

impl MethodOptions {
    /// Resolves the effective instance-level settings for this call
    pub fn merge_over(&self, instance: &InstanceOptions) -> InstanceOptions {
        InstanceOptions {
            full_page_scroll_timeout_ms:     self
                .full_page_scroll_timeout_ms
                .unwrap_or(instance.full_page_scroll_timeout_ms),
            hide_scrollbars:                 self.hide_scrollbars.unwrap_or(instance.hide_scrollbars),
            address_bar_shadow_padding:      self
                .address_bar_shadow_padding
                .unwrap_or(instance.address_bar_shadow_padding),
            tool_bar_shadow_padding:         self
                .tool_bar_shadow_padding
                .unwrap_or(instance.tool_bar_shadow_padding),
            enable_legacy_screenshot_method: self
                .enable_legacy_screenshot_method
                .unwrap_or(instance.enable_legacy_screenshot_method),
            block_out:                       self.block_out.merge_over(&instance.block_out),
        }
    }
}

/// Fully resolved input for one capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOptions {
    /// Live device pixel ratio reported by the session
    pub device_pixel_ratio:              f64,
    /// Device pixel ratio recorded when the session started
    pub initial_device_pixel_ratio:      f64,
    pub enable_legacy_screenshot_method: bool,
    pub inner_width:                     f64,
    pub inner_height:                    f64,
    pub platform:                        PlatformFlags,
    pub device_rectangles:               DeviceRectangles,
    pub address_bar_shadow_padding:      f64,
    pub tool_bar_shadow_padding:         f64,
    pub full_page_scroll_timeout_ms:     u64,
    /// A page still growing after this many segments fails the capture
    #[serde(default = "constants::max_full_page_segments")]
    pub max_full_page_segments:          usize,
    pub hide_scrollbars:                 bool,
    pub hide_after_first_scroll:         Vec<ElementHandle>,
    pub block_out:                       BlockOutOptions,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        CaptureOptionsBuilder::default().build()
    }
}

impl CaptureOptions {
    /// Creates a builder seeded with instance defaults
    ///
    /// # Examples
    ///
    /// ```
    /// use visreg_capture::options::{CaptureOptions, PlatformFlags};
    ///
    /// let opts = CaptureOptions::builder()
    ///     .device_pixel_ratio(2.0)
    ///     .inner_size(390.0, 664.0)
    ///     .platform(PlatformFlags::ios())
    ///     .build();
    ///
    /// assert_eq!(opts.effective_dpr(), 2.0);
    /// ```
    pub fn builder() -> CaptureOptionsBuilder {
        CaptureOptionsBuilder::default()
    }

    /// The DPR to scale this capture's geometry with
    pub fn effective_dpr(&self) -> f64 {
        effective_dpr(
            self.platform.is_emulated,
            self.enable_legacy_screenshot_method,
            self.device_pixel_ratio,
            self.initial_device_pixel_ratio,
        )
    }

    pub fn full_page_scroll_timeout(&self) -> Duration {
        Duration::from_millis(self.full_page_scroll_timeout_ms)
    }
}

/// Builder for [`CaptureOptions`]
#[derive(Debug, Clone)]
pub struct CaptureOptionsBuilder {
    options: CaptureOptions,
}

impl Default for CaptureOptionsBuilder {
    fn default() -> Self {
        let instance = InstanceOptions::default();
        Self {
            options: CaptureOptions {
                device_pixel_ratio:              1.0,
                initial_device_pixel_ratio:      1.0,
                enable_legacy_screenshot_method: instance.enable_legacy_screenshot_method,
                inner_width:                     0.0,
                inner_height:                    0.0,
                platform:                        PlatformFlags::default(),
                device_rectangles:               DeviceRectangles::default(),
                address_bar_shadow_padding:      instance.address_bar_shadow_padding,
                tool_bar_shadow_padding:         instance.tool_bar_shadow_padding,
                full_page_scroll_timeout_ms:     instance.full_page_scroll_timeout_ms,
                max_full_page_segments:          constants::max_full_page_segments(),
                hide_scrollbars:                 instance.hide_scrollbars,
                hide_after_first_scroll:         Vec::new(),
                block_out:                       instance.block_out,
            },
        }
    }
}

impl CaptureOptionsBuilder {
    /// Applies resolved instance/method settings
    pub fn settings(mut self, settings: &InstanceOptions) -> Self {
        self.options.full_page_scroll_timeout_ms = settings.full_page_scroll_timeout_ms;
        self.options.hide_scrollbars = settings.hide_scrollbars;
        self.options.address_bar_shadow_padding = settings.address_bar_shadow_padding;
        self.options.tool_bar_shadow_padding = settings.tool_bar_shadow_padding;
        self.options.enable_legacy_screenshot_method = settings.enable_legacy_screenshot_method;
        self.options.block_out = settings.block_out;
        self
    }

    /// Resolves `method` over `instance` and applies the result, including
    /// the method's hide-after-first-scroll elements
    pub fn method_options(self, method: &MethodOptions, instance: &InstanceOptions) -> Self {
        let merged = method.merge_over(instance);
        self.settings(&merged)
            .hide_after_first_scroll(method.hide_after_first_scroll.clone())
    }

    pub fn device_pixel_ratio(mut self, dpr: f64) -> Self {
        self.options.device_pixel_ratio = dpr;
        self
    }

    pub fn initial_device_pixel_ratio(mut self, dpr: f64) -> Self {
        self.options.initial_device_pixel_ratio = dpr;
        self
    }

    pub fn legacy_screenshot_method(mut self, enabled: bool) -> Self {
        self.options.enable_legacy_screenshot_method = enabled;
        self
    }

    pub fn inner_size(mut self, width: f64, height: f64) -> Self {
        self.options.inner_width = width;
        self.options.inner_height = height;
        self
    }

    pub fn platform(mut self, platform: PlatformFlags) -> Self {
        self.options.platform = platform;
        self
    }

    pub fn device_rectangles(mut self, rectangles: DeviceRectangles) -> Self {
        self.options.device_rectangles = rectangles;
        self
    }

    pub fn shadow_padding(mut self, address_bar: f64, tool_bar: f64) -> Self {
        self.options.address_bar_shadow_padding = address_bar;
        self.options.tool_bar_shadow_padding = tool_bar;
        self
    }

    pub fn full_page_scroll_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.options.full_page_scroll_timeout_ms = timeout_ms;
        self
    }

    pub fn max_full_page_segments(mut self, max: usize) -> Self {
        self.options.max_full_page_segments = max;
        self
    }

    pub fn hide_scrollbars(mut self, hide: bool) -> Self {
        self.options.hide_scrollbars = hide;
        self
    }

    pub fn hide_after_first_scroll(mut self, elements: Vec<ElementHandle>) -> Self {
        self.options.hide_after_first_scroll = elements;
        self
    }

    pub fn block_out(mut self, block_out: BlockOutOptions) -> Self {
        self.options.block_out = block_out;
        self
    }

    pub fn build(self) -> CaptureOptions {
        self.options
    }
}
