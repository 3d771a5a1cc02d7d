//! Centralized defaults for full-page capture.
//!
//! # Runtime Configuration
//!
//! Values can be overridden at runtime via environment variables:
//!
//! | Environment Variable | Default | Description |
//! |---------------------|---------|-------------|
//! | `VISREG_FULL_PAGE_SCROLL_TIMEOUT_MS` | 1500 | Settle delay after each scroll |
//! | `VISREG_ADDRESS_BAR_SHADOW_PADDING` | 6 | Pixels cropped below the address bar |
//! | `VISREG_TOOL_BAR_SHADOW_PADDING` | 6 | Pixels cropped above the toolbar |
//! | `VISREG_CALIBRATION_SETTLE_MS` | 150 | Wait after the calibration tap |
//! | `VISREG_MAX_FULL_PAGE_SEGMENTS` | 200 | Segments captured before giving up |
//!
//! # Settle Delay
//!
//! The settle delay is the only fixed wait in the capture loop. It gives
//! lazy-loaded content a chance to render and to grow the document before the
//! scroll height is re-read. Pages without lazy loading can use 0.

/// Default settle delay after each scroll of a full-page capture.
pub const FULL_PAGE_SCROLL_TIMEOUT_MS: u64 = 1500;

/// Default shadow below the mobile address bar, in CSS pixels.
///
/// Mobile browsers draw a soft shadow over the first pixels of the web view.
/// Those pixels differ between runs, so they are cropped from every segment.
pub const ADDRESS_BAR_SHADOW_PADDING: f64 = 6.0;

/// Default shadow above the mobile toolbar, in CSS pixels.
pub const TOOL_BAR_SHADOW_PADDING: f64 = 6.0;

/// Wait between the native calibration tap and reading the click back.
pub const CALIBRATION_SETTLE_MS: u64 = 150;

/// Upper bound on segments per full-page capture.
///
/// Infinite scroll pages grow by at least one viewport per settle delay and
/// would otherwise never reach their end.
pub const MAX_FULL_PAGE_SEGMENTS: usize = 200;

// =============================================================================
// Environment Variable Overrides
// =============================================================================

fn get_u64_from_env(env_var: &str, default: u64) -> u64 {
    std::env::var(env_var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn get_padding_from_env(env_var: &str, default: f64) -> f64 {
    std::env::var(env_var)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value >= 0.0)
        .unwrap_or(default)
}

/// Get the full-page settle delay, checking environment variable override.
///
/// Override with: `VISREG_FULL_PAGE_SCROLL_TIMEOUT_MS`
///
/// # Example
///
/// ```bash
/// # Pages with slow lazy loading
/// export VISREG_FULL_PAGE_SCROLL_TIMEOUT_MS=3000
/// ```
pub fn full_page_scroll_timeout_ms() -> u64 {
    get_u64_from_env("VISREG_FULL_PAGE_SCROLL_TIMEOUT_MS", FULL_PAGE_SCROLL_TIMEOUT_MS)
}

/// Get the address bar shadow padding.
///
/// Override with: `VISREG_ADDRESS_BAR_SHADOW_PADDING`
pub fn address_bar_shadow_padding() -> f64 {
    get_padding_from_env("VISREG_ADDRESS_BAR_SHADOW_PADDING", ADDRESS_BAR_SHADOW_PADDING)
}

/// Get the toolbar shadow padding.
///
/// Override with: `VISREG_TOOL_BAR_SHADOW_PADDING`
pub fn tool_bar_shadow_padding() -> f64 {
    get_padding_from_env("VISREG_TOOL_BAR_SHADOW_PADDING", TOOL_BAR_SHADOW_PADDING)
}

/// Get the calibration settle delay.
///
/// Override with: `VISREG_CALIBRATION_SETTLE_MS`
pub fn calibration_settle_ms() -> u64 {
    get_u64_from_env("VISREG_CALIBRATION_SETTLE_MS", CALIBRATION_SETTLE_MS)
}

/// Get the segment limit of a full-page capture. Zero is ignored.
///
/// Override with: `VISREG_MAX_FULL_PAGE_SEGMENTS`
pub fn max_full_page_segments() -> usize {
    std::env::var("VISREG_MAX_FULL_PAGE_SEGMENTS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|max: &usize| *max > 0)
        .unwrap_or(MAX_FULL_PAGE_SEGMENTS)
}
