//! Full-page capture
//!
//! A full-page screenshot is built from viewport-sized segments:
//!
//! ```text
//! Start -> Scroll(i) -> Settle -> Capture(i) -> Evaluate -> Scroll(i+1) | Finalize
//! ```
//!
//! The document scroll height is re-read after every capture because lazy
//! loading can grow the page while it is being captured. The last segment
//! is shortened to what is left of the page and its crop start moves down by
//! the same amount, so no overscroll is stitched in.
//!
//! Page mutations made for the capture (hidden scrollbars, elements hidden
//! after the first scroll, the scroll position) are reverted on every exit
//! path. Failing to revert is logged and never fails the capture.
//!
//! A page that is still growing after [`CaptureOptions::max_full_page_segments`]
//! captures fails with [`CaptureError::IncompleteCapture`].
//!
//! Device screenshots need the orientation to detect rotated captures. The
//! platform flags win when they say landscape; otherwise the session is asked.
//! Desktop and ChromeDriver captures never query it.

use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{Driver, ImageBuffer, page, page::ElementMutation};
use crate::{
    error::{CaptureError, CaptureResult},
    geometry::{
        dpr::{ScaleByDpr, validate_dpr},
        platform::PlatformPositionResolver,
    },
    model::{FullPageScreenshotData, Rectangle, Screenshot, ViewportSegment},
    options::CaptureOptions,
};

/// Captured heights within this distance count as equal
const HEIGHT_TOLERANCE: f64 = 1e-6;

/// How the page is stepped through and where each capture is cropped
#[derive(Debug, Clone, Copy, PartialEq)]
enum ScrollPlan {
    /// Viewport screenshots; stops early when a capture is not viewport-sized
    Desktop { inner_height: f64 },
    /// Viewport screenshots from ChromeDriver
    ChromeDriver { inner_height: f64 },
    /// Device screenshots with the web view at `viewport` (CSS pixels)
    Native {
        viewport:     Rectangle,
        address_bar:  f64,
        tool_bar:     f64,
        is_landscape: bool,
    },
}

impl ScrollPlan {
    fn new(
        resolver: &PlatformPositionResolver,
        opts: &CaptureOptions,
        is_landscape: bool,
    ) -> CaptureResult<Self> {
        let plan = match resolver {
            PlatformPositionResolver::Desktop => ScrollPlan::Desktop {
                inner_height: opts.inner_height,
            },
            PlatformPositionResolver::AndroidChromeDriver => ScrollPlan::ChromeDriver {
                inner_height: opts.inner_height,
            },
            PlatformPositionResolver::AndroidNative { viewport }
            | PlatformPositionResolver::IosWebview { viewport } => ScrollPlan::Native {
                viewport:     *viewport,
                address_bar:  opts.address_bar_shadow_padding,
                tool_bar:     opts.tool_bar_shadow_padding,
                is_landscape,
            },
        };

        let step = plan.step();
        if !step.is_finite() || step <= 0.0 {
            return Err(CaptureError::EmptyRectangle {
                target: "viewport".to_string(),
                width:  opts.inner_width,
                height: step,
            });
        }
        Ok(plan)
    }

    /// Distance scrolled between two captures (CSS pixels)
    fn step(&self) -> f64 {
        match *self {
            ScrollPlan::Desktop { inner_height } | ScrollPlan::ChromeDriver { inner_height } => {
                inner_height
            }
            ScrollPlan::Native {
                viewport,
                address_bar,
                tool_bar,
                ..
            } => viewport.height - address_bar - tool_bar,
        }
    }
}

/// One capture as measured by the loop (CSS pixels)
#[derive(Debug, Clone, Copy)]
struct Measurement {
    index:         usize,
    scroll_y:      f64,
    step:          f64,
    css_width:     f64,
    css_height:    f64,
    is_rotated:    bool,
    scroll_height: Option<f64>,
}

/// What the loop does with a capture
#[derive(Debug)]
struct Evaluation {
    /// `None` when the last capture adds nothing to the page
    segment:     Option<ViewportSegment>,
    is_last:     bool,
    page_width:  f64,
    page_height: f64,
}

impl ScrollPlan {
    fn evaluate(&self, m: &Measurement, screenshot: Screenshot) -> CaptureResult<Evaluation> {
        match *self {
            ScrollPlan::Desktop { .. } | ScrollPlan::ChromeDriver { .. } => {
                let is_desktop = matches!(self, ScrollPlan::Desktop { .. });
                // ChromeDriver captures are trusted to be viewport-sized
                let visible = if is_desktop { m.css_height } else { m.step };
                let full_viewport = !is_desktop || (m.css_height - m.step).abs() < HEIGHT_TOLERANCE;
                let has_more = full_viewport
                    && m.scroll_height
                        .is_some_and(|height| m.scroll_y + m.step < height);

                let (image_height, image_y) = if has_more {
                    (visible, 0.0)
                } else {
                    let remaining = remaining_height(m, m.scroll_height, visible)?;
                    let image_y = if m.index == 0 { 0.0 } else { visible - remaining };
                    (remaining, image_y)
                };

                Ok(Evaluation {
                    segment:     (image_height > 0.0).then(|| ViewportSegment {
                        screenshot,
                        canvas_width: m.css_width,
                        canvas_y_position: m.scroll_y,
                        image_width: m.css_width,
                        image_height,
                        image_x_position: 0.0,
                        image_y_position: image_y,
                        rotated: false,
                    }),
                    is_last:     !has_more,
                    page_width:  m.css_width,
                    page_height: m.scroll_y + image_height,
                })
            }
            ScrollPlan::Native {
                viewport,
                address_bar,
                tool_bar,
                is_landscape,
            } => {
                // The shadow paddings are never part of the stitched page
                let effective_height = m.scroll_height.map(|height| height - address_bar - tool_bar);
                let has_more = effective_height.is_some_and(|height| m.scroll_y + m.step < height);
                let top = viewport.y + address_bar;

                let (image_height, image_y) = if has_more {
                    (m.step, top)
                } else {
                    let remaining = remaining_height(m, effective_height, m.step)?;
                    let offset = if m.index == 0 { 0.0 } else { m.step - remaining };
                    (remaining, top + offset)
                };

                Ok(Evaluation {
                    segment:     (image_height > 0.0).then(|| ViewportSegment {
                        screenshot,
                        canvas_width: viewport.width,
                        canvas_y_position: m.scroll_y,
                        image_width: viewport.width,
                        image_height,
                        image_x_position: viewport.x,
                        image_y_position: image_y,
                        rotated: is_landscape && m.is_rotated,
                    }),
                    is_last:     !has_more,
                    page_width:  viewport.width,
                    page_height: m.scroll_y + image_height,
                })
            }
        }
    }
}

/// Height of the last segment: what is left of the page below `scroll_y`
fn remaining_height(m: &Measurement, page_height: Option<f64>, visible: f64) -> CaptureResult<f64> {
    let page_height = page_height.ok_or_else(|| CaptureError::IncompleteCapture {
        reason: format!("scroll height unknown after segment {}", m.index),
    })?;
    Ok((page_height - m.scroll_y).clamp(0.0, visible))
}

/// Captures the whole page as a list of segments
///
/// The result is scaled once by the effective DPR. Fails without a partial
/// result when the scroll height or a screenshot size cannot be determined.
///
/// # Examples
///
/// ```
/// use visreg_capture::{
///     capture::{MockDriver, capture_full_page},
///     options::CaptureOptions,
/// };
///
/// #[tokio::main]
/// async fn main() {
///     let driver = MockDriver::desktop(400.0, 1000.0)
///         .with_scroll_heights([Some(2400.0), Some(3000.0)]);
///     let opts = CaptureOptions::builder()
///         .inner_size(400.0, 1000.0)
///         .full_page_scroll_timeout_ms(0)
///         .build();
///
///     let data = capture_full_page(&driver, &opts).await.unwrap();
///     assert_eq!(data.segments.len(), 3);
///     assert_eq!(data.full_page_height, 3000.0);
/// }
/// ```
pub async fn capture_full_page(
    driver: &dyn Driver,
    opts: &CaptureOptions,
) -> CaptureResult<FullPageScreenshotData> {
    let dpr = validate_dpr(opts.effective_dpr())?;
    let resolver = PlatformPositionResolver::select(&opts.platform, &opts.device_rectangles);
    let is_landscape = device_is_landscape(driver, opts, &resolver).await;
    let plan = ScrollPlan::new(&resolver, opts, is_landscape)?;

    info!(
        platform = resolver.name(),
        dpr,
        step = plan.step(),
        "Starting full-page capture"
    );

    let origin = match page::scroll_position(driver).await {
        Ok((_, y)) => Some(y),
        Err(e) => {
            warn!("Could not read scroll position, it will not be restored: {}", e);
            None
        }
    };

    let captured = capture_segments(driver, opts, plan, dpr).await;

    if !opts.hide_after_first_scroll.is_empty() {
        if let Err(e) = page::mutate_elements(
            driver,
            &opts.hide_after_first_scroll,
            ElementMutation::Hide,
            false,
        )
        .await
        {
            warn!("Failed to restore elements hidden after the first scroll: {}", e);
        }
    }

    if let Some(y) = origin {
        if let Err(e) = driver.scroll_to(y).await {
            warn!("Failed to restore scroll position {}: {}", y, e);
        }
    }

    let data = captured?.scale_by_dpr(dpr);
    info!(
        segments = data.segments.len(),
        width = data.full_page_width,
        height = data.full_page_height,
        "Full-page capture complete"
    );
    Ok(data)
}

/// The scroll/settle/capture/evaluate loop, in CSS pixels
async fn capture_segments(
    driver: &dyn Driver,
    opts: &CaptureOptions,
    plan: ScrollPlan,
    dpr: f64,
) -> CaptureResult<FullPageScreenshotData> {
    let settle = opts.full_page_scroll_timeout();
    let mut step = plan.step();
    let mut segments = Vec::new();
    let mut index = 0usize;

    loop {
        if index >= opts.max_full_page_segments {
            warn!(
                segments = index,
                "Page still growing at the segment limit, giving up"
            );
            return Err(CaptureError::IncompleteCapture {
                reason: format!("page still growing after {index} segments"),
            });
        }

        let scroll_y = step * index as f64;
        driver.scroll_to(scroll_y).await?;
        sleep(settle).await;

        if index == 1 && !opts.hide_after_first_scroll.is_empty() {
            if let Err(e) = page::mutate_elements(
                driver,
                &opts.hide_after_first_scroll,
                ElementMutation::Hide,
                true,
            )
            .await
            {
                warn!("Failed to hide elements after the first scroll: {}", e);
            }
        }

        let screenshot = take_clean_screenshot(driver, opts.hide_scrollbars).await?;
        let (image_width, image_height) = ImageBuffer::screenshot_dimensions(&screenshot)?;
        if image_width == 0 || image_height == 0 {
            return Err(CaptureError::IncompleteCapture {
                reason: format!("screenshot {index} has no size"),
            });
        }
        let css_width = f64::from(image_width) / dpr;
        let css_height = f64::from(image_height) / dpr;

        if index == 0 {
            if let ScrollPlan::Desktop { inner_height } = plan {
                // Fractional DPRs produce captures a fraction of a pixel off
                // the inner height; step by what was actually captured
                if (css_height - inner_height).abs() >= HEIGHT_TOLERANCE
                    && css_height.round() == inner_height.round()
                {
                    debug!(inner_height, css_height, "Adopting fractional viewport height");
                    step = css_height;
                }
            }
        }

        let scroll_height = page::scroll_height(driver).await?;
        let measurement = Measurement {
            index,
            scroll_y,
            step,
            css_width,
            css_height,
            is_rotated: image_height > image_width,
            scroll_height,
        };
        let evaluation = plan.evaluate(&measurement, screenshot)?;

        debug!(
            index,
            scroll_y,
            ?scroll_height,
            is_last = evaluation.is_last,
            "Captured segment"
        );

        if let Some(segment) = evaluation.segment {
            segments.push(segment);
        }

        if evaluation.is_last {
            return Ok(FullPageScreenshotData {
                full_page_width: evaluation.page_width,
                full_page_height: evaluation.page_height,
                segments,
            });
        }
        index += 1;
    }
}

/// Whether device screenshots are landscape
///
/// Only device screenshots can come back rotated, so only they ask the
/// session. A failed lookup keeps the platform flag.
async fn device_is_landscape(
    driver: &dyn Driver,
    opts: &CaptureOptions,
    resolver: &PlatformPositionResolver,
) -> bool {
    if opts.platform.is_landscape || resolver.viewport().is_none() {
        return opts.platform.is_landscape;
    }

    match driver.orientation().await {
        Ok(orientation) => {
            if orientation.is_landscape() {
                debug!("Session reports landscape, platform flags do not");
            }
            orientation.is_landscape()
        }
        Err(e) => {
            warn!("Could not read device orientation, assuming portrait: {}", e);
            false
        }
    }
}

/// Takes a screenshot with scrollbars hidden, restoring them afterwards
async fn take_clean_screenshot(driver: &dyn Driver, hide_scrollbars: bool) -> CaptureResult<Screenshot> {
    if !hide_scrollbars {
        return driver.take_screenshot().await;
    }

    if let Err(e) = page::set_scrollbars_hidden(driver, true).await {
        warn!("Failed to hide scrollbars: {}", e);
    }
    let screenshot = driver.take_screenshot().await;
    if let Err(e) = page::set_scrollbars_hidden(driver, false).await {
        warn!("Failed to restore scrollbars: {}", e);
    }
    screenshot
}
