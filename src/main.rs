//! stitch-demo: Full-page capture against a simulated browser
//!
//! Scrolls a mock desktop page that grows while it is captured, stitches the
//! segments into one PNG and logs the ignore regions a diff engine would get.
//!
//! Usage: `stitch-demo [OUTPUT_PATH]` (default `full-page.png`)

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};
use visreg_capture::{
    capture::{ImageCompositor, MockDriver, RasterCompositor, capture_full_page},
    geometry::{
        IgnoreRequest,
        ignore::{parse_ignore_entries, resolve_ignore_entries},
        resolve_ignore_regions,
    },
    model::{Rectangle, SessionId},
    options::{CaptureOptions, InstanceOptions, MethodOptions, PlatformFlags},
    session::{AutomationContext, SessionRegistry, SessionState},
    util::encode::write_png,
};

const INNER_WIDTH: f64 = 640.0;
const INNER_HEIGHT: f64 = 480.0;
const DEVICE_PIXEL_RATIO: f64 = 2.0;

#[tokio::main]
async fn main() -> Result<()> {
    // Respects RUST_LOG, defaults to info for this crate
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("visreg_capture=info,stitch_demo=info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .init();

    let output = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("full-page.png"));

    let registry = Arc::new(SessionRegistry::new());
    let session = SessionId::new("demo");
    registry.register(
        session.clone(),
        SessionState::new(DEVICE_PIXEL_RATIO, AutomationContext::Webview),
    );
    let state = registry
        .get(&session)
        .context("demo session vanished from the registry")?;

    // The page lazy-loads one more screen after the first scroll
    let driver = MockDriver::desktop(INNER_WIDTH, INNER_HEIGHT)
        .with_device_pixel_ratio(DEVICE_PIXEL_RATIO)
        .with_scroll_heights([Some(1200.0), Some(1680.0)])
        .with_element("banner", Rectangle::new(0.0, 0.0, INNER_WIDTH, 60.0));
    info!("Driver initialized: MockDriver {}x{}", INNER_WIDTH, INNER_HEIGHT);

    let instance = InstanceOptions::default();
    let method = MethodOptions {
        full_page_scroll_timeout_ms: Some(50),
        ..Default::default()
    };
    let opts = CaptureOptions::builder()
        .method_options(&method, &instance)
        .device_pixel_ratio(DEVICE_PIXEL_RATIO)
        .initial_device_pixel_ratio(registry.initial_dpr(&session)?)
        .inner_size(INNER_WIDTH, INNER_HEIGHT)
        .platform(state.platform_flags(PlatformFlags::desktop()))
        .build();

    let data = capture_full_page(&driver, &opts)
        .await
        .context("full-page capture failed")?;
    info!(
        "Captured {} segments, page is {}x{} px",
        data.segments.len(),
        data.full_page_width,
        data.full_page_height
    );

    let image = RasterCompositor::new().compose(&data)?;
    write_png(&image, &output).with_context(|| format!("writing {}", output.display()))?;
    info!("Wrote {}", output.display());

    let entries = parse_ignore_entries(&[
        json!({ "element-6066-11e4-a52e-4f735466cecf": "banner" }),
        json!({ "x": 20, "y": 400, "width": 200, "height": 40 }),
    ])?;
    let request = IgnoreRequest {
        ignore_regions: resolve_ignore_entries(&driver, &entries, &opts, image.dimensions(), false).await?,
        ..Default::default()
    };
    let regions = resolve_ignore_regions(&request, &opts);
    info!("Ignore regions: {}", serde_json::to_string(&regions)?);

    Ok(())
}
