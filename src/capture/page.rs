//! Page scripts executed through the driver
//!
//! Every DOM read or mutation the engine performs lives here, as a script
//! constant plus a typed wrapper. Mutations come in pairs (hide/restore) so
//! callers can revert them on every exit path.

use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};

use super::Driver;
use crate::{
    error::{CaptureError, CaptureResult},
    model::ElementHandle,
};

/// W3C WebDriver key identifying an element reference in script arguments
pub const W3C_ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Legacy JSON wire protocol key for element references
pub const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

/// Returns the document scroll height, or null when there is no document
/// element
pub const SCROLL_HEIGHT_SCRIPT: &str = r#"
const root = document.documentElement;
const body = document.body;
if (!root) { return null; }
return Math.max(
  root.scrollHeight, root.offsetHeight, root.clientHeight,
  body ? body.scrollHeight : 0, body ? body.offsetHeight : 0
);
"#;

/// Returns the current scroll offset as `{x, y}`
pub const SCROLL_POSITION_SCRIPT: &str = r#"
return {
  x: window.pageXOffset || document.documentElement.scrollLeft || 0,
  y: window.pageYOffset || document.documentElement.scrollTop || 0
};
"#;

/// `arguments[0]`: true to hide scrollbars, false to restore them
pub const HIDE_SCROLLBARS_SCRIPT: &str = r#"
const hide = arguments[0];
const root = document.documentElement;
if (!root) { return false; }
const id = '__visreg_hide_scrollbars';
const existing = document.getElementById(id);
if (hide && !existing) {
  const style = document.createElement('style');
  style.id = id;
  style.textContent = '*::-webkit-scrollbar { display: none !important; } ' +
    'html, body { scrollbar-width: none !important; -ms-overflow-style: none !important; }';
  (document.head || root).appendChild(style);
} else if (!hide && existing) {
  existing.remove();
}
return true;
"#;

/// `arguments[0]`: mutation ("hide" or "remove"), `arguments[1]`: true to
/// apply or false to revert, `arguments[2..]`: elements
pub const MUTATE_ELEMENTS_SCRIPT: &str = r#"
const [mutation, apply, ...elements] = arguments;
const property = mutation === 'remove' ? 'display' : 'visibility';
const value = mutation === 'remove' ? 'none' : 'hidden';
let count = 0;
for (const element of elements) {
  if (!element || !element.style) { continue; }
  element.style.setProperty(property, apply ? value : '', apply ? 'important' : '');
  count += 1;
}
return count;
"#;

/// Injects a transparent overlay covering the visual viewport that records
/// the position of the next click
pub const INJECT_CALIBRATION_OVERLAY_SCRIPT: &str = r#"
const id = '__visreg_calibration';
if (document.getElementById(id)) { return true; }
const overlay = document.createElement('div');
overlay.id = id;
overlay.style.cssText = 'position:fixed;top:0;left:0;width:100vw;height:100vh;' +
  'z-index:2147483647;background:transparent;';
overlay.dataset.clicked = 'false';
overlay.addEventListener('click', (event) => {
  overlay.dataset.x = String(event.clientX);
  overlay.dataset.y = String(event.clientY);
  overlay.dataset.clicked = 'true';
});
document.body.appendChild(overlay);
return true;
"#;

/// Returns `{x, y, width, height}` of the recorded click and overlay, or
/// null when no click was recorded
pub const READ_CALIBRATION_CLICK_SCRIPT: &str = r#"
const overlay = document.getElementById('__visreg_calibration');
if (!overlay || overlay.dataset.clicked !== 'true') { return null; }
const rect = overlay.getBoundingClientRect();
return {
  x: Number(overlay.dataset.x),
  y: Number(overlay.dataset.y),
  width: rect.width,
  height: rect.height
};
"#;

pub const REMOVE_CALIBRATION_OVERLAY_SCRIPT: &str = r#"
const overlay = document.getElementById('__visreg_calibration');
if (overlay) { overlay.remove(); }
return true;
"#;

/// How an element is taken out of a screenshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementMutation {
    /// `visibility: hidden`, keeps layout
    Hide,
    /// `display: none`, reflows the page
    Remove,
}

impl ElementMutation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementMutation::Hide => "hide",
            ElementMutation::Remove => "remove",
        }
    }
}

/// Click position and overlay size read back after a calibration tap
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CalibrationClick {
    pub x:      f64,
    pub y:      f64,
    pub width:  f64,
    pub height: f64,
}

#[derive(Debug, Deserialize)]
struct ScrollPosition {
    x: f64,
    y: f64,
}

/// Builds a script argument referencing a remote element
pub fn element_reference(element_id: &str) -> Value {
    json!({
        W3C_ELEMENT_KEY: element_id,
        LEGACY_ELEMENT_KEY: element_id,
    })
}

/// Runs a script and deserializes its result
pub async fn execute<T: DeserializeOwned>(
    driver: &dyn Driver,
    name: &str,
    script: &str,
    args: Vec<Value>,
) -> CaptureResult<T> {
    let value = driver.execute_script(script, args).await?;
    serde_json::from_value(value).map_err(|e| CaptureError::ScriptResult {
        script: name.to_string(),
        reason: e.to_string(),
    })
}

/// Reads the document scroll height in CSS pixels
///
/// `None` means the page has no document element to measure.
pub async fn scroll_height(driver: &dyn Driver) -> CaptureResult<Option<f64>> {
    execute(driver, "scrollHeight", SCROLL_HEIGHT_SCRIPT, Vec::new()).await
}

/// Reads the current scroll offset as `(x, y)`
pub async fn scroll_position(driver: &dyn Driver) -> CaptureResult<(f64, f64)> {
    let position: ScrollPosition =
        execute(driver, "scrollPosition", SCROLL_POSITION_SCRIPT, Vec::new()).await?;
    Ok((position.x, position.y))
}

pub async fn set_scrollbars_hidden(driver: &dyn Driver, hidden: bool) -> CaptureResult<()> {
    driver
        .execute_script(HIDE_SCROLLBARS_SCRIPT, vec![Value::Bool(hidden)])
        .await
        .map(|_| ())
}

/// Applies or reverts `mutation` on `elements`
///
/// Returns the number of elements the page actually touched.
pub async fn mutate_elements(
    driver: &dyn Driver,
    elements: &[ElementHandle],
    mutation: ElementMutation,
    apply: bool,
) -> CaptureResult<u64> {
    if elements.is_empty() {
        return Ok(0);
    }

    let mut args = vec![Value::from(mutation.as_str()), Value::Bool(apply)];
    args.extend(
        elements
            .iter()
            .map(|element| element_reference(&element.element_id)),
    );

    execute(driver, "mutateElements", MUTATE_ELEMENTS_SCRIPT, args).await
}

pub async fn inject_calibration_overlay(driver: &dyn Driver) -> CaptureResult<()> {
    driver
        .execute_script(INJECT_CALIBRATION_OVERLAY_SCRIPT, Vec::new())
        .await
        .map(|_| ())
}

pub async fn read_calibration_click(driver: &dyn Driver) -> CaptureResult<CalibrationClick> {
    let click: Option<CalibrationClick> = execute(
        driver,
        "readCalibrationClick",
        READ_CALIBRATION_CLICK_SCRIPT,
        Vec::new(),
    )
    .await?;

    click.ok_or_else(|| CaptureError::ScriptResult {
        script: "readCalibrationClick".to_string(),
        reason: "the calibration tap never reached the web view".to_string(),
    })
}

pub async fn remove_calibration_overlay(driver: &dyn Driver) -> CaptureResult<()> {
    driver
        .execute_script(REMOVE_CALIBRATION_OVERLAY_SCRIPT, Vec::new())
        .await
        .map(|_| ())
}
