//! Device-pixel-ratio resolution and scaling
//!
//! Every physical-pixel measurement handed to the diff engine must be scaled
//! by exactly one DPR factor. Records opt in through [`ScaleByDpr`]; loosely
//! shaped records (JSON objects coming from scripts) go through
//! [`scale_numeric_fields`].

use serde_json::Value;

use crate::{
    error::{CaptureError, CaptureResult},
    model::{DeviceRectangles, FullPageScreenshotData, IgnoredBox, Rectangle, ViewportSegment},
};

/// Picks the device pixel ratio that matches the captured pixel data
///
/// An emulated device that was not started with emulation capabilities
/// reports a live DPR that does not match its screenshots when the legacy
/// screenshot method is used. In that case the DPR captured at session start
/// is the correct one.
///
/// # Examples
///
/// ```
/// use visreg_capture::geometry::dpr::effective_dpr;
///
/// assert_eq!(effective_dpr(true, true, 3.0, 1.0), 1.0);
/// assert_eq!(effective_dpr(true, false, 3.0, 1.0), 3.0);
/// assert_eq!(effective_dpr(false, true, 2.0, 1.0), 2.0);
/// ```
pub fn effective_dpr(
    is_emulated: bool,
    legacy_mode_requested: bool,
    current_dpr: f64,
    initial_dpr: f64,
) -> f64 {
    if is_emulated && legacy_mode_requested {
        initial_dpr
    } else {
        current_dpr
    }
}

/// Validates a DPR before it is used as a scale factor
pub fn validate_dpr(dpr: f64) -> CaptureResult<f64> {
    if dpr.is_finite() && dpr > 0.0 {
        Ok(dpr)
    } else {
        Err(CaptureError::InvalidParameter {
            parameter: "devicePixelRatio".to_string(),
            reason:    format!("value {dpr} must be a finite number above 0"),
        })
    }
}

/// A record whose numeric fields are pixel measurements
pub trait ScaleByDpr: Sized {
    /// Returns a copy with every numeric field multiplied by `dpr`
    fn scale_by_dpr(&self, dpr: f64) -> Self;
}

impl ScaleByDpr for Rectangle {
    fn scale_by_dpr(&self, dpr: f64) -> Self {
        Rectangle::new(self.x * dpr, self.y * dpr, self.width * dpr, self.height * dpr)
    }
}

impl ScaleByDpr for IgnoredBox {
    fn scale_by_dpr(&self, dpr: f64) -> Self {
        IgnoredBox {
            top:    self.top * dpr,
            left:   self.left * dpr,
            right:  self.right * dpr,
            bottom: self.bottom * dpr,
        }
    }
}

impl ScaleByDpr for ViewportSegment {
    fn scale_by_dpr(&self, dpr: f64) -> Self {
        ViewportSegment {
            screenshot:        self.screenshot.clone(),
            canvas_width:      self.canvas_width * dpr,
            canvas_y_position: self.canvas_y_position * dpr,
            image_width:       self.image_width * dpr,
            image_height:      self.image_height * dpr,
            image_x_position:  self.image_x_position * dpr,
            image_y_position:  self.image_y_position * dpr,
            rotated:           self.rotated,
        }
    }
}

impl ScaleByDpr for FullPageScreenshotData {
    fn scale_by_dpr(&self, dpr: f64) -> Self {
        FullPageScreenshotData {
            full_page_width:  self.full_page_width * dpr,
            full_page_height: self.full_page_height * dpr,
            segments:         self.segments.iter().map(|s| s.scale_by_dpr(dpr)).collect(),
        }
    }
}

/// Converts between device pixels and CSS pixels, e.g. `scale_by_dpr(1.0 /
/// dpr)` turns device-pixel rectangles into CSS pixels
impl ScaleByDpr for DeviceRectangles {
    fn scale_by_dpr(&self, dpr: f64) -> Self {
        DeviceRectangles {
            status_bar:                 self.status_bar.scale_by_dpr(dpr),
            status_bar_and_address_bar: self.status_bar_and_address_bar.scale_by_dpr(dpr),
            bottom_bar:                 self.bottom_bar.scale_by_dpr(dpr),
            home_bar:                   self.home_bar.scale_by_dpr(dpr),
            left_side_padding:          self.left_side_padding.scale_by_dpr(dpr),
            right_side_padding:         self.right_side_padding.scale_by_dpr(dpr),
            viewport:                   self.viewport.scale_by_dpr(dpr),
            screen_size:                self.screen_size.scale_by_dpr(dpr),
        }
    }
}

/// Multiplies every numeric field of a JSON record by `dpr`
///
/// Non-numeric fields (strings, booleans, null, nested values) are returned
/// untouched. Non-object values are returned as-is.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use visreg_capture::geometry::dpr::scale_numeric_fields;
///
/// let scaled = scale_numeric_fields(&json!({"x": 10, "label": "nav"}), 2.0);
/// assert_eq!(scaled, json!({"x": 20.0, "label": "nav"}));
/// ```
pub fn scale_numeric_fields(record: &Value, dpr: f64) -> Value {
    let Value::Object(fields) = record else {
        return record.clone();
    };

    let scaled = fields
        .iter()
        .map(|(key, value)| {
            let value = match value.as_f64() {
                Some(number) => serde_json::Number::from_f64(number * dpr)
                    .map(Value::Number)
                    .unwrap_or_else(|| value.clone()),
                _ => value.clone(),
            };
            (key.clone(), value)
        })
        .collect();

    Value::Object(scaled)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::Screenshot;

    #[test]
    fn test_effective_dpr_legacy_emulated_uses_initial() {
        assert_eq!(effective_dpr(true, true, 2.625, 1.0), 1.0);
    }

    #[test]
    fn test_effective_dpr_defaults_to_current() {
        assert_eq!(effective_dpr(false, false, 2.0, 1.0), 2.0);
        assert_eq!(effective_dpr(true, false, 2.0, 1.0), 2.0);
        assert_eq!(effective_dpr(false, true, 2.0, 1.0), 2.0);
    }

    #[test]
    fn test_validate_dpr() {
        assert_eq!(validate_dpr(1.5).unwrap(), 1.5);
        assert!(validate_dpr(0.0).is_err());
        assert!(validate_dpr(-1.0).is_err());
        assert!(validate_dpr(f64::NAN).is_err());
        assert!(validate_dpr(f64::INFINITY).is_err());
    }

    #[test]
    fn test_rectangle_scaling() {
        let rect = Rectangle::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(rect.scale_by_dpr(2.0), Rectangle::new(2.0, 4.0, 6.0, 8.0));
        assert_eq!(rect.scale_by_dpr(1.0), rect);
    }

    #[test]
    fn test_ignored_box_scaling() {
        let ignored = Rectangle::new(0.0, 10.0, 20.0, 30.0).to_ignored_box();
        let scaled = ignored.scale_by_dpr(3.0);
        assert_eq!(scaled.top, 30.0);
        assert_eq!(scaled.left, 0.0);
        assert_eq!(scaled.right, 60.0);
        assert_eq!(scaled.bottom, 120.0);
    }

    #[test]
    fn test_segment_scaling_keeps_screenshot_and_rotation() {
        let segment = ViewportSegment {
            screenshot:        Screenshot::from_base64("abc"),
            canvas_width:      390.0,
            canvas_y_position: 721.0,
            image_width:       390.0,
            image_height:      721.0,
            image_x_position:  0.0,
            image_y_position:  53.0,
            rotated:           true,
        };

        let scaled = segment.scale_by_dpr(2.0);
        assert_eq!(scaled.screenshot, segment.screenshot);
        assert!(scaled.rotated);
        assert_eq!(scaled.canvas_y_position, 1442.0);
        assert_eq!(scaled.image_y_position, 106.0);
    }

    #[test]
    fn test_full_page_data_scaling() {
        let data = FullPageScreenshotData {
            full_page_width:  390.0,
            full_page_height: 3000.0,
            segments:         Vec::new(),
        };
        let scaled = data.scale_by_dpr(2.0);
        assert_eq!(scaled.full_page_width, 780.0);
        assert_eq!(scaled.full_page_height, 6000.0);
    }

    #[test]
    fn test_device_rectangles_to_css() {
        let device = DeviceRectangles {
            viewport: Rectangle::new(0.0, 94.0, 780.0, 1466.0),
            home_bar: Rectangle::new(0.0, 1620.0, 780.0, 68.0),
            ..Default::default()
        };
        let css = device.scale_by_dpr(0.5);
        assert_eq!(css.viewport, Rectangle::new(0.0, 47.0, 390.0, 733.0));
        assert_eq!(css.home_bar, Rectangle::new(0.0, 810.0, 390.0, 34.0));
        assert!(css.status_bar.is_all_zero());
    }

    #[test]
    fn test_scale_numeric_fields_scales_every_number() {
        let record = json!({"x": 1, "y": 2.5, "width": 100, "height": 0});
        let scaled = scale_numeric_fields(&record, 2.0);
        assert_eq!(scaled, json!({"x": 2.0, "y": 5.0, "width": 200.0, "height": 0.0}));
    }

    #[test]
    fn test_scale_numeric_fields_leaves_other_fields_identical() {
        let record = json!({
            "selector": "#nav",
            "visible": true,
            "parent": null,
            "tags": ["a", 1],
            "inner": {"x": 3},
            "top": 7
        });

        let scaled = scale_numeric_fields(&record, 1.75);
        for key in ["selector", "visible", "parent", "tags", "inner"] {
            assert_eq!(
                serde_json::to_string(&scaled[key]).unwrap(),
                serde_json::to_string(&record[key]).unwrap(),
                "field {key} changed"
            );
        }
        assert_eq!(scaled["top"], json!(12.25));
    }

    #[test]
    fn test_scale_numeric_fields_non_object() {
        assert_eq!(scale_numeric_fields(&json!("text"), 2.0), json!("text"));
        assert_eq!(scale_numeric_fields(&json!([1, 2]), 2.0), json!([1, 2]));
    }

    #[test]
    fn test_scaling_property_across_ratios() {
        let rect = Rectangle::new(12.0, 34.0, 56.0, 78.0);
        for dpr in [0.5, 1.0, 1.5, 2.0, 2.625, 3.0] {
            let scaled = rect.scale_by_dpr(dpr);
            assert_eq!(scaled.x, rect.x * dpr);
            assert_eq!(scaled.y, rect.y * dpr);
            assert_eq!(scaled.width, rect.width * dpr);
            assert_eq!(scaled.height, rect.height * dpr);
        }
    }
}
