//! Error types for capture and geometry operations
//!
//! This module defines the error taxonomy for the capture engine with
//! user-facing messages and actionable remediation hints. Geometry and
//! capture-loop errors are fatal and are never retried; best-effort failures
//! (hiding elements, reading an image for the iOS home bar) are logged by the
//! caller and never surface as a `CaptureError`.

/// Result type alias for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Error type for capture and rectangle resolution
///
/// Each variant includes detailed context and provides remediation hints
/// through the `remediation_hint()` method.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// A resolved element rectangle has no area
    #[error(
        "The element{} is not visible. The dimensions are {width}x{height}",
        selector_suffix(.selector)
    )]
    ElementNotVisible {
        /// Selector used to locate the element, if known
        selector: Option<String>,
        /// Resolved width
        width:    f64,
        /// Resolved height
        height:   f64,
    },

    /// A resolved screen or viewport rectangle has no area
    #[error("The {target} rectangle is empty. The dimensions are {width}x{height}")]
    EmptyRectangle {
        /// What was being resolved (e.g. "screen", "viewport")
        target: String,
        /// Resolved width
        width:  f64,
        /// Resolved height
        height: f64,
    },

    /// No chrome offsets are known for the device
    #[error("Unknown device '{device}': no status bar or home bar offsets are available")]
    UnknownDevice {
        /// Device name as reported by the session
        device: String,
    },

    /// The full-page loop finished without a usable scroll height or capture
    #[error("Couldn't determine scroll height or screenshot size: {reason}")]
    IncompleteCapture {
        /// What was missing
        reason: String,
    },

    /// One or more ignore entries are neither elements nor regions
    #[error("Invalid ignore regions ({}): {}", .entries.len(), .entries.join("; "))]
    InvalidIgnoreRegions {
        /// Description of every invalid entry
        entries: Vec<String>,
    },

    /// A driver round-trip failed
    #[error("Driver command '{operation}' failed: {reason}")]
    Driver {
        /// Driver command that failed
        operation: String,
        /// Reason reported by the driver
        reason:    String,
    },

    /// A script ran but returned something unusable
    #[error("Script '{script}' returned an unexpected result: {reason}")]
    ScriptResult {
        /// Short name of the script
        script: String,
        /// What was wrong with the result
        reason: String,
    },

    /// Invalid parameter provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// Name of the invalid parameter
        parameter: String,
        /// Reason why it's invalid
        reason:    String,
    },

    /// Image encoding failed
    #[error("Failed to encode image as {format}: {reason}")]
    EncodingFailed {
        /// Image format that failed
        format: String,
        /// Reason for encoding failure
        reason: String,
    },

    /// I/O error occurred
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Image processing error
    #[error("Image processing error: {0}")]
    ImageError(String),
}

fn selector_suffix(selector: &Option<String>) -> String {
    match selector {
        Some(selector) => format!(", with selector \"{selector}\","),
        None => String::new(),
    }
}

impl CaptureError {
    /// Builds a driver error from any displayable failure
    pub fn driver(operation: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        CaptureError::Driver {
            operation: operation.into(),
            reason:    reason.to_string(),
        }
    }

    /// Returns true for errors that describe the test setup rather than a
    /// transient driver condition
    pub fn is_geometry_error(&self) -> bool {
        matches!(
            self,
            CaptureError::ElementNotVisible { .. }
                | CaptureError::EmptyRectangle { .. }
                | CaptureError::UnknownDevice { .. }
        )
    }

    /// Returns an actionable remediation hint for this error
    ///
    /// # Examples
    ///
    /// ```
    /// use visreg_capture::error::CaptureError;
    ///
    /// let error = CaptureError::ElementNotVisible {
    ///     selector: Some("#footer".to_string()),
    ///     width:    0.0,
    ///     height:   50.0,
    /// };
    ///
    /// assert!(error.remediation_hint().contains("visible"));
    /// ```
    pub fn remediation_hint(&self) -> &str {
        match self {
            CaptureError::ElementNotVisible { .. } => {
                "Make sure the element is visible and has a size before taking the screenshot. \
                 Scroll it into view, wait for it to render, or pick a different selector."
            }
            CaptureError::EmptyRectangle { .. } => {
                "The viewport or screen reported no size. Check that the browser window is not \
                 minimized and that the web view has finished loading."
            }
            CaptureError::UnknownDevice { .. } => {
                "Add the device to the chrome offset table or pass the device rectangles \
                 explicitly in the capture options."
            }
            CaptureError::IncompleteCapture { .. } => {
                "The page did not report a scroll height, no screenshot could be measured, or \
                 the page kept growing past the segment limit. Check that the page has a \
                 document element and that screenshots are returned as PNG. For infinite \
                 scroll pages raise VISREG_MAX_FULL_PAGE_SEGMENTS or stop the loader."
            }
            CaptureError::InvalidIgnoreRegions { .. } => {
                "Each ignore entry must be an element reference or an object with numeric x, y, \
                 width and height. Fix every listed entry."
            }
            CaptureError::Driver { operation, .. } => match operation.as_str() {
                "takeScreenshot" | "takeElementScreenshot" => {
                    "The driver could not take a screenshot. Check that the session is still \
                     alive and the window is in the foreground."
                }
                "nativeTap" => {
                    "The native tap failed. Webview calibration needs a session that can switch \
                     to the native context."
                }
                _ => "The driver command failed. Check that the session is still alive.",
            },
            CaptureError::ScriptResult { .. } => {
                "The page returned an unexpected script result. Make sure the page is not \
                 overriding standard DOM APIs."
            }
            CaptureError::InvalidParameter { parameter, .. } => match parameter.as_str() {
                "devicePixelRatio" => "The device pixel ratio must be a finite number above 0.",
                "region" => "The crop region must lie within the captured image.",
                _ => "Check the parameter value against the capture options documentation.",
            },
            CaptureError::EncodingFailed { .. } => {
                "Image encoding failed. Check the image dimensions and available memory."
            }
            CaptureError::IoError(_) => {
                "An I/O error occurred. Check file permissions, disk space, and system resources."
            }
            CaptureError::ImageError(_) => {
                "Image processing failed. Ensure the driver returns valid base64 PNG data."
            }
        }
    }
}
