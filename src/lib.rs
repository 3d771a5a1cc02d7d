//! visreg-capture: Full-page capture and rectangle geometry for visual regression
//!
//! This library scrolls a page through a remote automation [`Driver`](capture::Driver),
//! records one viewport segment per scroll step and stitches the segments
//! into a single image. It also computes the physical-pixel rectangles
//! (element crops, screen crops, ignore regions) that a diff engine needs to
//! line a baseline up with a fresh capture on desktop browsers, Android and
//! iOS.

pub mod capture;
pub mod error;
pub mod geometry;
pub mod model;
pub mod options;
pub mod session;
pub mod util;
