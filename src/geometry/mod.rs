//! Rectangle geometry
//!
//! Converts CSS boxes read from the page and device chrome rectangles into
//! physical-pixel rectangles that line up with a screenshot:
//!
//! - [`dpr`]: Effective device pixel ratio and scaling
//! - [`platform`]: Per-platform placement of element and screen boxes
//! - [`rectangles`]: Element and screen crop rectangles
//! - [`ignore`]: Ignore regions and device chrome block-outs
//! - [`device`]: Device chrome rectangles (capabilities, device table,
//!   web view calibration)

pub mod device;
pub mod dpr;
pub mod ignore;
pub mod platform;
pub mod rectangles;

pub use dpr::{ScaleByDpr, effective_dpr, scale_numeric_fields};
pub use ignore::{IgnoreRegions, IgnoreRequest, resolve_ignore_regions};
pub use platform::{PlatformPositionResolver, PositionContext};
pub use rectangles::{determine_element_rectangles, determine_screen_rectangles};
