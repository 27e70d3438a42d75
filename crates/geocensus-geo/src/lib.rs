#![forbid(unsafe_code)]
//! geocensus-geo: the Geographic Interpolator.
//!
//! Finest-tier values are derived from the parent tier by area share:
//! `child = round(parent × child_area / parent_area, 2)`. Parent and child
//! areas come from the same planar measure, and rounding happens exactly once,
//! where the value is computed.

pub mod apportion;
pub mod error;
pub mod interpolate;
pub mod polygon;

pub use apportion::{apportion, round_places, INTERPOLATION_PLACES};
pub use error::{GeoError, Result};
pub use interpolate::{interpolation_insert, GeometryTable, InterpolationAliases};
pub use polygon::Polygon;
