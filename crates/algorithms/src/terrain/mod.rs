//! Terrain derivatives
//!
//! - Slope and aspect rasters (Horn 1981)
//! - Isolines by marching squares, shared with cost isochrones

mod contour;
mod slope;

pub use contour::{contour_levels, isolines, ContourParams, Isoline};
pub use slope::{aspect, slope, Slope, SlopeParams, SlopeUnits};
