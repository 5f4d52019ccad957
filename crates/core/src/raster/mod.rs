//! Raster data structures

mod cell;
mod element;
mod elevation;
mod geotransform;
mod grid;

pub use cell::{Cell, Direction, NO_DIRECTION};
pub use element::RasterElement;
pub use elevation::{ElevationGrid, Neighbor, Sample, Sampling, SlopeAspect};
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
