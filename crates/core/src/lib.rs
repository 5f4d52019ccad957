//! # ArchTerra Core
//!
//! Shared substrate for terrain movement and visibility analysis.
//!
//! This crate provides:
//! - `ElevationGrid`: validated, immutable elevation raster with sampling,
//!   Horn slope/aspect and 8-neighbour iteration
//! - `Raster<T>` and `GeoTransform`: georeferenced grids for derived products
//! - `Cell` and `Direction`: grid addressing and the D8 direction encoding
//! - `Monitor`: cooperative cancellation and progress reporting
//! - `OutputTag`: provenance tags for outputs
//! - Algorithm traits for consistent API

pub mod crs;
pub mod error;
pub mod metadata;
pub mod progress;
pub mod raster;

pub use crs::CRS;
pub use error::{Error, Result};
pub use metadata::{new_run_id, OutputTag, RunTagger, Tagged};
pub use progress::{CancelToken, Monitor, ProgressCounter};
pub use raster::{
    Cell, Direction, ElevationGrid, GeoTransform, Raster, RasterElement, Sample, Sampling,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::progress::{CancelToken, Monitor};
    pub use crate::raster::{
        Cell, Direction, ElevationGrid, GeoTransform, Raster, RasterElement, Sample, Sampling,
    };
    pub use crate::Algorithm;
}

/// Core trait for named analyses.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    type Input;
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    type Error: std::error::Error;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
