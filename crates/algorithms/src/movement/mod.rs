//! Movement analysis
//!
//! Slope-driven cost models, anisotropic cost surfaces, multi-source
//! least-cost accumulation, path and corridor extraction, isochrones.

mod accumulate;
mod corridor;
mod cost_model;
mod cost_surface;
mod isochrone;
mod path;

pub use accumulate::{accumulate, AccumulatedCostField, SearchDirection, SkippedSource, NO_SOURCE};
pub use corridor::{extract_corridor, Corridor, CorridorSummary, CORRIDOR_TOLERANCE};
pub use cost_model::{
    validate_model, ConollyLakeParams, CostPreset, CostUnits, HerzogMetabolicParams,
    HerzogWheeledParams, NaismithParams, PandolfParams, SlopeCost, ToblerParams, UniformParams,
};
pub use cost_surface::{build_cost_surface, CostSurface, CostSurfaceOptions, GridGraph};
pub use isochrone::{isochrones, IsochroneParams, Isochrones, UNREACHABLE_BAND};
pub use path::{extract_path, path_cost, straight_line_cost, Path};
