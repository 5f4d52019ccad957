//! # ArchTerra Algorithms
//!
//! Movement and visibility analysis over elevation grids.
//!
//! ## Available Algorithm Categories
//!
//! - **terrain**: Slope, aspect, isolines
//! - **visibility**: Line of sight, profiles, viewsheds (single, cumulative,
//!   inverse, linear, observer flags), ring visibility, Higuchi zones,
//!   visible-area statistics
//! - **movement**: Slope cost models, cost surfaces, least-cost accumulation,
//!   paths, corridors, isochrones
//! - **network**: Pairwise cost matrices, MST / kNN / hub networks, proximity
//!   and intervisibility graphs, centrality

pub(crate) mod maybe_rayon;

pub mod movement;
pub mod network;
pub mod terrain;
pub mod visibility;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::terrain::{aspect, isolines, slope, Isoline, Slope, SlopeParams, SlopeUnits};
    pub use crate::visibility::{
        compute_viewshed, line_of_sight, profile, ring_visibility, viewshed, visibility_stats,
        LineOfSight, LosOptions, RingOptions, SightLine, Viewpoint, ViewshedMode,
        ViewshedOptions, VisibilityField,
    };
    pub use crate::movement::{
        accumulate, build_cost_surface, extract_corridor, extract_path, isochrones, path_cost,
        AccumulatedCostField, CostPreset, CostSurface, CostSurfaceOptions, Path,
        SearchDirection, SlopeCost,
    };
    pub use crate::network::{
        build_hub, build_knn, build_mst, centrality, edge_paths, intervisibility_graph,
        pairwise_least_cost, proximity_graph, CostMatrix, NetworkGraph, Site, Symmetry,
    };
    pub use archterra_core::prelude::*;
}
