//! Visibility analysis
//!
//! Line of sight and elevation profiles between two points, viewsheds in
//! single, cumulative, inverse, linear and observer-flag modes, ring
//! visibility around a centre, Higuchi distance zones and visible-area
//! statistics.

mod los;
mod ring;
mod stats;
mod viewshed;
mod zones;

pub use los::{
    line_of_sight, profile, EarthCorrection, LineOfSight, LosOptions, Profile, ProfileSample,
    SamplingStep, SightLine, EARTH_RADIUS_M, STANDARD_REFRACTION,
};
pub use ring::{ring_visibility, RingOptions, RingPoint, RingSegment, RingVisibility};
pub use stats::{visibility_stats, VisibilityStats};
pub use viewshed::{
    compute_viewshed, decode_observers, densify_path, viewshed, Viewpoint, ViewpointFailure,
    ViewshedMode, ViewshedOptions, ViewshedOutput, VisibilityField, HIDDEN,
    MAX_IDENTIFIED_OBSERVERS, NODATA_CODE, OBSERVERS_NODATA, VISIBLE,
};
pub use zones::{classify_zones, DistanceZone, HiguchiZones, ZoneWeights};
