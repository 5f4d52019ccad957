//! Line of sight over a sampled surface
//!
//! A target is visible when no intermediate sample of the terrain, lowered
//! by the Earth-curvature drop `(1 - k) * d² / (2R)`, rises above the straight
//! sight line from the observer's eye to the (equally lowered) target.
//! Lowering the terrain relative to the observer is equivalent to bulging the
//! chord by `(1 - k) * d * (D - d) / (2R)`, so the test is symmetric in its
//! endpoints and only the height offsets make it direction dependent.
//!
//! Reference:
//! Fisher, P.F. (1996). Extending the applicability of viewsheds in
//! landscape planning. PE&RS 62(11).

use serde::{Deserialize, Serialize};

use archterra_core::raster::{Cell, ElevationGrid, Sample, Sampling};
use archterra_core::{Error, Result};

/// Mean Earth radius in metres
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
/// Standard atmospheric refraction coefficient
pub const STANDARD_REFRACTION: f64 = 1.0 / 7.0;
/// Lower bound on the number of samples in a charted profile
pub const PROFILE_MIN_SAMPLES: usize = 200;

const HEIGHT_TOLERANCE: f64 = 1e-9;

/// Earth curvature and refraction correction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarthCorrection {
    pub curvature: bool,
    /// Only meaningful with `curvature`
    pub refraction: bool,
    pub refraction_coefficient: f64,
    pub earth_radius: f64,
}

/// Curvature with standard refraction
impl Default for EarthCorrection {
    fn default() -> Self {
        Self::standard()
    }
}

impl EarthCorrection {
    /// Curvature with standard refraction (k = 1/7)
    pub fn standard() -> Self {
        Self {
            curvature: true,
            refraction: true,
            refraction_coefficient: STANDARD_REFRACTION,
            earth_radius: EARTH_RADIUS_M,
        }
    }

    /// Flat earth: no drop at any distance
    pub fn none() -> Self {
        Self {
            curvature: false,
            refraction: false,
            ..Self::standard()
        }
    }

    /// Apparent drop of the surface at horizontal distance `d`
    #[inline]
    pub fn drop_at(&self, d: f64) -> f64 {
        if !self.curvature {
            return 0.0;
        }
        let k = if self.refraction { self.refraction_coefficient } else { 0.0 };
        (1.0 - k) * d * d / (2.0 * self.earth_radius)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.earth_radius.is_finite() && self.earth_radius > 0.0) {
            return Err(Error::invalid_parameter("earth_radius", self.earth_radius, "must be > 0"));
        }
        if !(0.0..1.0).contains(&self.refraction_coefficient) {
            return Err(Error::invalid_parameter(
                "refraction_coefficient",
                self.refraction_coefficient,
                "must be in [0, 1)",
            ));
        }
        Ok(())
    }
}

/// Spacing of terrain samples along a sight line
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingStep {
    /// The smaller cell dimension
    #[default]
    Adaptive,
    /// Fixed spacing in map units
    Fixed(f64),
}

impl SamplingStep {
    pub fn resolve(&self, grid: &ElevationGrid) -> Result<f64> {
        match *self {
            SamplingStep::Adaptive => Ok(grid.min_cell_size()),
            SamplingStep::Fixed(step) if step.is_finite() && step > 0.0 => Ok(step),
            SamplingStep::Fixed(step) => Err(Error::invalid_parameter("step", step, "must be > 0")),
        }
    }
}

/// How sight lines sample the surface
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LosOptions {
    pub step: SamplingStep,
    pub sampling: Sampling,
    pub earth: EarthCorrection,
}

impl LosOptions {
    /// Validate and resolve the sample spacing for `grid`
    pub(crate) fn prepare(&self, grid: &ElevationGrid) -> Result<f64> {
        self.earth.validate()?;
        self.step.resolve(grid)
    }
}

/// A sight line between two map positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SightLine {
    pub from: (f64, f64),
    pub to: (f64, f64),
    /// Eye height above ground at `from`
    pub observer_height: f64,
    /// Height above ground of the point looked at
    pub target_height: f64,
}

impl SightLine {
    pub fn new(from: (f64, f64), to: (f64, f64)) -> Self {
        Self {
            from,
            to,
            observer_height: 1.7,
            target_height: 0.0,
        }
    }

    pub fn with_heights(mut self, observer_height: f64, target_height: f64) -> Self {
        self.observer_height = observer_height;
        self.target_height = target_height;
        self
    }

    /// The same line looked at from the other end, keeping both offsets
    pub fn reversed(self) -> Self {
        Self {
            from: self.to,
            to: self.from,
            ..self
        }
    }

    pub fn length(&self) -> f64 {
        (self.to.0 - self.from.0).hypot(self.to.1 - self.from.1)
    }
}

/// Verdict of a line-of-sight test
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LineOfSight {
    Visible,
    /// First obstruction at `distance` from the observer
    Blocked { distance: f64 },
    /// An endpoint or an intermediate sample had no data
    NoData,
}

impl LineOfSight {
    pub fn is_visible(&self) -> bool {
        matches!(self, LineOfSight::Visible)
    }
}

/// Absolute eye/target position: (x, y, z)
pub(crate) type Point3 = (f64, f64, f64);

/// Test a sight line between two absolute positions.
///
/// Intermediate samples are taken every `step` (endpoints excluded). A clear
/// obstruction wins over missing data; missing data alone yields `NoData`.
pub(crate) fn clear_between(
    grid: &ElevationGrid,
    from: Point3,
    to: Point3,
    step: f64,
    options: &LosOptions,
) -> Result<LineOfSight> {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let length = dx.hypot(dy);
    let n = (length / step).ceil() as usize;
    if n <= 1 {
        return Ok(LineOfSight::Visible);
    }

    let target_z = to.2 - options.earth.drop_at(length);
    let mut missing = false;

    for i in 1..n {
        let t = i as f64 / n as f64;
        let d = t * length;
        let z = match grid.sample(from.0 + t * dx, from.1 + t * dy, options.sampling) {
            Ok(Sample::Value(z)) => z,
            Ok(Sample::NoData) | Err(Error::OutOfExtent { .. }) => {
                missing = true;
                continue;
            }
            Err(e) => return Err(e),
        };

        let sight = from.2 + (target_z - from.2) * t;
        if z - options.earth.drop_at(d) > sight + HEIGHT_TOLERANCE {
            return Ok(LineOfSight::Blocked { distance: d });
        }
    }

    Ok(if missing { LineOfSight::NoData } else { LineOfSight::Visible })
}

fn ground(grid: &ElevationGrid, (x, y): (f64, f64), sampling: Sampling) -> Result<Option<f64>> {
    Ok(grid.sample(x, y, sampling)?.value())
}

/// Line of sight between two map positions.
///
/// Fails with [`Error::OutOfExtent`] when an endpoint lies outside the grid.
pub fn line_of_sight(
    grid: &ElevationGrid,
    line: &SightLine,
    options: &LosOptions,
) -> Result<LineOfSight> {
    let step = options.prepare(grid)?;

    let (Some(za), Some(zb)) = (
        ground(grid, line.from, options.sampling)?,
        ground(grid, line.to, options.sampling)?,
    ) else {
        return Ok(LineOfSight::NoData);
    };

    clear_between(
        grid,
        (line.from.0, line.from.1, za + line.observer_height),
        (line.to.0, line.to.1, zb + line.target_height),
        step,
        options,
    )
}

/// One sample of a terrain profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProfileSample {
    /// Horizontal distance from the observer
    pub distance: f64,
    pub x: f64,
    pub y: f64,
    /// Ground elevation, `None` on no-data
    pub elevation: Option<f64>,
    /// Elevation after curvature/refraction correction
    pub apparent_elevation: Option<f64>,
    /// Height of the observer-to-target sight line
    pub sight_line: f64,
    /// Whether this ground point is seen from the observer
    pub visible: bool,
}

/// Terrain profile between an observer and a target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub samples: Vec<ProfileSample>,
    pub length: f64,
    /// Absolute eye height
    pub observer_elevation: f64,
    /// Absolute target height
    pub target_elevation: f64,
    pub line_of_sight: LineOfSight,
}

impl Profile {
    /// Distance of the first obstruction, if any
    pub fn first_obstruction(&self) -> Option<f64> {
        match self.line_of_sight {
            LineOfSight::Blocked { distance } => Some(distance),
            _ => None,
        }
    }
}

/// Sample a profile along a sight line for charting.
///
/// Uses at least [`PROFILE_MIN_SAMPLES`] intervals. Per-sample visibility
/// follows the running maximum elevation angle from the eye. Endpoints on
/// no-data fail with [`Error::NoData`].
pub fn profile(grid: &ElevationGrid, line: &SightLine, options: &LosOptions) -> Result<Profile> {
    let step = options.prepare(grid)?;

    let endpoint = |p: (f64, f64)| -> Result<f64> {
        ground(grid, p, options.sampling)?.ok_or_else(|| {
            let cell = grid.cell_at(p.0, p.1).unwrap_or(Cell::new(0, 0));
            Error::NoData { row: cell.row, col: cell.col }
        })
    };
    let observer = endpoint(line.from)? + line.observer_height;
    let target = endpoint(line.to)? + line.target_height;

    let length = line.length();
    let (dx, dy) = (line.to.0 - line.from.0, line.to.1 - line.from.1);
    let n = ((length / step).ceil() as usize).max(PROFILE_MIN_SAMPLES);
    let target_apparent = target - options.earth.drop_at(length);

    let mut samples = Vec::with_capacity(n + 1);
    let mut max_angle = f64::NEG_INFINITY;
    let mut first_obstruction = None;
    let mut missing = false;

    for i in 0..=n {
        let t = i as f64 / n as f64;
        let d = t * length;
        let (x, y) = (line.from.0 + t * dx, line.from.1 + t * dy);
        let elevation = match grid.sample(x, y, options.sampling) {
            Ok(s) => s.value(),
            Err(Error::OutOfExtent { .. }) => None,
            Err(e) => return Err(e),
        };
        let apparent_elevation = elevation.map(|z| z - options.earth.drop_at(d));
        let sight_line = observer + (target_apparent - observer) * t;

        let visible = match apparent_elevation {
            _ if i == 0 => true,
            None => false,
            Some(z) => {
                let angle = (z - observer) / d;
                let seen = angle >= max_angle - HEIGHT_TOLERANCE;
                max_angle = max_angle.max(angle);
                seen
            }
        };

        if i > 0 && i < n {
            match apparent_elevation {
                None => missing = true,
                Some(z) if z > sight_line + HEIGHT_TOLERANCE && first_obstruction.is_none() => {
                    first_obstruction = Some(d);
                }
                Some(_) => {}
            }
        }

        samples.push(ProfileSample {
            distance: d,
            x,
            y,
            elevation,
            apparent_elevation,
            sight_line,
            visible,
        });
    }

    let line_of_sight = match (first_obstruction, missing) {
        (Some(distance), _) => LineOfSight::Blocked { distance },
        (None, true) => LineOfSight::NoData,
        (None, false) => LineOfSight::Visible,
    };

    Ok(Profile {
        samples,
        length,
        observer_elevation: observer,
        target_elevation: target,
        line_of_sight,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use archterra_core::GeoTransform;

    /// 1 x 21 strip of 10 m cells at 100 m, with an optional bump (col, height)
    fn strip_with(bump: Option<(usize, f64)>) -> ElevationGrid {
        let mut values = vec![100.0; 21];
        if let Some((col, h)) = bump {
            values[col] = h;
        }
        ElevationGrid::from_vec(values, 1, 21, GeoTransform::new(0.0, 10.0, 10.0, -10.0), None)
            .unwrap()
    }

    fn strip(wall: Option<f64>) -> ElevationGrid {
        strip_with(wall.map(|h| (10, h)))
    }

    fn nearest() -> LosOptions {
        LosOptions {
            sampling: Sampling::Nearest,
            ..Default::default()
        }
    }

    #[test]
    fn flat_terrain_is_visible() {
        let grid = strip(None);
        let line = SightLine::new((5.0, 5.0), (205.0, 5.0));
        assert_eq!(line_of_sight(&grid, &line, &nearest()).unwrap(), LineOfSight::Visible);
        // Ground to ground only holds on a flat earth
        let line = line.with_heights(0.0, 0.0);
        let flat_earth = LosOptions { earth: EarthCorrection::none(), ..nearest() };
        assert_eq!(line_of_sight(&grid, &line, &flat_earth).unwrap(), LineOfSight::Visible);
        assert!(!line_of_sight(&grid, &line, &nearest()).unwrap().is_visible());
    }

    #[test]
    fn wall_blocks() {
        let grid = strip(Some(150.0));
        let line = SightLine::new((5.0, 5.0), (205.0, 5.0));
        match line_of_sight(&grid, &line, &nearest()).unwrap() {
            LineOfSight::Blocked { distance } => {
                assert!((95.0..=115.0).contains(&distance), "got {}", distance)
            }
            other => panic!("expected blocked, got {:?}", other),
        }
    }

    #[test]
    fn height_offsets_make_direction_matter() {
        // 1 m bump 20 m from A: a 3 m eye at A clears it, a 3 m eye at B does not
        let grid = strip_with(Some((2, 101.0)));
        let a_to_b = SightLine::new((5.0, 5.0), (205.0, 5.0)).with_heights(3.0, 0.0);
        assert!(line_of_sight(&grid, &a_to_b, &nearest()).unwrap().is_visible());
        let b_to_a = a_to_b.reversed();
        assert!(!line_of_sight(&grid, &b_to_a, &nearest()).unwrap().is_visible());
    }

    #[test]
    fn curvature_drop() {
        let earth = EarthCorrection::standard();
        let d = 10_000.0;
        let expected = (1.0 - 1.0 / 7.0) * d * d / (2.0 * EARTH_RADIUS_M);
        assert_relative_eq!(earth.drop_at(d), expected, epsilon = 1e-12);
        assert_eq!(EarthCorrection::none().drop_at(d), 0.0);

        let no_refraction = EarthCorrection {
            refraction: false,
            ..Default::default()
        };
        assert!(no_refraction.drop_at(d) > earth.drop_at(d));
    }

    #[test]
    fn curvature_hides_distant_low_target() {
        // 40 km strip of 1 km cells at sea level
        let flat_grid = ElevationGrid::from_vec(
            vec![0.0; 41],
            1,
            41,
            GeoTransform::new(0.0, 1000.0, 1000.0, -1000.0),
            None,
        )
        .unwrap();
        let ground_level = SightLine::new((500.0, 500.0), (40_500.0, 500.0)).with_heights(0.0, 0.0);
        let flat = LosOptions { earth: EarthCorrection::none(), ..nearest() };
        let curved = nearest();

        assert!(line_of_sight(&flat_grid, &ground_level, &flat).unwrap().is_visible());
        // The bulge of the sea surface hides a target at eye level
        assert!(!line_of_sight(&flat_grid, &ground_level, &curved).unwrap().is_visible());

        // 30 m masts see each other over the ~27 m mid-point bulge...
        let masts = ground_level.with_heights(30.0, 30.0);
        assert!(line_of_sight(&flat_grid, &masts, &curved).unwrap().is_visible());

        // ...but not once a 20 m hill sits at mid-distance
        let mut values = vec![0.0; 41];
        values[20] = 20.0;
        let hill_grid = ElevationGrid::from_vec(
            values,
            1,
            41,
            GeoTransform::new(0.0, 1000.0, 1000.0, -1000.0),
            None,
        )
        .unwrap();
        assert!(line_of_sight(&hill_grid, &masts, &flat).unwrap().is_visible());
        assert!(!line_of_sight(&hill_grid, &masts, &curved).unwrap().is_visible());
    }

    #[test]
    fn defaults_correct_for_curvature_and_refraction() {
        let options = LosOptions::default();
        assert_eq!(options.earth, EarthCorrection::standard());
        assert!(options.earth.curvature && options.earth.refraction);
        assert_relative_eq!(options.earth.refraction_coefficient, 1.0 / 7.0);
        assert!(options.earth.drop_at(10_000.0) > 6.7);

        // Missing fields in a document fall back to the same correction
        let parsed: EarthCorrection = serde_json::from_str(r#"{"earth_radius": 6371000.0}"#).unwrap();
        assert_eq!(parsed, EarthCorrection::standard());
        let flat: EarthCorrection = serde_json::from_str(r#"{"curvature": false}"#).unwrap();
        assert_eq!(flat.drop_at(10_000.0), 0.0);
    }

    #[test]
    fn endpoint_outside_extent_is_error() {
        let grid = strip(None);
        let line = SightLine::new((5.0, 5.0), (500.0, 5.0));
        assert!(matches!(
            line_of_sight(&grid, &line, &nearest()),
            Err(Error::OutOfExtent { .. })
        ));
    }

    #[test]
    fn nodata_endpoint_and_gap() {
        let mut values = vec![100.0; 21];
        values[20] = f64::NAN;
        values[10] = f64::NAN;
        let grid =
            ElevationGrid::from_vec(values, 1, 21, GeoTransform::new(0.0, 10.0, 10.0, -10.0), None)
                .unwrap();
        let to_gap = SightLine::new((5.0, 5.0), (205.0, 5.0));
        assert_eq!(line_of_sight(&grid, &to_gap, &nearest()).unwrap(), LineOfSight::NoData);
        let across = SightLine::new((5.0, 5.0), (195.0, 5.0));
        assert_eq!(line_of_sight(&grid, &across, &nearest()).unwrap(), LineOfSight::NoData);
    }

    #[test]
    fn profile_reports_first_obstruction() {
        let grid = strip(Some(150.0));
        let line = SightLine::new((5.0, 5.0), (205.0, 5.0));
        let p = profile(&grid, &line, &nearest()).unwrap();

        assert_eq!(p.samples.len(), PROFILE_MIN_SAMPLES + 1);
        assert_relative_eq!(p.samples[0].distance, 0.0);
        assert_relative_eq!(p.samples.last().unwrap().distance, 200.0, epsilon = 1e-9);
        assert_relative_eq!(p.observer_elevation, 101.7, epsilon = 1e-12);
        assert_relative_eq!(p.target_elevation, 100.0, epsilon = 1e-12);

        let first = p.first_obstruction().unwrap();
        assert!((95.0..=115.0).contains(&first), "got {}", first);

        // Ground behind the wall is not seen
        let behind = p.samples.iter().find(|s| s.distance > 150.0).unwrap();
        assert!(!behind.visible);
        let before = p.samples.iter().find(|s| s.distance > 50.0).unwrap();
        assert!(before.visible);
    }

    #[test]
    fn profile_agrees_with_line_of_sight_on_flat_ground() {
        let grid = strip(None);
        let line = SightLine::new((5.0, 5.0), (205.0, 5.0));
        let p = profile(&grid, &line, &LosOptions::default()).unwrap();
        assert_eq!(p.line_of_sight, LineOfSight::Visible);
        assert!(p.samples.iter().all(|s| s.visible));
    }

    #[test]
    fn invalid_options_rejected() {
        let grid = strip(None);
        let line = SightLine::new((5.0, 5.0), (205.0, 5.0));
        let bad = LosOptions { step: SamplingStep::Fixed(0.0), ..Default::default() };
        assert!(line_of_sight(&grid, &line, &bad).is_err());
        let bad = LosOptions {
            earth: EarthCorrection { refraction_coefficient: 1.5, ..EarthCorrection::standard() },
            ..Default::default()
        };
        assert!(line_of_sight(&grid, &line, &bad).is_err());
    }
}
