//! Viewshed analysis
//!
//! Every target cell within range is tested with its own sight line from
//! the observer (see [`super::los`]), so each cell's verdict is independent
//! and rows run in parallel. Four modes share that kernel:
//!
//! - **Single**: binary visibility from one viewpoint.
//! - **Cumulative**: per-cell sum of (weighted, optionally zone-weighted)
//!   visibility over many viewpoints, plus a 0-100 % layer relative to the
//!   maximum each cell could have scored.
//! - **Inverse**: a cell is visible when an observer standing on it sees at
//!   least one reference target (heights swapped with respect to Single).
//! - **Linear**: a path densified into viewpoints, then Cumulative.
//! - **Observers**: per-cell bit flags, bit `i` set when viewpoint `i` sees
//!   the cell, so the set of observers behind each cell can be recovered.
//!
//! In batch modes a viewpoint outside the grid or on no-data is skipped,
//! logged and reported; it is fatal only in Single mode.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::los::{clear_between, LosOptions};
use super::zones::ZoneWeights;
use crate::maybe_rayon::*;
use archterra_core::raster::{Cell, ElevationGrid, Raster};
use archterra_core::{Error, Monitor, Result};

/// Binary code for a visible cell
pub const VISIBLE: u8 = 1;
/// Binary code for a cell that is not visible
pub const HIDDEN: u8 = 0;
/// Binary code for a no-data cell
pub const NODATA_CODE: u8 = 255;
/// Observer-flag value of a no-data cell
pub const OBSERVERS_NODATA: u32 = u32::MAX;
/// Most viewpoints an observer-flag field can tell apart
pub const MAX_IDENTIFIED_OBSERVERS: usize = 31;

fn default_observer_height() -> f64 {
    1.7
}

fn default_weight() -> f64 {
    1.0
}

/// Observer position and its per-point overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewpoint {
    pub x: f64,
    pub y: f64,
    /// Eye height above ground
    #[serde(default = "default_observer_height")]
    pub observer_height: f64,
    /// Overrides [`ViewshedOptions::target_height`]
    #[serde(default)]
    pub target_height: Option<f64>,
    /// Overrides [`ViewshedOptions::radius`]
    #[serde(default)]
    pub radius: Option<f64>,
    /// Contribution to cumulative scores
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl Viewpoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            observer_height: default_observer_height(),
            target_height: None,
            radius: None,
            weight: default_weight(),
        }
    }

    pub fn with_observer_height(mut self, h: f64) -> Self {
        self.observer_height = h;
        self
    }

    pub fn with_target_height(mut self, h: f64) -> Self {
        self.target_height = Some(h);
        self
    }

    pub fn with_radius(mut self, r: f64) -> Self {
        self.radius = Some(r);
        self
    }

    pub fn with_weight(mut self, w: f64) -> Self {
        self.weight = w;
        self
    }
}

/// Options shared by all viewshed modes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewshedOptions {
    /// Eye height for observers that are not explicit viewpoints
    /// (cells in Inverse mode, path points in Linear mode)
    pub observer_height: f64,
    /// Height above ground of the cells looked at
    pub target_height: f64,
    /// Maximum viewing distance; `None` = whole grid
    pub radius: Option<f64>,
    /// Distance-zone weighting of cumulative scores
    pub zone_weights: Option<ZoneWeights>,
    pub los: LosOptions,
}

impl Default for ViewshedOptions {
    fn default() -> Self {
        Self {
            observer_height: 1.7,
            target_height: 0.0,
            radius: None,
            zone_weights: None,
            los: LosOptions::default(),
        }
    }
}

/// What to compute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ViewshedMode {
    Single { viewpoint: Viewpoint },
    Cumulative { viewpoints: Vec<Viewpoint> },
    Inverse { targets: Vec<Viewpoint> },
    Linear {
        path: Vec<(f64, f64)>,
        /// Spacing of viewpoints along the path
        interval: f64,
        /// Treat the path as a closed ring
        #[serde(default)]
        closed: bool,
    },
    Observers { viewpoints: Vec<Viewpoint> },
}

/// A visibility product congruent with the elevation grid
#[derive(Debug, Clone)]
pub enum VisibilityField {
    /// [`VISIBLE`] / [`HIDDEN`] / [`NODATA_CODE`]
    Binary(Raster<u8>),
    /// Weighted visibility sum and its percentage of the attainable
    /// maximum; NaN on no-data cells and cells no viewpoint could reach
    Score {
        value: Raster<f64>,
        percent: Raster<f64>,
    },
    /// Bit `i` set when viewpoint `i` sees the cell; [`OBSERVERS_NODATA`]
    /// on no-data cells
    Observers(Raster<u32>),
}

impl VisibilityField {
    pub fn shape(&self) -> (usize, usize) {
        match self {
            VisibilityField::Binary(r) => r.shape(),
            VisibilityField::Score { value, .. } => value.shape(),
            VisibilityField::Observers(r) => r.shape(),
        }
    }

    /// Binary view: score cells seen at least once become [`VISIBLE`]
    pub fn visible_mask(&self) -> Raster<u8> {
        match self {
            VisibilityField::Binary(r) => r.clone(),
            VisibilityField::Score { value, .. } => {
                let mut mask = value.map(|v| {
                    if v.is_nan() {
                        NODATA_CODE
                    } else if v > 0.0 {
                        VISIBLE
                    } else {
                        HIDDEN
                    }
                });
                mask.set_nodata(Some(NODATA_CODE));
                mask
            }
            VisibilityField::Observers(flags) => {
                let mut mask = flags.map(|v| match v {
                    OBSERVERS_NODATA => NODATA_CODE,
                    0 => HIDDEN,
                    _ => VISIBLE,
                });
                mask.set_nodata(Some(NODATA_CODE));
                mask
            }
        }
    }
}

/// Indices of the viewpoints encoded in an observer-flag value
pub fn decode_observers(flags: u32) -> Vec<usize> {
    if flags == OBSERVERS_NODATA {
        return Vec::new();
    }
    (0..MAX_IDENTIFIED_OBSERVERS)
        .filter(|i| flags & (1 << i) != 0)
        .collect()
}

/// A viewpoint skipped by a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewpointFailure {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub reason: String,
}

/// Result of [`compute_viewshed`]
#[derive(Debug, Clone)]
pub struct ViewshedOutput {
    pub field: VisibilityField,
    /// Viewpoints that contributed
    pub evaluated: usize,
    pub failures: Vec<ViewpointFailure>,
}

/// A resolved observer: absolute eye position plus what it looks at
struct Observer {
    x: f64,
    y: f64,
    eye: f64,
    target_height: f64,
    radius: Option<f64>,
}

impl Observer {
    fn resolve(grid: &ElevationGrid, vp: &Viewpoint, options: &ViewshedOptions) -> Result<Self> {
        let cell = grid.cell_at(vp.x, vp.y)?;
        let ground = grid
            .sample(vp.x, vp.y, options.los.sampling)?
            .value()
            .ok_or(Error::NoData { row: cell.row, col: cell.col })?;

        Ok(Self {
            x: vp.x,
            y: vp.y,
            eye: ground + vp.observer_height,
            target_height: vp.target_height.unwrap_or(options.target_height),
            radius: vp.radius.or(options.radius),
        })
    }

    fn in_range(&self, d: f64) -> bool {
        self.radius.map_or(true, |r| d <= r)
    }
}

fn check_radius(radius: Option<f64>) -> Result<()> {
    match radius {
        Some(r) if !(r.is_finite() && r > 0.0) => {
            Err(Error::invalid_parameter("radius", r, "must be > 0"))
        }
        _ => Ok(()),
    }
}

fn validate_viewpoints(viewpoints: &[Viewpoint]) -> Result<()> {
    if viewpoints.is_empty() {
        return Err(Error::invalid_parameter("viewpoints", 0, "at least one viewpoint is required"));
    }
    for vp in viewpoints {
        check_radius(vp.radius)?;
        if !(vp.weight.is_finite() && vp.weight >= 0.0) {
            return Err(Error::invalid_parameter("weight", vp.weight, "must be >= 0"));
        }
        if !vp.observer_height.is_finite() {
            return Err(Error::invalid_parameter("observer_height", vp.observer_height, "must be finite"));
        }
    }
    Ok(())
}

fn validate_options(options: &ViewshedOptions) -> Result<()> {
    check_radius(options.radius)?;
    if let Some(zw) = &options.zone_weights {
        zw.validate()?;
    }
    if !(options.observer_height.is_finite() && options.target_height.is_finite()) {
        return Err(Error::invalid_parameter(
            "heights",
            format!("{}/{}", options.observer_height, options.target_height),
            "must be finite",
        ));
    }
    Ok(())
}

/// Binary visibility of every cell from one observer, row-major.
fn visibility_codes(
    grid: &ElevationGrid,
    observer: &Observer,
    step: f64,
    los: &LosOptions,
    monitor: &Monitor,
) -> Result<Vec<u8>> {
    let (rows, cols) = grid.shape();
    let counter = monitor.counter(rows);

    let rows_out: Vec<Vec<u8>> = (0..rows)
        .into_par_iter()
        .map(|row| {
            let mut codes = vec![HIDDEN; cols];
            for (col, code) in codes.iter_mut().enumerate() {
                let cell = Cell::new(row, col);
                let Some(z) = grid.value(cell) else {
                    *code = NODATA_CODE;
                    continue;
                };
                let (x, y) = grid.cell_center(cell);
                if !observer.in_range((x - observer.x).hypot(y - observer.y)) {
                    continue;
                }
                let verdict = clear_between(
                    grid,
                    (observer.x, observer.y, observer.eye),
                    (x, y, z + observer.target_height),
                    step,
                    los,
                )?;
                if verdict.is_visible() {
                    *code = VISIBLE;
                }
            }
            counter.advance()?;
            Ok(codes)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(rows_out.into_iter().flatten().collect())
}

fn binary_raster(grid: &ElevationGrid, codes: Vec<u8>) -> Result<Raster<u8>> {
    let (rows, cols) = grid.shape();
    let mut output = grid.raster().with_same_meta::<u8>(rows, cols);
    output.set_nodata(Some(NODATA_CODE));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), codes)
        .map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}

/// Binary viewshed from a single viewpoint.
///
/// Fails with [`Error::OutOfExtent`] or [`Error::NoData`] when the viewpoint
/// cannot be placed on the surface.
pub fn viewshed(
    grid: &ElevationGrid,
    viewpoint: &Viewpoint,
    options: &ViewshedOptions,
    monitor: &Monitor,
) -> Result<Raster<u8>> {
    validate_options(options)?;
    validate_viewpoints(std::slice::from_ref(viewpoint))?;
    let step = options.los.prepare(grid)?;

    let observer = Observer::resolve(grid, viewpoint, options)?;
    debug!(
        "viewshed from ({:.1}, {:.1}), eye {:.2}, radius {:?}",
        observer.x, observer.y, observer.eye, observer.radius
    );
    let codes = visibility_codes(grid, &observer, step, &options.los, monitor)?;
    binary_raster(grid, codes)
}

/// Run a viewshed analysis in any [`ViewshedMode`].
pub fn compute_viewshed(
    grid: &ElevationGrid,
    mode: &ViewshedMode,
    options: &ViewshedOptions,
    monitor: &Monitor,
) -> Result<ViewshedOutput> {
    validate_options(options)?;

    match mode {
        ViewshedMode::Single { viewpoint } => Ok(ViewshedOutput {
            field: VisibilityField::Binary(viewshed(grid, viewpoint, options, monitor)?),
            evaluated: 1,
            failures: Vec::new(),
        }),
        ViewshedMode::Cumulative { viewpoints } => cumulative(grid, viewpoints, options, monitor),
        ViewshedMode::Inverse { targets } => inverse(grid, targets, options, monitor),
        ViewshedMode::Linear { path, interval, closed } => {
            let points = densify_path(path, *interval, *closed)?;
            debug!("linear viewshed: {} viewpoints along the path", points.len());
            let viewpoints: Vec<Viewpoint> = points
                .into_iter()
                .map(|(x, y)| Viewpoint::new(x, y).with_observer_height(options.observer_height))
                .collect();
            cumulative(grid, &viewpoints, options, monitor)
        }
        ViewshedMode::Observers { viewpoints } => observers(grid, viewpoints, options, monitor),
    }
}

fn record_failure(failures: &mut Vec<ViewpointFailure>, index: usize, vp: &Viewpoint, err: &Error) {
    warn!("skipping viewpoint {} at ({:.1}, {:.1}): {}", index, vp.x, vp.y, err);
    failures.push(ViewpointFailure {
        index,
        x: vp.x,
        y: vp.y,
        reason: err.to_string(),
    });
}

fn cumulative(
    grid: &ElevationGrid,
    viewpoints: &[Viewpoint],
    options: &ViewshedOptions,
    monitor: &Monitor,
) -> Result<ViewshedOutput> {
    validate_viewpoints(viewpoints)?;
    let step = options.los.prepare(grid)?;

    let (rows, cols) = grid.shape();
    let n = rows * cols;
    let mut value = vec![0.0; n];
    let mut attainable = vec![0.0; n];
    let mut failures = Vec::new();
    let mut evaluated = 0;
    let counter = monitor.counter(viewpoints.len());
    let inner = monitor.silent();

    for (index, vp) in viewpoints.iter().enumerate() {
        let observer = match Observer::resolve(grid, vp, options) {
            Ok(o) => o,
            Err(e) if e.is_item_failure() => {
                record_failure(&mut failures, index, vp, &e);
                counter.advance()?;
                continue;
            }
            Err(e) => return Err(e),
        };

        let codes = visibility_codes(grid, &observer, step, &options.los, &inner)?;
        for (i, &code) in codes.iter().enumerate() {
            if code == NODATA_CODE {
                continue;
            }
            let (x, y) = grid.cell_center(Cell::from_index(i, cols));
            let d = (x - observer.x).hypot(y - observer.y);
            if !observer.in_range(d) {
                continue;
            }
            let w = vp.weight * options.zone_weights.map_or(1.0, |zw| zw.weight_at(d));
            attainable[i] += w;
            if code == VISIBLE {
                value[i] += w;
            }
        }
        evaluated += 1;
        counter.advance()?;
    }

    info!(
        "cumulative viewshed: {} of {} viewpoints evaluated",
        evaluated,
        viewpoints.len()
    );

    let mut value_out = Vec::with_capacity(n);
    let mut percent_out = Vec::with_capacity(n);
    for i in 0..n {
        let valid = grid.is_valid(Cell::from_index(i, cols)) && attainable[i] > 0.0;
        if valid {
            value_out.push(value[i]);
            percent_out.push(100.0 * value[i] / attainable[i]);
        } else {
            value_out.push(f64::NAN);
            percent_out.push(f64::NAN);
        }
    }

    let score_raster = |data: Vec<f64>| -> Result<Raster<f64>> {
        let mut r = grid.raster().with_same_meta::<f64>(rows, cols);
        r.set_nodata(Some(f64::NAN));
        *r.data_mut() = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(r)
    };

    Ok(ViewshedOutput {
        field: VisibilityField::Score {
            value: score_raster(value_out)?,
            percent: score_raster(percent_out)?,
        },
        evaluated,
        failures,
    })
}

fn observers(
    grid: &ElevationGrid,
    viewpoints: &[Viewpoint],
    options: &ViewshedOptions,
    monitor: &Monitor,
) -> Result<ViewshedOutput> {
    validate_viewpoints(viewpoints)?;
    if viewpoints.len() > MAX_IDENTIFIED_OBSERVERS {
        return Err(Error::invalid_parameter(
            "viewpoints",
            viewpoints.len(),
            format!("at most {} observers can be told apart", MAX_IDENTIFIED_OBSERVERS),
        ));
    }
    let step = options.los.prepare(grid)?;

    let (rows, cols) = grid.shape();
    let mut flags = vec![0u32; rows * cols];
    let mut failures = Vec::new();
    let mut evaluated = 0;
    let counter = monitor.counter(viewpoints.len());
    let inner = monitor.silent();

    for (index, vp) in viewpoints.iter().enumerate() {
        let observer = match Observer::resolve(grid, vp, options) {
            Ok(o) => o,
            Err(e) if e.is_item_failure() => {
                record_failure(&mut failures, index, vp, &e);
                counter.advance()?;
                continue;
            }
            Err(e) => return Err(e),
        };

        let codes = visibility_codes(grid, &observer, step, &options.los, &inner)?;
        for (bits, &code) in flags.iter_mut().zip(&codes) {
            match code {
                VISIBLE => *bits |= 1 << index,
                NODATA_CODE => *bits = OBSERVERS_NODATA,
                _ => {}
            }
        }
        evaluated += 1;
        counter.advance()?;
    }

    for (i, bits) in flags.iter_mut().enumerate() {
        if !grid.is_valid(Cell::from_index(i, cols)) {
            *bits = OBSERVERS_NODATA;
        }
    }
    info!(
        "observer viewshed: {} of {} viewpoints evaluated",
        evaluated,
        viewpoints.len()
    );

    let mut output = grid.raster().with_same_meta::<u32>(rows, cols);
    output.set_nodata(Some(OBSERVERS_NODATA));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), flags)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(ViewshedOutput {
        field: VisibilityField::Observers(output),
        evaluated,
        failures,
    })
}

fn inverse(
    grid: &ElevationGrid,
    targets: &[Viewpoint],
    options: &ViewshedOptions,
    monitor: &Monitor,
) -> Result<ViewshedOutput> {
    validate_viewpoints(targets)?;
    let step = options.los.prepare(grid)?;

    // Each reference target is looked at, so its absolute height is ground
    // plus its target offset.
    let mut failures = Vec::new();
    let mut resolved = Vec::new();
    for (index, t) in targets.iter().enumerate() {
        let as_target = Viewpoint {
            observer_height: t.target_height.unwrap_or(options.target_height),
            ..t.clone()
        };
        match Observer::resolve(grid, &as_target, options) {
            Ok(o) => resolved.push(o),
            Err(e) if e.is_item_failure() => record_failure(&mut failures, index, t, &e),
            Err(e) => return Err(e),
        }
    }

    let (rows, cols) = grid.shape();
    let counter = monitor.counter(rows);

    let rows_out: Vec<Vec<u8>> = (0..rows)
        .into_par_iter()
        .map(|row| {
            let mut codes = vec![HIDDEN; cols];
            for (col, code) in codes.iter_mut().enumerate() {
                let cell = Cell::new(row, col);
                let Some(z) = grid.value(cell) else {
                    *code = NODATA_CODE;
                    continue;
                };
                let (x, y) = grid.cell_center(cell);
                let eye = z + options.observer_height;
                for t in &resolved {
                    if !t.in_range((t.x - x).hypot(t.y - y)) {
                        continue;
                    }
                    let verdict =
                        clear_between(grid, (x, y, eye), (t.x, t.y, t.eye), step, &options.los)?;
                    if verdict.is_visible() {
                        *code = VISIBLE;
                        break;
                    }
                }
            }
            counter.advance()?;
            Ok(codes)
        })
        .collect::<Result<Vec<_>>>()?;

    info!(
        "inverse viewshed: {} of {} reference targets usable",
        resolved.len(),
        targets.len()
    );

    Ok(ViewshedOutput {
        field: VisibilityField::Binary(binary_raster(grid, rows_out.into_iter().flatten().collect())?),
        evaluated: resolved.len(),
        failures,
    })
}

/// Points every `interval` along a polyline, vertices included.
///
/// Each segment of length `L` is split into `max(1, floor(L / interval))`
/// equal parts; shared vertices appear once.
pub fn densify_path(path: &[(f64, f64)], interval: f64, closed: bool) -> Result<Vec<(f64, f64)>> {
    if !(interval.is_finite() && interval > 0.0) {
        return Err(Error::invalid_parameter("interval", interval, "must be > 0"));
    }
    if path.is_empty() {
        return Err(Error::invalid_parameter("path", 0, "path has no vertices"));
    }

    let mut vertices = path.to_vec();
    if closed && path.len() > 2 && path.first() != path.last() {
        vertices.push(path[0]);
    }

    let mut points = vec![vertices[0]];
    for pair in vertices.windows(2) {
        let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
        let len = (x1 - x0).hypot(y1 - y0);
        if len == 0.0 {
            continue;
        }
        let parts = ((len / interval).floor() as usize).max(1);
        for i in 1..=parts {
            let t = i as f64 / parts as f64;
            points.push((x0 + t * (x1 - x0), y0 + t * (y1 - y0)));
        }
    }

    if closed && points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    Ok(points)
}
