//! Ring visibility around a centre
//!
//! Observers are laid on a circle of `radius` around the centre, one every
//! `interval` of circumference (never fewer than `min_points`), starting due
//! north and going clockwise. Each one looks back at the centre; the share
//! that sees it is the surveillance percentage of the ring.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::los::{clear_between, LineOfSight};
use super::viewshed::ViewshedOptions;
use crate::maybe_rayon::*;
use archterra_core::raster::ElevationGrid;
use archterra_core::{Error, Monitor, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingOptions {
    pub radius: f64,
    /// Spacing of observers along the circumference
    pub interval: f64,
    pub min_points: usize,
}

impl Default for RingOptions {
    fn default() -> Self {
        Self {
            radius: 1000.0,
            interval: 50.0,
            min_points: 8,
        }
    }
}

impl RingOptions {
    fn validate(&self) -> Result<()> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(Error::invalid_parameter("radius", self.radius, "must be > 0"));
        }
        if !(self.interval.is_finite() && self.interval > 0.0) {
            return Err(Error::invalid_parameter("interval", self.interval, "must be > 0"));
        }
        if self.min_points < 3 {
            return Err(Error::invalid_parameter("min_points", self.min_points, "must be >= 3"));
        }
        Ok(())
    }

    /// Number of observers on the ring
    pub fn point_count(&self) -> usize {
        let by_interval = (2.0 * std::f64::consts::PI * self.radius / self.interval).floor() as usize;
        by_interval.max(self.min_points)
    }
}

/// One observer on the ring
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RingPoint {
    pub x: f64,
    pub y: f64,
    /// Degrees clockwise from north, seen from the centre
    pub azimuth: f64,
    /// `None` when the point is off the grid or on no-data
    pub line_of_sight: Option<LineOfSight>,
}

impl RingPoint {
    /// Whether the point took part in the percentage
    pub fn is_evaluated(&self) -> bool {
        matches!(
            self.line_of_sight,
            Some(LineOfSight::Visible) | Some(LineOfSight::Blocked { .. })
        )
    }

    pub fn is_visible(&self) -> bool {
        matches!(self.line_of_sight, Some(LineOfSight::Visible))
    }
}

/// Stretch of the ring between consecutive observers, carrying the status
/// of the one it starts from
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RingSegment {
    pub from: (f64, f64),
    pub to: (f64, f64),
    /// `None` when the starting observer was not evaluated
    pub visible: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RingVisibility {
    pub centre: (f64, f64),
    pub radius: f64,
    pub points: Vec<RingPoint>,
    pub visible: usize,
    pub evaluated: usize,
    /// `100 * visible / evaluated`, 0 when nothing was evaluated
    pub surveillance_percent: f64,
}

impl RingVisibility {
    pub fn segments(&self) -> Vec<RingSegment> {
        let n = self.points.len();
        (0..n)
            .map(|i| {
                let (a, b) = (&self.points[i], &self.points[(i + 1) % n]);
                RingSegment {
                    from: (a.x, a.y),
                    to: (b.x, b.y),
                    visible: a.is_evaluated().then(|| a.is_visible()),
                }
            })
            .collect()
    }
}

/// Ground elevation at a map position; `None` off the grid or on no-data
fn ground_at(grid: &ElevationGrid, x: f64, y: f64, options: &ViewshedOptions) -> Result<Option<f64>> {
    match grid.sample(x, y, options.los.sampling) {
        Ok(s) => Ok(s.value()),
        Err(Error::OutOfExtent { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Test every ring observer against the centre.
///
/// Observers stand `options.observer_height` above ground and look at the
/// centre raised by `options.target_height`. A centre outside the grid or on
/// no-data is an error; ring points there are reported and left out of the
/// percentage.
pub fn ring_visibility(
    grid: &ElevationGrid,
    centre: (f64, f64),
    ring: &RingOptions,
    options: &ViewshedOptions,
    monitor: &Monitor,
) -> Result<RingVisibility> {
    ring.validate()?;
    let step = options.los.prepare(grid)?;

    let cell = grid.cell_at(centre.0, centre.1)?;
    let target = ground_at(grid, centre.0, centre.1, options)?
        .ok_or(Error::NoData { row: cell.row, col: cell.col })?
        + options.target_height;

    let n = ring.point_count();
    debug!("ring of {} observers, radius {:.1}", n, ring.radius);
    let counter = monitor.counter(n);

    let points: Vec<RingPoint> = (0..n)
        .into_par_iter()
        .map(|i| {
            let azimuth = 360.0 * i as f64 / n as f64;
            let (sin, cos) = azimuth.to_radians().sin_cos();
            let (x, y) = (centre.0 + ring.radius * sin, centre.1 + ring.radius * cos);

            let line_of_sight = match ground_at(grid, x, y, options)? {
                Some(z) => Some(clear_between(
                    grid,
                    (x, y, z + options.observer_height),
                    (centre.0, centre.1, target),
                    step,
                    &options.los,
                )?),
                None => None,
            };
            counter.advance()?;
            Ok(RingPoint {
                x,
                y,
                azimuth,
                line_of_sight,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let evaluated = points.iter().filter(|p| p.is_evaluated()).count();
    let visible = points.iter().filter(|p| p.is_visible()).count();
    let surveillance_percent = if evaluated > 0 {
        100.0 * visible as f64 / evaluated as f64
    } else {
        0.0
    };
    info!(
        "ring visibility: {} of {} observers see the centre ({:.1}%)",
        visible, evaluated, surveillance_percent
    );

    Ok(RingVisibility {
        centre,
        radius: ring.radius,
        points,
        visible,
        evaluated,
        surveillance_percent,
    })
}
