//! Isolines via marching squares
//!
//! Works on any continuous field (elevation, accumulated cost) sampled at
//! cell centres. Blocks touching a non-finite value (no-data, unreachable)
//! produce no segments, so unreachable regions never leak into isochrones.

use serde::{Deserialize, Serialize};

use crate::maybe_rayon::*;
use archterra_core::raster::Raster;
use archterra_core::{Error, Result};

/// Regularly spaced contour levels
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourParams {
    /// Difference between successive levels
    pub interval: f64,
    /// Levels are generated at base + n * interval
    pub base: f64,
}

impl Default for ContourParams {
    fn default() -> Self {
        Self {
            interval: 10.0,
            base: 0.0,
        }
    }
}

/// All segments of one level, in map coordinates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Isoline {
    pub level: f64,
    pub segments: Vec<[(f64, f64); 2]>,
}

impl Isoline {
    /// Total length of the segments in map units
    pub fn length(&self) -> f64 {
        self.segments
            .iter()
            .map(|[(x0, y0), (x1, y1)]| (x1 - x0).hypot(y1 - y0))
            .sum()
    }
}

/// Levels `base + n * interval` falling inside the finite range of `field`.
pub fn contour_levels(field: &Raster<f64>, params: &ContourParams) -> Result<Vec<f64>> {
    if !(params.interval.is_finite() && params.interval > 0.0) {
        return Err(Error::invalid_parameter("interval", params.interval, "must be > 0"));
    }

    let stats = field.statistics();
    let (Some(lo), Some(hi)) = (stats.min, stats.max) else {
        return Ok(Vec::new());
    };

    let first = ((lo - params.base) / params.interval).ceil() as i64;
    let last = ((hi - params.base) / params.interval).floor() as i64;
    Ok((first..=last)
        .map(|n| params.base + n as f64 * params.interval)
        .collect())
}

/// Trace isolines of `field` at each of `levels`.
pub fn isolines(field: &Raster<f64>, levels: &[f64]) -> Result<Vec<Isoline>> {
    if let Some(bad) = levels.iter().find(|l| !l.is_finite()) {
        return Err(Error::invalid_parameter("levels", bad, "levels must be finite"));
    }

    let lines: Vec<Isoline> = levels
        .to_vec()
        .into_par_iter()
        .map(|level| Isoline {
            level,
            segments: march(field, level),
        })
        .collect();

    Ok(lines)
}

#[derive(Clone, Copy)]
enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

/// Segment table indexed by corner bits tl=8, tr=4, br=2, bl=1.
/// Saddles (5, 10) are resolved separately.
const CASES: [&[(Edge, Edge)]; 16] = [
    &[],
    &[(Edge::Left, Edge::Bottom)],
    &[(Edge::Bottom, Edge::Right)],
    &[(Edge::Left, Edge::Right)],
    &[(Edge::Top, Edge::Right)],
    &[],
    &[(Edge::Top, Edge::Bottom)],
    &[(Edge::Left, Edge::Top)],
    &[(Edge::Left, Edge::Top)],
    &[(Edge::Top, Edge::Bottom)],
    &[],
    &[(Edge::Top, Edge::Right)],
    &[(Edge::Left, Edge::Right)],
    &[(Edge::Bottom, Edge::Right)],
    &[(Edge::Left, Edge::Bottom)],
    &[],
];

fn march(field: &Raster<f64>, level: f64) -> Vec<[(f64, f64); 2]> {
    let (rows, cols) = field.shape();
    if rows < 2 || cols < 2 {
        return Vec::new();
    }

    let gt = *field.transform();
    let data = field.data();
    // Map coordinates of a fractional position in cell-centre space
    let to_map = |r: f64, c: f64| {
        (
            gt.origin_x + (c + 0.5) * gt.pixel_width,
            gt.origin_y + (r + 0.5) * gt.pixel_height,
        )
    };

    let mut segments = Vec::new();
    for r in 0..rows - 1 {
        for c in 0..cols - 1 {
            let tl = data[(r, c)];
            let tr = data[(r, c + 1)];
            let br = data[(r + 1, c + 1)];
            let bl = data[(r + 1, c)];
            if ![tl, tr, br, bl].iter().all(|v| v.is_finite()) {
                continue;
            }

            let bit = |v: f64, b: usize| if v >= level { b } else { 0 };
            let case = bit(tl, 8) | bit(tr, 4) | bit(br, 2) | bit(bl, 1);

            let frac = |a: f64, b: f64| (level - a) / (b - a);
            let point = |edge: Edge| {
                let (rf, cf) = (r as f64, c as f64);
                match edge {
                    Edge::Top => to_map(rf, cf + frac(tl, tr)),
                    Edge::Right => to_map(rf + frac(tr, br), cf + 1.0),
                    Edge::Bottom => to_map(rf + 1.0, cf + frac(bl, br)),
                    Edge::Left => to_map(rf + frac(tl, bl), cf),
                }
            };

            let center_above = (tl + tr + br + bl) / 4.0 >= level;
            let pairs: &[(Edge, Edge)] = match (case, center_above) {
                (5, true) | (10, false) => &[(Edge::Left, Edge::Top), (Edge::Bottom, Edge::Right)],
                (5, false) | (10, true) => &[(Edge::Top, Edge::Right), (Edge::Left, Edge::Bottom)],
                _ => CASES[case],
            };

            for &(a, b) in pairs {
                segments.push([point(a), point(b)]);
            }
        }
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use archterra_core::GeoTransform;

    fn row_ramp(rows: usize, cols: usize) -> Raster<f64> {
        let mut r = Raster::new(rows, cols);
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        for row in 0..rows {
            for col in 0..cols {
                r.set(row, col, row as f64).unwrap();
            }
        }
        r
    }

    #[test]
    fn test_horizontal_isoline() {
        let r = row_ramp(6, 5);
        let lines = isolines(&r, &[2.5]).unwrap();
        assert_eq!(lines.len(), 1);

        let segs = &lines[0].segments;
        assert_eq!(segs.len(), 4, "One segment per column block");
        // Level 2.5 lies halfway between row centres 2 and 3: y = 6 - 3.0
        for [(_, y0), (_, y1)] in segs {
            assert!((y0 - 3.0).abs() < 1e-10, "got {}", y0);
            assert!((y1 - 3.0).abs() < 1e-10, "got {}", y1);
        }
        assert!((lines[0].length() - 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_non_finite_blocks_are_skipped() {
        let mut r = row_ramp(6, 5);
        for row in 0..6 {
            r.set(row, 0, f64::INFINITY).unwrap();
        }
        let lines = isolines(&r, &[2.5]).unwrap();
        assert_eq!(lines[0].segments.len(), 3);
    }

    #[test]
    fn test_levels_from_interval() {
        let r = row_ramp(20, 3);
        let levels = contour_levels(&r, &ContourParams { interval: 5.0, base: 0.0 }).unwrap();
        assert_eq!(levels, vec![0.0, 5.0, 10.0, 15.0]);

        let levels = contour_levels(&r, &ContourParams { interval: 10.0, base: 3.0 }).unwrap();
        assert_eq!(levels, vec![3.0, 13.0]);
    }

    #[test]
    fn test_contour_interval_error() {
        let r = row_ramp(5, 5);
        let result = contour_levels(&r, &ContourParams { interval: 0.0, base: 0.0 });
        assert!(result.is_err());
    }

    #[test]
    fn test_saddle_produces_two_segments() {
        let mut r = Raster::from_vec(vec![1.0, 0.0, 0.0, 1.0], 2, 2).unwrap();
        r.set_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0));
        let lines = isolines(&r, &[0.5]).unwrap();
        assert_eq!(lines[0].segments.len(), 2);
    }
}
