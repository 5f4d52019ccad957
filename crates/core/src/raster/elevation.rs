//! Immutable elevation grid with extent-aware sampling
//!
//! `ElevationGrid` is the substrate every analysis runs on. It validates its
//! georeferencing once at construction and normalises every no-data sentinel
//! to NaN, so downstream code only has to test `is_nan`.

use serde::{Deserialize, Serialize};

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{Cell, Direction, GeoTransform, Raster};

/// Interpolation used when sampling at arbitrary map coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampling {
    /// Value of the containing cell
    Nearest,
    /// Bilinear blend of the four surrounding cell centres
    #[default]
    Bilinear,
}

/// Outcome of sampling inside the grid extent
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Value(f64),
    NoData,
}

impl Sample {
    pub fn value(self) -> Option<f64> {
        match self {
            Sample::Value(z) => Some(z),
            Sample::NoData => None,
        }
    }

    pub fn is_nodata(self) -> bool {
        matches!(self, Sample::NoData)
    }
}

/// Horn (1981) surface derivatives at one cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlopeAspect {
    /// Magnitude of the gradient, rise over run
    pub gradient: f64,
    /// Slope angle in degrees
    pub slope_degrees: f64,
    /// Downslope direction, degrees clockwise from north; `None` on flat cells
    pub aspect_degrees: Option<f64>,
}

/// An 8-neighbour of a cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub cell: Cell,
    pub direction: Direction,
    /// Planar distance between the two cell centres
    pub distance: f64,
}

/// A validated, immutable elevation raster.
#[derive(Debug, Clone)]
pub struct ElevationGrid {
    raster: Raster<f64>,
    sx: f64,
    sy: f64,
}

impl ElevationGrid {
    /// Wrap a raster, validating it.
    ///
    /// Fails with [`Error::InvalidGrid`] for an empty buffer, a non-positive or
    /// non-finite cell size, or a rotated transform. Cells equal to the
    /// raster's no-data value become NaN.
    pub fn new(raster: Raster<f64>) -> Result<Self> {
        if raster.is_empty() {
            return Err(Error::InvalidGrid("empty value buffer".into()));
        }

        let transform = *raster.transform();
        let (sx, sy) = (transform.cell_width(), transform.cell_height());
        if !(sx.is_finite() && sy.is_finite() && sx > 0.0 && sy > 0.0) {
            return Err(Error::InvalidGrid(format!(
                "cell size must be positive, got {} x {}",
                transform.pixel_width, transform.pixel_height
            )));
        }
        if !transform.is_north_up() {
            return Err(Error::InvalidGrid("rotated transforms are not supported".into()));
        }
        if !(transform.origin_x.is_finite() && transform.origin_y.is_finite()) {
            return Err(Error::InvalidGrid("origin must be finite".into()));
        }

        let nodata = raster.nodata();
        let mut raster = raster;
        if let Some(nd) = nodata.filter(|nd| !nd.is_nan()) {
            raster.data_mut().mapv_inplace(|v| if v == nd { f64::NAN } else { v });
        }
        raster.data_mut().mapv_inplace(|v| if v.is_finite() { v } else { f64::NAN });
        raster.set_nodata(Some(f64::NAN));

        Ok(Self { raster, sx, sy })
    }

    /// Build a grid from row-major values.
    pub fn from_vec(
        values: Vec<f64>,
        rows: usize,
        cols: usize,
        transform: GeoTransform,
        nodata: Option<f64>,
    ) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidGrid(format!("{}x{} grid has no cells", rows, cols)));
        }
        let mut raster = Raster::from_vec(values, rows, cols)?;
        raster.set_transform(transform);
        raster.set_nodata(nodata);
        Self::new(raster)
    }

    /// Underlying raster; no-data cells are NaN
    pub fn raster(&self) -> &Raster<f64> {
        &self.raster
    }

    pub fn rows(&self) -> usize {
        self.raster.rows()
    }

    pub fn cols(&self) -> usize {
        self.raster.cols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.raster.shape()
    }

    pub fn transform(&self) -> &GeoTransform {
        self.raster.transform()
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.raster.crs()
    }

    /// Cell size (sx, sy) in map units
    pub fn cell_size(&self) -> (f64, f64) {
        (self.sx, self.sy)
    }

    pub fn cell_area(&self) -> f64 {
        self.sx * self.sy
    }

    /// Smaller of the two cell dimensions
    pub fn min_cell_size(&self) -> f64 {
        self.sx.min(self.sy)
    }

    /// (min_x, min_y, max_x, max_y)
    pub fn extent(&self) -> (f64, f64, f64, f64) {
        self.raster.bounds()
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        let (min_x, min_y, max_x, max_y) = self.extent();
        x >= min_x && x <= max_x && y >= min_y && y <= max_y
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.row < self.rows() && cell.col < self.cols()
    }

    /// Elevation of a cell; `None` for no-data or out-of-grid cells
    #[inline]
    pub fn value(&self, cell: Cell) -> Option<f64> {
        self.raster
            .data()
            .get((cell.row, cell.col))
            .copied()
            .filter(|z| !z.is_nan())
    }

    #[inline]
    pub fn is_valid(&self, cell: Cell) -> bool {
        self.value(cell).is_some()
    }

    /// Map coordinates of a cell centre
    pub fn cell_center(&self, cell: Cell) -> (f64, f64) {
        self.raster.pixel_to_geo(cell.col, cell.row)
    }

    /// Cell containing a map coordinate.
    ///
    /// Points on the outer edge of the extent belong to the edge cells.
    pub fn cell_at(&self, x: f64, y: f64) -> Result<Cell> {
        if !self.contains(x, y) {
            return Err(Error::OutOfExtent { x, y });
        }
        let (col_f, row_f) = self.raster.geo_to_pixel(x, y);
        let col = (col_f.floor().max(0.0) as usize).min(self.cols() - 1);
        let row = (row_f.floor().max(0.0) as usize).min(self.rows() - 1);
        Ok(Cell::new(row, col))
    }

    /// Sample the surface at a map coordinate.
    ///
    /// Outside the extent this is always [`Error::OutOfExtent`]; inside it
    /// yields either a value or [`Sample::NoData`], never a default number.
    /// Bilinear sampling falls back to the nearest cell when any of the four
    /// surrounding cells is no-data, and clamps to the edge cells between the
    /// outermost cell centres and the extent boundary.
    pub fn sample(&self, x: f64, y: f64, method: Sampling) -> Result<Sample> {
        let nearest = self.cell_at(x, y)?;
        let nearest_sample = || match self.value(nearest) {
            Some(z) => Sample::Value(z),
            None => Sample::NoData,
        };

        if method == Sampling::Nearest {
            return Ok(nearest_sample());
        }

        let (rows, cols) = self.shape();
        let (col_f, row_f) = self.raster.geo_to_pixel(x, y);
        let u = (col_f - 0.5).clamp(0.0, (cols - 1) as f64);
        let v = (row_f - 0.5).clamp(0.0, (rows - 1) as f64);

        let c0 = (u.floor() as usize).min(cols.saturating_sub(2));
        let r0 = (v.floor() as usize).min(rows.saturating_sub(2));
        let c1 = (c0 + 1).min(cols - 1);
        let r1 = (r0 + 1).min(rows - 1);
        let tx = u - c0 as f64;
        let ty = v - r0 as f64;

        let corners = [
            self.value(Cell::new(r0, c0)),
            self.value(Cell::new(r0, c1)),
            self.value(Cell::new(r1, c0)),
            self.value(Cell::new(r1, c1)),
        ];

        match corners {
            [Some(z00), Some(z01), Some(z10), Some(z11)] => {
                let top = z00 + (z01 - z00) * tx;
                let bottom = z10 + (z11 - z10) * tx;
                Ok(Sample::Value(top + (bottom - top) * ty))
            }
            _ => Ok(nearest_sample()),
        }
    }

    /// Horn (1981) slope and aspect from the 3x3 neighbourhood.
    ///
    /// ```text
    /// a b c
    /// d e f
    /// g h i
    /// ```
    ///
    /// `None` on border cells and wherever the window touches no-data.
    pub fn slope_at(&self, cell: Cell) -> Option<SlopeAspect> {
        let (rows, cols) = self.shape();
        if cell.row == 0 || cell.col == 0 || cell.row + 1 >= rows || cell.col + 1 >= cols {
            return None;
        }
        self.value(cell)?;

        let z = |dr: isize, dc: isize| {
            self.value(Cell::new(
                cell.row.wrapping_add_signed(dr),
                cell.col.wrapping_add_signed(dc),
            ))
        };
        let (a, b, c) = (z(-1, -1)?, z(-1, 0)?, z(-1, 1)?);
        let (d, f) = (z(0, -1)?, z(0, 1)?);
        let (g, h, i) = (z(1, -1)?, z(1, 0)?, z(1, 1)?);

        // Eastward and northward rates of change.
        let dz_dx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * self.sx);
        let dz_dn = ((a + 2.0 * b + c) - (g + 2.0 * h + i)) / (8.0 * self.sy);

        let gradient = dz_dx.hypot(dz_dn);
        let aspect_degrees = (gradient > 1e-12).then(|| {
            let deg = (-dz_dx).atan2(-dz_dn).to_degrees();
            if deg < 0.0 { deg + 360.0 } else { deg }
        });

        Some(SlopeAspect {
            gradient,
            slope_degrees: gradient.atan().to_degrees(),
            aspect_degrees,
        })
    }

    /// Valid 8-neighbours of a cell.
    ///
    /// Off-grid and no-data neighbours are skipped; a no-data cell has no
    /// neighbours at all.
    pub fn neighbors8(&self, cell: Cell) -> impl Iterator<Item = Neighbor> + '_ {
        let (rows, cols) = self.shape();
        let center_valid = self.is_valid(cell);
        Direction::ALL.into_iter().filter_map(move |direction| {
            if !center_valid {
                return None;
            }
            let next = cell.step(direction, rows, cols)?;
            self.is_valid(next).then(|| Neighbor {
                cell: next,
                direction,
                distance: direction.distance(self.sx, self.sy),
            })
        })
    }
}
