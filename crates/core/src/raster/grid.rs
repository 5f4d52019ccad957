//! Georeferenced raster container

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::{Array2, ArrayView2};

/// A georeferenced 2D grid of cell values.
///
/// Every product of the engine (visibility fields, accumulated costs,
/// predecessor codes, corridors) is a `Raster` congruent with the elevation
/// grid it was derived from, so outputs can be overlaid without resampling.
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Row-major cell values, indexed (row, col)
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from a row-major vector
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray, with default georeferencing
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Zero-filled raster of another element type sharing this raster's georeferencing
    pub fn with_same_meta<U: RasterElement>(&self, rows: usize, cols: usize) -> Raster<U> {
        Raster {
            data: Array2::zeros((rows, cols)),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: None,
        }
    }

    /// Raster with the same shape and metadata, filled with a value
    pub fn like(&self, fill_value: T) -> Self {
        Self {
            data: Array2::from_elem(self.data.dim(), fill_value),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: self.nodata,
        }
    }

    /// Apply `f` to every cell, keeping georeferencing
    pub fn map<U: RasterElement>(&self, f: impl Fn(T) -> U) -> Raster<U> {
        Raster {
            data: self.data.mapv(f),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: None,
        }
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether `other` has the same shape as this raster
    pub fn is_congruent<U: RasterElement>(&self, other: &Raster<U>) -> bool {
        self.shape() == other.shape()
    }

    /// Fail with [`Error::SizeMismatch`] unless `other` has this raster's shape
    pub fn ensure_congruent<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        if self.is_congruent(other) {
            return Ok(());
        }
        Err(Error::SizeMismatch {
            er: self.rows(),
            ec: self.cols(),
            ar: other.rows(),
            ac: other.cols(),
        })
    }

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Get value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Mean cell size in map units
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Map coordinates of a cell centre
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Fractional (col, row) of a map coordinate
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        self.transform.geo_to_pixel(x, y)
    }

    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Count cells satisfying a predicate
    pub fn count_where(&self, predicate: impl Fn(T) -> bool) -> usize {
        self.data.iter().filter(|&&v| predicate(v)).count()
    }

    /// Min, max and mean over valid cells; non-finite floats are skipped.
    pub fn statistics(&self) -> RasterStatistics {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut count = 0usize;

        for &value in self.data.iter() {
            if self.is_nodata(value) {
                continue;
            }
            let Some(v) = value.to_f64().filter(|v| v.is_finite()) else {
                continue;
            };
            min = min.min(v);
            max = max.max(v);
            sum += v;
            count += 1;
        }

        RasterStatistics {
            min: (count > 0).then_some(min),
            max: (count > 0).then_some(max),
            mean: (count > 0).then(|| sum / count as f64),
            valid_count: count,
            invalid_count: self.len() - count,
        }
    }
}

/// Summary statistics over the valid cells of a raster
#[derive(Debug, Clone, PartialEq)]
pub struct RasterStatistics {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    /// No-data and non-finite cells
    pub invalid_count: usize,
}
