//! Slope and aspect rasters
//!
//! Whole-grid versions of [`ElevationGrid::slope_at`], which applies the
//! Horn (1981) 3x3 operator with separate x/y cell sizes.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::maybe_rayon::*;
use archterra_core::raster::{Cell, ElevationGrid, Raster};
use archterra_core::{Algorithm, Error, Result};

/// Units for slope output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlopeUnits {
    /// Degrees (0-90)
    #[default]
    Degrees,
    /// Percent rise over run
    Percent,
    /// Radians (0-π/2)
    Radians,
}

/// Parameters for slope calculation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlopeParams {
    pub units: SlopeUnits,
    /// Vertical exaggeration applied to the gradient (default 1.0)
    pub z_factor: f64,
}

impl Default for SlopeParams {
    fn default() -> Self {
        Self {
            units: SlopeUnits::Degrees,
            z_factor: 1.0,
        }
    }
}

/// Slope algorithm
#[derive(Debug, Clone, Default)]
pub struct Slope;

impl Algorithm for Slope {
    type Input = ElevationGrid;
    type Output = Raster<f64>;
    type Params = SlopeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Slope"
    }

    fn description(&self) -> &'static str {
        "Slope of an elevation grid using Horn's method"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        slope(&input, &params)
    }
}

/// Calculate slope for every cell.
///
/// Border cells and cells whose 3x3 window touches no-data are NaN.
pub fn slope(dem: &ElevationGrid, params: &SlopeParams) -> Result<Raster<f64>> {
    if !(params.z_factor.is_finite() && params.z_factor > 0.0) {
        return Err(Error::invalid_parameter("z_factor", params.z_factor, "must be > 0"));
    }

    let (rows, cols) = dem.shape();
    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| match dem.slope_at(Cell::new(row, col)) {
                    Some(sa) => {
                        let rad = (sa.gradient * params.z_factor).atan();
                        match params.units {
                            SlopeUnits::Degrees => rad.to_degrees(),
                            SlopeUnits::Percent => rad.tan() * 100.0,
                            SlopeUnits::Radians => rad,
                        }
                    }
                    None => f64::NAN,
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let mut output = dem.raster().with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}

/// Aspect in degrees clockwise from north.
///
/// Flat cells get -1, matching the common GIS convention; border and
/// no-data cells are NaN.
pub fn aspect(dem: &ElevationGrid) -> Result<Raster<f64>> {
    let (rows, cols) = dem.shape();
    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| match dem.slope_at(Cell::new(row, col)) {
                    Some(sa) => sa.aspect_degrees.unwrap_or(-1.0),
                    None => f64::NAN,
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let mut output = dem.raster().with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use archterra_core::GeoTransform;

    fn create_test_dem() -> ElevationGrid {
        // Tilted plane z = row + col on 1 m cells
        let values = (0..100).map(|i| (i / 10 + i % 10) as f64).collect();
        ElevationGrid::from_vec(values, 10, 10, GeoTransform::new(0.0, 10.0, 1.0, -1.0), None)
            .unwrap()
    }

    #[test]
    fn test_slope_flat() {
        let dem = ElevationGrid::from_vec(
            vec![100.0; 100],
            10,
            10,
            GeoTransform::new(0.0, 10.0, 1.0, -1.0),
            None,
        )
        .unwrap();

        let result = slope(&dem, &SlopeParams::default()).unwrap();
        let val = result.get(5, 5).unwrap();
        assert!(val.abs() < 0.001, "Expected ~0 slope for flat surface, got {}", val);
        assert!(result.get(0, 5).unwrap().is_nan(), "Border should be NaN");
    }

    #[test]
    fn test_slope_units() {
        let dem = create_test_dem();

        let deg = slope(&dem, &SlopeParams { units: SlopeUnits::Degrees, z_factor: 1.0 }).unwrap();
        let rad = slope(&dem, &SlopeParams { units: SlopeUnits::Radians, z_factor: 1.0 }).unwrap();
        let pct = slope(&dem, &SlopeParams { units: SlopeUnits::Percent, z_factor: 1.0 }).unwrap();

        let deg_val = deg.get(5, 5).unwrap();
        let rad_val = rad.get(5, 5).unwrap();
        let pct_val = pct.get(5, 5).unwrap();

        assert!((deg_val - rad_val.to_degrees()).abs() < 0.001, "Degree/radian mismatch");
        assert!((pct_val - 2.0_f64.sqrt() * 100.0).abs() < 0.001, "Percent mismatch: {}", pct_val);
    }

    #[test]
    fn test_aspect_tilted() {
        // z = row + col rises to the south-east, so the surface faces north-west
        let dem = create_test_dem();
        let result = aspect(&dem).unwrap();
        let val = result.get(4, 4).unwrap();
        assert!((val - 315.0).abs() < 1e-9, "Expected 315, got {}", val);
    }

    #[test]
    fn test_slope_algorithm_trait() {
        let out = Slope.execute_default(create_test_dem()).unwrap();
        assert_eq!(out.shape(), (10, 10));
        assert_eq!(Slope.name(), "Slope");
    }

    #[test]
    fn test_invalid_z_factor() {
        let dem = create_test_dem();
        assert!(slope(&dem, &SlopeParams { z_factor: 0.0, ..Default::default() }).is_err());
    }
}
