//! Isochrones of an accumulated cost field

use serde::{Deserialize, Serialize};

use super::accumulate::AccumulatedCostField;
use crate::terrain::{isolines, Isoline};
use archterra_core::raster::Raster;
use archterra_core::{Error, Result};

/// Band code for unreachable cells
pub const UNREACHABLE_BAND: u8 = 255;

/// Isochrone levels in cost units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsochroneParams {
    pub levels: Vec<f64>,
}

impl Default for IsochroneParams {
    fn default() -> Self {
        // 15, 30, 45 and 60 minutes
        Self {
            levels: vec![900.0, 1800.0, 2700.0, 3600.0],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Isochrones {
    pub levels: Vec<f64>,
    /// 1-based index of the first level a cell's cost does not exceed,
    /// 0 beyond the last level, [`UNREACHABLE_BAND`] where unreached
    pub bands: Raster<u8>,
    pub lines: Vec<Isoline>,
}

pub fn isochrones(field: &AccumulatedCostField, params: &IsochroneParams) -> Result<Isochrones> {
    let mut levels = params.levels.clone();
    if levels.is_empty() || levels.len() >= UNREACHABLE_BAND as usize {
        return Err(Error::invalid_parameter("levels", levels.len(), "need 1 to 254 levels"));
    }
    if let Some(bad) = levels.iter().find(|l| !(l.is_finite() && **l > 0.0)) {
        return Err(Error::invalid_parameter("levels", bad, "levels must be finite and > 0"));
    }
    levels.sort_by(f64::total_cmp);
    levels.dedup();

    let mut bands = field.cost().map(|c| {
        if !c.is_finite() {
            UNREACHABLE_BAND
        } else {
            levels
                .iter()
                .position(|&l| c <= l)
                .map_or(0, |i| (i + 1) as u8)
        }
    });
    bands.set_nodata(Some(UNREACHABLE_BAND));

    let lines = isolines(field.cost(), &levels)?;
    Ok(Isochrones { levels, bands, lines })
}
