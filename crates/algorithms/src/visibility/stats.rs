//! Summary statistics of a visibility field

use serde::Serialize;

use super::viewshed::{VisibilityField, NODATA_CODE, VISIBLE};
use archterra_core::raster::Raster;
use archterra_core::{Error, Result};

/// Visible share of an area of interest
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisibilityStats {
    pub visible_cells: usize,
    /// Valid cells inside the area of interest
    pub aoi_cells: usize,
    pub visible_area: f64,
    pub aoi_area: f64,
    /// `visible_cells / aoi_cells`, 0 for an empty area
    pub visible_ratio: f64,
}

/// Count visible cells, optionally restricted to an area-of-interest mask
/// (non-zero, non-nodata cells of `aoi`).
pub fn visibility_stats(field: &VisibilityField, aoi: Option<&Raster<u8>>) -> Result<VisibilityStats> {
    let mask = field.visible_mask();
    if let Some(aoi) = aoi {
        mask.ensure_congruent(aoi)?;
    }

    let cell_area = mask.transform().cell_area();
    if !(cell_area.is_finite() && cell_area > 0.0) {
        return Err(Error::InvalidGrid(format!("cell area {} is not positive", cell_area)));
    }

    let mut visible_cells = 0;
    let mut aoi_cells = 0;
    for ((row, col), &code) in mask.data().indexed_iter() {
        if code == NODATA_CODE {
            continue;
        }
        if let Some(aoi) = aoi {
            let inside = aoi.data()[(row, col)];
            if inside == 0 || aoi.is_nodata(inside) {
                continue;
            }
        }
        aoi_cells += 1;
        if code == VISIBLE {
            visible_cells += 1;
        }
    }

    Ok(VisibilityStats {
        visible_cells,
        aoi_cells,
        visible_area: visible_cells as f64 * cell_area,
        aoi_area: aoi_cells as f64 * cell_area,
        visible_ratio: if aoi_cells > 0 {
            visible_cells as f64 / aoi_cells as f64
        } else {
            0.0
        },
    })
}
