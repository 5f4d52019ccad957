//! Sites: the nodes of every network

use serde::{Deserialize, Serialize};

use archterra_core::raster::{Cell, ElevationGrid};
use archterra_core::{Error, Result};

/// A named point location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    pub x: f64,
    pub y: f64,
    /// Designated hub (central place) for hub networks
    #[serde(default)]
    pub hub: bool,
}

impl Site {
    pub fn new(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            hub: false,
        }
    }

    pub fn as_hub(mut self) -> Self {
        self.hub = true;
        self
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn distance(&self, other: &Site) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Grid cell of the site; it must fall on a valid cell
    pub fn cell(&self, grid: &ElevationGrid) -> Result<Cell> {
        let cell = grid.cell_at(self.x, self.y)?;
        if !grid.is_valid(cell) {
            return Err(Error::NoData { row: cell.row, col: cell.col });
        }
        Ok(cell)
    }
}

/// A site that was left out of a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteFailure {
    pub index: usize,
    pub id: String,
    pub reason: String,
}

pub(crate) fn validate_sites(sites: &[Site]) -> Result<()> {
    if let Some(s) = sites.iter().find(|s| !(s.x.is_finite() && s.y.is_finite())) {
        return Err(Error::invalid_parameter(
            "site",
            &s.id,
            format!("non-finite coordinates ({}, {})", s.x, s.y),
        ));
    }
    Ok(())
}
