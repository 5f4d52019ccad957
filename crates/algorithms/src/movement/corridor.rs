//! Least-cost corridors
//!
//! With `F_A` the outbound accumulation from A and `B_B` the inbound
//! accumulation to B, `F_A(c) + B_B(c)` is the cheapest A -> c -> B route.
//! Its minimum over all cells is the least-cost path cost, so the detour
//! `F_A + B_B - lcp` is 0 exactly on least-cost paths and grows with
//! the extra cost a route through the cell would incur.

use ndarray::Array2;
use serde::Serialize;
use tracing::debug;

use super::accumulate::{AccumulatedCostField, SearchDirection};
use archterra_core::raster::{Cell, Raster};
use archterra_core::{Error, Result};

/// Relative tolerance when comparing detours to the budget
pub const CORRIDOR_TOLERANCE: f64 = 1e-9;

/// Detour-cost grid between two places
#[derive(Debug, Clone)]
pub struct Corridor {
    detour: Raster<f64>,
    lcp_cost: f64,
}

/// Size of a thresholded corridor
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CorridorSummary {
    pub budget: f64,
    pub cells: usize,
    pub area: f64,
}

impl Corridor {
    /// Extra cost of routing through each cell; `+inf` where unreachable
    pub fn detour(&self) -> &Raster<f64> {
        &self.detour
    }

    pub fn lcp_cost(&self) -> f64 {
        self.lcp_cost
    }

    fn tolerance(&self) -> f64 {
        CORRIDOR_TOLERANCE * self.lcp_cost.max(1.0)
    }

    /// Cells whose detour is within `budget`: 1 inside, 0 outside.
    ///
    /// A budget of 0 keeps exactly the cells on some least-cost path.
    pub fn mask(&self, budget: f64) -> Result<Raster<u8>> {
        if !(budget.is_finite() && budget >= 0.0) {
            return Err(Error::invalid_parameter("budget", budget, "must be >= 0"));
        }
        let limit = budget + self.tolerance();
        let mut mask = self.detour.map(|d| u8::from(d <= limit));
        mask.set_nodata(None);
        Ok(mask)
    }

    pub fn summary(&self, budget: f64) -> Result<CorridorSummary> {
        let mask = self.mask(budget)?;
        let cells = mask.count_where(|v| v == 1);
        Ok(CorridorSummary {
            budget,
            cells,
            area: cells as f64 * mask.transform().cell_area(),
        })
    }
}

/// Combine an outbound field from A and an inbound field to B.
pub fn extract_corridor(
    from_a: &AccumulatedCostField,
    to_b: &AccumulatedCostField,
) -> Result<Corridor> {
    if from_a.direction() != SearchDirection::Outbound {
        return Err(Error::invalid_parameter(
            "from_a",
            "inbound",
            "the first field must be an outbound accumulation",
        ));
    }
    if to_b.direction() != SearchDirection::Inbound {
        return Err(Error::invalid_parameter(
            "to_b",
            "outbound",
            "the second field must be an inbound accumulation",
        ));
    }
    from_a.cost().ensure_congruent(to_b.cost())?;

    let (rows, cols) = from_a.shape();
    let total: Vec<f64> = from_a
        .cost()
        .data()
        .iter()
        .zip(to_b.cost().data().iter())
        .map(|(&f, &b)| f + b)
        .collect();

    let lcp_cost = total.iter().copied().fold(f64::INFINITY, f64::min);
    if !lcp_cost.is_finite() {
        let target = to_b.sources().first().copied().unwrap_or(Cell::new(0, 0));
        return Err(Error::Unreachable { row: target.row, col: target.col });
    }
    debug!("corridor: least-cost path cost {:.3}", lcp_cost);

    let detour: Vec<f64> = total
        .into_iter()
        .map(|t| if t.is_finite() { (t - lcp_cost).max(0.0) } else { f64::INFINITY })
        .collect();

    let mut raster = from_a.cost().with_same_meta::<f64>(rows, cols);
    raster.set_nodata(None);
    *raster.data_mut() = Array2::from_shape_vec((rows, cols), detour)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(Corridor {
        detour: raster,
        lcp_cost,
    })
}
