//! Least-cost path reconstruction

use serde::Serialize;

use super::accumulate::{AccumulatedCostField, SearchDirection};
use super::cost_model::SlopeCost;
use super::cost_surface::GridGraph;
use archterra_core::raster::{Cell, Direction, ElevationGrid, Sample, Sampling};
use archterra_core::{Error, Result};

/// Ordered cells in travel order with their accumulated cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Path {
    pub cells: Vec<Cell>,
    pub cost: f64,
}

impl Path {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn start(&self) -> Option<Cell> {
        self.cells.first().copied()
    }

    pub fn end(&self) -> Option<Cell> {
        self.cells.last().copied()
    }

    /// Cell centres in map coordinates
    pub fn to_coords(&self, grid: &ElevationGrid) -> Vec<(f64, f64)> {
        self.cells.iter().map(|&c| grid.cell_center(c)).collect()
    }

    /// Planar length in map units
    pub fn length(&self, grid: &ElevationGrid) -> f64 {
        self.to_coords(grid)
            .windows(2)
            .map(|w| (w[1].0 - w[0].0).hypot(w[1].1 - w[0].1))
            .sum()
    }

    /// Endpoints plus the cells where the direction of travel changes
    pub fn simplify_turns(&self) -> Vec<Cell> {
        if self.cells.len() <= 2 {
            return self.cells.clone();
        }

        let mut kept = vec![self.cells[0]];
        for w in self.cells.windows(3) {
            if Direction::between(w[0], w[1]) != Direction::between(w[1], w[2]) {
                kept.push(w[1]);
            }
        }
        kept.extend(self.cells.last());
        kept
    }
}

/// Follow predecessors from `cell` back to its source.
///
/// For an outbound field the path runs source -> `cell`; for an inbound
/// field it runs `cell` -> source. Either way it is in travel order and its
/// cost equals the field's cost at `cell`.
pub fn extract_path(field: &AccumulatedCostField, cell: Cell) -> Result<Path> {
    let (rows, cols) = field.shape();
    let cost = field.cost_at(cell)?;
    if !cost.is_finite() {
        return Err(Error::Unreachable { row: cell.row, col: cell.col });
    }

    let mut cells = vec![cell];
    let mut current = cell;
    while let Some(dir) = field.predecessor_direction(current) {
        current = current.step(dir, rows, cols).ok_or_else(|| {
            Error::Algorithm(format!("predecessor of {} points off the grid", current))
        })?;
        cells.push(current);
        if cells.len() > rows * cols {
            return Err(Error::Algorithm("predecessor chain does not terminate".into()));
        }
    }

    if field.cost_at(current)? != 0.0 {
        return Err(Error::Algorithm(format!(
            "predecessor chain from {} ends at {}, which is not a source",
            cell, current
        )));
    }

    if field.direction() == SearchDirection::Outbound {
        cells.reverse();
    }
    Ok(Path { cells, cost })
}

/// Sum of edge costs along `path`, evaluated on `graph`.
///
/// Fails when two consecutive cells are not adjacent or a move is not
/// traversable.
pub fn path_cost<G: GridGraph + ?Sized>(graph: &G, path: &Path) -> Result<f64> {
    let mut total = 0.0;
    for w in path.cells.windows(2) {
        let dir = Direction::between(w[0], w[1]).ok_or_else(|| {
            Error::invalid_parameter("path", format!("{} -> {}", w[0], w[1]), "cells are not adjacent")
        })?;
        total += graph
            .edge_cost(w[0], dir)?
            .ok_or(Error::Unreachable { row: w[1].row, col: w[1].col })?;
    }
    Ok(total)
}

/// Cost of walking the straight segment `a -> b`, sampled every `step`.
///
/// Each piece between consecutive samples is charged at the slope between
/// their (bilinear) elevations.
pub fn straight_line_cost(
    grid: &ElevationGrid,
    model: &dyn SlopeCost,
    a: (f64, f64),
    b: (f64, f64),
    step: f64,
) -> Result<f64> {
    if !(step.is_finite() && step > 0.0) {
        return Err(Error::invalid_parameter("step", step, "must be > 0"));
    }

    let elevation = |x: f64, y: f64| -> Result<f64> {
        match grid.sample(x, y, Sampling::Bilinear)? {
            Sample::Value(z) => Ok(z),
            Sample::NoData => {
                let cell = grid.cell_at(x, y)?;
                Err(Error::NoData { row: cell.row, col: cell.col })
            }
        }
    };

    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let length = dx.hypot(dy);
    let n = ((length / step).ceil() as usize).max(1);
    let piece = length / n as f64;

    let mut z_prev = elevation(a.0, a.1)?;
    let mut total = 0.0;
    for i in 1..=n {
        let t = i as f64 / n as f64;
        let z = elevation(a.0 + t * dx, a.1 + t * dy)?;
        if piece > 0.0 {
            total += model.cost_per_metre((z - z_prev) / piece) * piece;
        }
        z_prev = z;
    }
    Ok(total)
}
