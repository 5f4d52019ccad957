//! Multi-source least-cost accumulation
//!
//! Dijkstra over an implicit [`GridGraph`]. Alongside the accumulated cost
//! each reached cell records the D8 code of the neighbour it was reached
//! from (one byte per cell) and the index of its nearest source.
//!
//! Reference:
//! Dijkstra, E.W. (1959). A note on two problems in connexion with graphs.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::cost_surface::GridGraph;
use archterra_core::raster::{Cell, Direction, Raster, NO_DIRECTION};
use archterra_core::{Error, Monitor, Result};

/// Index stored for cells no source reached
pub const NO_SOURCE: u32 = u32::MAX;

/// Which way edges are followed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchDirection {
    /// Cost of travelling from the nearest source to each cell
    #[default]
    Outbound,
    /// Cost of travelling from each cell to the nearest source
    Inbound,
}

/// A source that could not seed the search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSource {
    pub index: usize,
    pub cell: Cell,
    pub reason: String,
}

/// Output of [`accumulate`].
///
/// Sources hold 0, unreached cells `+inf`. The predecessor of a reached
/// non-source cell points at the neighbour one step closer to its source.
#[derive(Debug, Clone)]
pub struct AccumulatedCostField {
    cost: Raster<f64>,
    predecessor: Raster<u8>,
    nearest_source: Raster<u32>,
    sources: Vec<Cell>,
    skipped: Vec<SkippedSource>,
    direction: SearchDirection,
}

impl AccumulatedCostField {
    pub fn cost(&self) -> &Raster<f64> {
        &self.cost
    }

    /// D8 codes, [`NO_DIRECTION`] at sources and unreached cells
    pub fn predecessor(&self) -> &Raster<u8> {
        &self.predecessor
    }

    /// Index into the source list, [`NO_SOURCE`] where unreached
    pub fn nearest_source(&self) -> &Raster<u32> {
        &self.nearest_source
    }

    /// Sources as given, including skipped ones
    pub fn sources(&self) -> &[Cell] {
        &self.sources
    }

    pub fn skipped(&self) -> &[SkippedSource] {
        &self.skipped
    }

    pub fn direction(&self) -> SearchDirection {
        self.direction
    }

    pub fn shape(&self) -> (usize, usize) {
        self.cost.shape()
    }

    /// Accumulated cost at a cell, `+inf` when unreached
    pub fn cost_at(&self, cell: Cell) -> Result<f64> {
        self.cost.get(cell.row, cell.col)
    }

    pub fn is_reached(&self, cell: Cell) -> bool {
        self.cost_at(cell).is_ok_and(f64::is_finite)
    }

    /// Step from `cell` towards its source, if any
    pub fn predecessor_direction(&self, cell: Cell) -> Option<Direction> {
        self.predecessor
            .get(cell.row, cell.col)
            .ok()
            .and_then(Direction::from_code)
    }
}

/// Priority queue entry; min-heap on cost, ties broken by cell index
#[derive(Debug, Clone, Copy, PartialEq)]
struct State {
    cost: f64,
    index: usize,
}

impl Eq for State {}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.index.cmp(&self.index))
    }
}

/// Least cumulative cost from (or to) the nearest of `sources`.
///
/// Sources outside the grid or on impassable cells are skipped, logged and
/// recorded on the field; it is an error when none remains.
pub fn accumulate<G: GridGraph + ?Sized>(
    graph: &G,
    sources: &[Cell],
    direction: SearchDirection,
    monitor: &Monitor,
) -> Result<AccumulatedCostField> {
    let (rows, cols) = graph.shape();
    let n = rows * cols;

    let mut dist = vec![f64::INFINITY; n];
    let mut pred = vec![NO_DIRECTION; n];
    let mut nearest = vec![NO_SOURCE; n];
    let mut settled = vec![false; n];
    let mut heap = BinaryHeap::new();
    let mut skipped = Vec::new();

    for (i, &cell) in sources.iter().enumerate() {
        let reason = if cell.row >= rows || cell.col >= cols {
            Some("outside the grid")
        } else if !graph.is_passable(cell) {
            Some("on an impassable or no-data cell")
        } else {
            None
        };
        if let Some(reason) = reason {
            warn!("skipping source {} at {}: {}", i, cell, reason);
            skipped.push(SkippedSource {
                index: i,
                cell,
                reason: reason.to_string(),
            });
            continue;
        }

        let idx = cell.index(cols);
        if dist[idx] > 0.0 {
            dist[idx] = 0.0;
            nearest[idx] = i as u32;
            heap.push(State { cost: 0.0, index: idx });
        }
    }

    if heap.is_empty() {
        return Err(Error::invalid_parameter(
            "sources",
            sources.len(),
            "no source lies on a passable cell",
        ));
    }

    debug!(
        "accumulating {:?} cost from {} sources over {}x{} cells",
        direction,
        heap.len(),
        rows,
        cols
    );

    let mut done = 0usize;
    while let Some(State { cost, index }) = heap.pop() {
        if settled[index] {
            continue;
        }
        settled[index] = true;
        done += 1;
        monitor.tick(done, n)?;

        let here = Cell::from_index(index, cols);
        for &dir in graph.directions() {
            let Some(next) = here.step(dir, rows, cols) else {
                continue;
            };
            let next_idx = next.index(cols);
            if settled[next_idx] {
                continue;
            }

            let step = match direction {
                SearchDirection::Outbound => graph.edge_cost(here, dir)?,
                SearchDirection::Inbound => graph.edge_cost(next, dir.opposite())?,
            };
            let Some(step) = step else {
                continue;
            };

            let new_cost = cost + step;
            if new_cost < dist[next_idx] {
                dist[next_idx] = new_cost;
                pred[next_idx] = dir.opposite().code();
                nearest[next_idx] = nearest[index];
                heap.push(State {
                    cost: new_cost,
                    index: next_idx,
                });
            }
        }
    }
    monitor.report(1.0);

    let reference = graph.reference();
    let cost = into_raster(reference, dist, None)?;
    let predecessor = into_raster(reference, pred, None)?;
    let nearest_source = into_raster(reference, nearest, Some(NO_SOURCE))?;

    Ok(AccumulatedCostField {
        cost,
        predecessor,
        nearest_source,
        sources: sources.to_vec(),
        skipped,
        direction,
    })
}

fn into_raster<T: archterra_core::RasterElement>(
    reference: &Raster<f64>,
    values: Vec<T>,
    nodata: Option<T>,
) -> Result<Raster<T>> {
    let (rows, cols) = reference.shape();
    let mut output = reference.with_same_meta::<T>(rows, cols);
    output.set_nodata(nodata);
    *output.data_mut() = Array2::from_shape_vec((rows, cols), values)
        .map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}
