//! Pairwise cost matrices between sites

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::site::{validate_sites, Site, SiteFailure};
use crate::maybe_rayon::*;
use crate::movement::{accumulate, CostSurface, SearchDirection};
use archterra_core::raster::Cell;
use archterra_core::{Error, Monitor, Result};

/// How two directional costs combine into one undirected weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symmetry {
    #[default]
    Average,
    Min,
    Max,
}

impl Symmetry {
    /// Undirected weight of a pair.
    ///
    /// When only one direction is reachable its cost is used as is, so a
    /// pair is dropped only when neither direction is finite.
    pub fn combine(self, ab: f64, ba: f64) -> f64 {
        if !ab.is_finite() || !ba.is_finite() {
            return ab.min(ba);
        }
        match self {
            Symmetry::Average => (ab + ba) / 2.0,
            Symmetry::Min => ab.min(ba),
            Symmetry::Max => ab.max(ba),
        }
    }
}

/// Dense `n x n` cost matrix; `get(i, j)` is the cost from i to j,
/// `+inf` when j cannot be reached from i.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostMatrix {
    n: usize,
    values: Vec<f64>,
}

impl CostMatrix {
    /// Matrix with 0 on the diagonal and `+inf` elsewhere
    pub fn unreachable(n: usize) -> Self {
        let mut values = vec![f64::INFINITY; n * n];
        for i in 0..n {
            values[i * n + i] = 0.0;
        }
        Self { n, values }
    }

    /// Build from row-major values
    pub fn from_rows(n: usize, values: Vec<f64>) -> Result<Self> {
        if values.len() != n * n {
            return Err(Error::InvalidDimensions { width: n, height: values.len() / n.max(1) });
        }
        if let Some(v) = values.iter().find(|v| v.is_nan() || **v < 0.0) {
            return Err(Error::invalid_parameter("matrix", v, "costs must be >= 0 or +inf"));
        }
        Ok(Self { n, values })
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[inline]
    pub fn get(&self, from: usize, to: usize) -> f64 {
        self.values[from * self.n + to]
    }

    pub fn row(&self, from: usize) -> &[f64] {
        &self.values[from * self.n..(from + 1) * self.n]
    }

    fn set_row(&mut self, from: usize, row: &[f64]) {
        self.values[from * self.n..(from + 1) * self.n].copy_from_slice(row);
    }

    /// Undirected weight between `a` and `b`
    pub fn symmetric(&self, a: usize, b: usize, rule: Symmetry) -> f64 {
        rule.combine(self.get(a, b), self.get(b, a))
    }

    pub fn is_symmetric(&self, tolerance: f64) -> bool {
        (0..self.n).all(|i| {
            (i + 1..self.n).all(|j| {
                let (a, b) = (self.get(i, j), self.get(j, i));
                a == b || (a - b).abs() <= tolerance
            })
        })
    }

    pub(crate) fn ensure_sites(&self, sites: &[Site]) -> Result<()> {
        if self.n != sites.len() {
            return Err(Error::SizeMismatch {
                er: sites.len(),
                ec: sites.len(),
                ar: self.n,
                ac: self.n,
            });
        }
        Ok(())
    }
}

/// Least-cost matrix and the sites that could not take part
#[derive(Debug, Clone)]
pub struct PairwiseCosts {
    pub matrix: CostMatrix,
    pub failures: Vec<SiteFailure>,
}

/// One outbound accumulation per site, run in parallel over sites.
///
/// Sites outside the grid or on no-data are recorded as failures; their row
/// and column stay `+inf` (0 on the diagonal).
pub fn pairwise_least_cost(
    surface: &CostSurface<'_>,
    sites: &[Site],
    monitor: &Monitor,
) -> Result<PairwiseCosts> {
    validate_sites(sites)?;
    let grid = surface.grid();

    let cells: Vec<Option<Cell>> = sites.iter().map(|s| s.cell(grid).ok()).collect();
    let mut failures = Vec::new();
    for (index, site) in sites.iter().enumerate() {
        if let Err(e) = site.cell(grid) {
            warn!("site {} '{}' left out of the cost matrix: {}", index, site.id, e);
            failures.push(SiteFailure {
                index,
                id: site.id.clone(),
                reason: e.to_string(),
            });
        }
    }

    let counter = monitor.counter(sites.len());
    let inner = monitor.silent();

    let rows: Vec<Option<Vec<f64>>> = (&cells)
        .into_par_iter()
        .map(|cell| {
            let row = match cell {
                None => None,
                Some(cell) => {
                    let field = accumulate(surface, &[*cell], SearchDirection::Outbound, &inner)?;
                    let costs = field.cost().data();
                    Some(
                        cells
                            .iter()
                            .map(|target| {
                                target.map_or(f64::INFINITY, |t| costs[(t.row, t.col)])
                            })
                            .collect(),
                    )
                }
            };
            counter.advance()?;
            Ok(row)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut matrix = CostMatrix::unreachable(sites.len());
    for (i, row) in rows.into_iter().enumerate() {
        if let Some(row) = row {
            matrix.set_row(i, &row);
        }
    }

    info!(
        "cost matrix: {} sites, {} left out",
        sites.len(),
        failures.len()
    );
    Ok(PairwiseCosts { matrix, failures })
}

/// Straight-line distances between sites
pub fn euclidean_matrix(sites: &[Site]) -> Result<CostMatrix> {
    validate_sites(sites)?;
    let values = sites
        .iter()
        .flat_map(|a| sites.iter().map(move |b| a.distance(b)))
        .collect();
    CostMatrix::from_rows(sites.len(), values)
}
