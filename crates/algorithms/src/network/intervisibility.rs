//! Intervisibility networks
//!
//! Sites are linked when they can see each other. Both directions of every
//! candidate pair are tested, since observer and target heights usually
//! differ and terrain sampling is not symmetric.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::graph::{Edge, EdgeKind, NetworkGraph};
use super::site::{validate_sites, Site};
use crate::maybe_rayon::*;
use crate::visibility::{line_of_sight, LineOfSight, LosOptions, SightLine};
use archterra_core::{ElevationGrid, Error, Monitor, Result};

/// How the two directional verdicts combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityRule {
    /// Edge when each site sees the other
    #[default]
    Mutual,
    /// Edge when at least one site sees the other
    Either,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervisibilityOptions {
    pub observer_height: f64,
    pub target_height: f64,
    /// Pairs farther apart are not tested
    pub max_distance: Option<f64>,
    pub rule: VisibilityRule,
    pub los: LosOptions,
}

impl Default for IntervisibilityOptions {
    fn default() -> Self {
        Self {
            observer_height: 1.7,
            target_height: 0.0,
            max_distance: None,
            rule: VisibilityRule::Mutual,
            los: LosOptions::default(),
        }
    }
}

/// A pair that could not be evaluated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairFailure {
    pub a: usize,
    pub b: usize,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct IntervisibilityOutput {
    pub graph: NetworkGraph,
    /// Pairs tested
    pub evaluated: usize,
    pub failures: Vec<PairFailure>,
}

enum PairVerdict {
    Seen { forward: bool, backward: bool },
    Failed(String),
}

fn directional(grid: &ElevationGrid, line: &SightLine, los: &LosOptions) -> Result<Option<bool>> {
    match line_of_sight(grid, line, los) {
        Ok(LineOfSight::NoData) => Ok(None),
        Ok(verdict) => Ok(Some(verdict.is_visible())),
        Err(e) if e.is_item_failure() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Mutual-visibility graph between sites; edge weights are planar distances.
pub fn intervisibility_graph(
    grid: &ElevationGrid,
    sites: &[Site],
    options: &IntervisibilityOptions,
    monitor: &Monitor,
) -> Result<IntervisibilityOutput> {
    validate_sites(sites)?;
    options.los.prepare(grid)?;
    if let Some(d) = options.max_distance {
        if !(d.is_finite() && d > 0.0) {
            return Err(Error::invalid_parameter("max_distance", d, "must be > 0"));
        }
    }

    let n = sites.len();
    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
        .filter(|&(i, j)| {
            options
                .max_distance
                .map_or(true, |d| sites[i].distance(&sites[j]) <= d)
        })
        .collect();
    let counter = monitor.counter(pairs.len());

    let verdicts: Vec<PairVerdict> = (&pairs)
        .into_par_iter()
        .map(|&(i, j)| {
            let line = SightLine::new(sites[i].position(), sites[j].position())
                .with_heights(options.observer_height, options.target_height);
            let forward = directional(grid, &line, &options.los)?;
            let backward = directional(grid, &line.reversed(), &options.los)?;
            counter.advance()?;

            Ok(match (forward, backward) {
                (Some(forward), Some(backward)) => PairVerdict::Seen { forward, backward },
                _ => PairVerdict::Failed(format!(
                    "sight line between '{}' and '{}' left the grid or crossed no-data",
                    sites[i].id, sites[j].id
                )),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut graph = NetworkGraph::new(sites.to_vec());
    let mut failures = Vec::new();
    for (&(a, b), verdict) in pairs.iter().zip(verdicts) {
        match verdict {
            PairVerdict::Seen { forward, backward } => {
                let linked = match options.rule {
                    VisibilityRule::Mutual => forward && backward,
                    VisibilityRule::Either => forward || backward,
                };
                if linked {
                    graph.add_edge(Edge::new(a, b, sites[a].distance(&sites[b]), EdgeKind::Intervisibility));
                }
            }
            PairVerdict::Failed(reason) => {
                warn!("pair ({}, {}) skipped: {}", a, b, reason);
                failures.push(PairFailure { a, b, reason });
            }
        }
    }

    info!(
        "intervisibility: {} pairs tested, {} edges, {} failed",
        pairs.len(),
        graph.edge_count(),
        failures.len()
    );
    Ok(IntervisibilityOutput {
        graph,
        evaluated: pairs.len(),
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use archterra_core::GeoTransform;

    /// 1 x 9 strip of 10 m cells with a bump at col 4
    fn strip(bump: f64) -> ElevationGrid {
        let mut values = vec![0.0; 9];
        values[4] = bump;
        ElevationGrid::from_vec(values, 1, 9, GeoTransform::new(0.0, 10.0, 10.0, -10.0), None).unwrap()
    }

    fn sites() -> Vec<Site> {
        vec![
            Site::new("west", 5.0, 5.0),
            Site::new("east", 85.0, 5.0),
            Site::new("mid", 35.0, 5.0),
        ]
    }

    #[test]
    fn flat_ground_links_everyone() {
        let out = intervisibility_graph(&strip(0.0), &sites(), &IntervisibilityOptions::default(), &Monitor::new())
            .unwrap();
        assert_eq!(out.graph.edge_count(), 3);
        assert_eq!(out.evaluated, 3);
        assert!(out.failures.is_empty());
    }

    #[test]
    fn ridge_blocks_across() {
        let out = intervisibility_graph(&strip(50.0), &sites(), &IntervisibilityOptions::default(), &Monitor::new())
            .unwrap();
        assert!(!out.graph.has_edge(0, 1));
        assert!(out.graph.has_edge(0, 2));
    }

    #[test]
    fn rule_either_vs_mutual() {
        // A mast at the west end clears a knoll close to the west site; the
        // same mast at the east end grazes it
        let mut values = vec![0.0; 9];
        values[1] = 6.0;
        let grid =
            ElevationGrid::from_vec(values, 1, 9, GeoTransform::new(0.0, 10.0, 10.0, -10.0), None).unwrap();
        let s = vec![Site::new("west", 5.0, 5.0), Site::new("east", 85.0, 5.0)];
        let mutual = IntervisibilityOptions {
            observer_height: 20.0,
            target_height: 0.0,
            ..Default::default()
        };
        let either = IntervisibilityOptions { rule: VisibilityRule::Either, ..mutual };

        let m = intervisibility_graph(&grid, &s, &mutual, &Monitor::new()).unwrap();
        let e = intervisibility_graph(&grid, &s, &either, &Monitor::new()).unwrap();
        assert!(!m.graph.has_edge(0, 1));
        assert!(e.graph.has_edge(0, 1));
    }

    #[test]
    fn off_grid_pairs_are_recorded() {
        let mut s = sites();
        s.push(Site::new("away", 500.0, 5.0));
        let out = intervisibility_graph(&strip(0.0), &s, &IntervisibilityOptions::default(), &Monitor::new())
            .unwrap();
        assert_eq!(out.failures.len(), 3);
        assert_eq!(out.graph.degrees()[3], 0);
    }

    #[test]
    fn max_distance_limits_pairs() {
        let options = IntervisibilityOptions { max_distance: Some(50.0), ..Default::default() };
        let out = intervisibility_graph(&strip(0.0), &sites(), &options, &Monitor::new()).unwrap();
        assert_eq!(out.evaluated, 2);
    }
}
