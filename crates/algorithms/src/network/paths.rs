//! Least-cost geometry for network edges

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use super::graph::NetworkGraph;
use crate::maybe_rayon::*;
use crate::movement::{accumulate, extract_path, CostSurface, Path, SearchDirection};
use archterra_core::{Monitor, Result};

/// Route of one edge, travelling from `a` to `b`
#[derive(Debug, Clone, Serialize)]
pub struct EdgePath {
    pub a: usize,
    pub b: usize,
    /// `None` when either site is off the surface or `b` is unreachable
    pub path: Option<Path>,
}

/// Trace every edge over the cost surface.
///
/// One outbound accumulation per distinct start node, run in parallel;
/// edges come back in graph order.
pub fn edge_paths(
    surface: &CostSurface<'_>,
    graph: &NetworkGraph,
    monitor: &Monitor,
) -> Result<Vec<EdgePath>> {
    let grid = surface.grid();
    let mut by_start: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, e) in graph.edges().iter().enumerate() {
        by_start.entry(e.a).or_default().push(i);
    }
    let groups: Vec<(usize, Vec<usize>)> = by_start.into_iter().collect();

    let counter = monitor.counter(groups.len());
    let inner = monitor.silent();

    let traced: Vec<Vec<(usize, Option<Path>)>> = groups
        .into_par_iter()
        .map(|(start, edge_ids)| {
            let site = &graph.nodes[start];
            let field = match site.cell(grid) {
                Ok(cell) => Some(accumulate(surface, &[cell], SearchDirection::Outbound, &inner)?),
                Err(e) => {
                    warn!("no paths from site '{}': {}", site.id, e);
                    None
                }
            };

            let mut out = Vec::with_capacity(edge_ids.len());
            for id in edge_ids {
                let edge = graph.edges()[id];
                let target = &graph.nodes[edge.b];
                let path = field.as_ref().and_then(|f| {
                    let traced = target.cell(grid).and_then(|cell| extract_path(f, cell));
                    match traced {
                        Ok(p) => Some(p),
                        Err(e) => {
                            warn!("no path '{}' -> '{}': {}", site.id, target.id, e);
                            None
                        }
                    }
                });
                out.push((id, path));
            }
            counter.advance()?;
            Ok(out)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut paths: Vec<Option<Path>> = vec![None; graph.edge_count()];
    for (id, path) in traced.into_iter().flatten() {
        paths[id] = path;
    }

    Ok(graph
        .edges()
        .iter()
        .zip(paths)
        .map(|(e, path)| EdgePath { a: e.a, b: e.b, path })
        .collect())
}
