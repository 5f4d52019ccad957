//! Hub-and-spoke networks
//!
//! Every non-hub site links to its cheapest hubs; hubs can additionally be
//! joined by a spanning tree of their own.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::graph::{Edge, EdgeKind, NetworkGraph};
use super::matrix::{CostMatrix, Symmetry};
use super::mst::spanning_forest;
use super::site::Site;
use archterra_core::{Error, Result};

/// Which sites act as hubs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "indices", rename_all = "snake_case")]
pub enum HubSelection {
    /// Sites whose `hub` flag is set
    #[default]
    Flagged,
    /// Explicit site indices
    Indices(Vec<usize>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubOptions {
    pub selection: HubSelection,
    /// Hubs each non-hub site links to
    pub hubs_per_node: usize,
    /// Join the hubs with a minimum spanning tree
    pub connect_hubs_mst: bool,
    pub symmetry: Symmetry,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            selection: HubSelection::Flagged,
            hubs_per_node: 1,
            connect_hubs_mst: true,
            symmetry: Symmetry::Average,
        }
    }
}

fn hub_indices(sites: &[Site], selection: &HubSelection) -> Result<Vec<usize>> {
    let mut hubs: Vec<usize> = match selection {
        HubSelection::Flagged => (0..sites.len()).filter(|&i| sites[i].hub).collect(),
        HubSelection::Indices(list) => {
            if let Some(&bad) = list.iter().find(|&&i| i >= sites.len()) {
                return Err(Error::invalid_parameter("hubs", bad, "hub index out of range"));
            }
            list.clone()
        }
    };
    hubs.sort_unstable();
    hubs.dedup();
    if hubs.is_empty() {
        return Err(Error::invalid_parameter("hubs", 0, "no hub sites selected"));
    }
    Ok(hubs)
}

pub fn build_hub(matrix: &CostMatrix, sites: &[Site], options: &HubOptions) -> Result<NetworkGraph> {
    matrix.ensure_sites(sites)?;
    if options.hubs_per_node == 0 {
        return Err(Error::invalid_parameter("hubs_per_node", 0, "must be >= 1"));
    }
    let hubs = hub_indices(sites, &options.selection)?;

    let mut graph = NetworkGraph::new(sites.to_vec());
    for i in 0..sites.len() {
        if hubs.binary_search(&i).is_ok() {
            continue;
        }
        let mut ranked: Vec<(usize, f64)> = hubs
            .iter()
            .map(|&h| (h, matrix.symmetric(i, h, options.symmetry)))
            .filter(|(_, w)| w.is_finite())
            .collect();
        if ranked.is_empty() {
            warn!("site {} '{}' cannot reach any hub", i, sites[i].id);
            continue;
        }
        ranked.sort_by(|x, y| x.1.total_cmp(&y.1).then(x.0.cmp(&y.0)));
        for &(h, w) in ranked.iter().take(options.hubs_per_node) {
            graph.add_edge(Edge::new(i, h, w, EdgeKind::HubLink));
        }
    }

    if options.connect_hubs_mst && hubs.len() >= 2 {
        let tree = spanning_forest(matrix, &hubs, options.symmetry, EdgeKind::HubMst);
        if tree.len() + 1 < hubs.len() {
            warn!(
                "hub spanning tree is a forest: {} of {} edges",
                tree.len(),
                hubs.len() - 1
            );
        }
        for e in tree {
            graph.add_edge(e);
        }
    }
    graph.sort_edges();

    debug!("hub network: {} hubs, {} edges", hubs.len(), graph.edge_count());
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::matrix::euclidean_matrix;

    fn sites() -> Vec<Site> {
        vec![
            Site::new("h0", 0.0, 0.0).as_hub(),
            Site::new("a", 1.0, 0.0),
            Site::new("b", 9.0, 0.0),
            Site::new("h1", 10.0, 0.0).as_hub(),
            Site::new("c", 4.0, 0.0),
        ]
    }

    #[test]
    fn nodes_link_to_nearest_hub() {
        let s = sites();
        let m = euclidean_matrix(&s).unwrap();
        let g = build_hub(&m, &s, &HubOptions::default()).unwrap();

        assert!(g.has_edge(0, 1));
        assert!(g.has_edge(2, 3));
        assert!(g.has_edge(0, 4));
        assert!(g.has_edge(0, 3));
        assert_eq!(g.edge_between(0, 3).unwrap().kind, EdgeKind::HubMst);
        assert_eq!(g.edge_count(), 4);
    }

    #[test]
    fn several_hubs_per_node_without_hub_tree() {
        let s = sites();
        let m = euclidean_matrix(&s).unwrap();
        let options = HubOptions {
            hubs_per_node: 2,
            connect_hubs_mst: false,
            ..Default::default()
        };
        let g = build_hub(&m, &s, &options).unwrap();
        assert_eq!(g.edge_count(), 6);
        assert!(!g.has_edge(0, 3));
    }

    #[test]
    fn explicit_indices() {
        let s = sites();
        let m = euclidean_matrix(&s).unwrap();
        let options = HubOptions {
            selection: HubSelection::Indices(vec![4]),
            ..Default::default()
        };
        let g = build_hub(&m, &s, &options).unwrap();
        assert_eq!(g.degrees()[4], 4);
    }

    #[test]
    fn one_way_costs_still_reach_hubs() {
        let s = vec![Site::new("h", 0.0, 0.0).as_hub(), Site::new("a", 1.0, 0.0)];
        // The hub is reachable from a, not a from the hub
        let m = CostMatrix::from_rows(2, vec![0.0, f64::INFINITY, 7.0, 0.0]).unwrap();
        let g = build_hub(&m, &s, &HubOptions::default()).unwrap();
        assert_eq!(g.edge_between(0, 1).unwrap().weight, 7.0);
    }

    #[test]
    fn no_hubs_is_an_error() {
        let s: Vec<Site> = sites().into_iter().map(|mut x| { x.hub = false; x }).collect();
        let m = euclidean_matrix(&s).unwrap();
        assert!(build_hub(&m, &s, &HubOptions::default()).is_err());
        let bad = HubOptions { selection: HubSelection::Indices(vec![9]), ..Default::default() };
        assert!(build_hub(&m, &s, &bad).is_err());
    }
}
