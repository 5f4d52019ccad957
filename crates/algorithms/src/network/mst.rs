//! Minimum spanning tree (Kruskal)
//!
//! Reference:
//! Kruskal, J.B. (1956). On the shortest spanning subtree of a graph and the
//! traveling salesman problem. Proc. AMS, 7(1).

use tracing::debug;

use super::graph::{Edge, EdgeKind, NetworkGraph, UnionFind};
use super::matrix::{CostMatrix, Symmetry};
use super::site::Site;
use archterra_core::{Error, Result};

/// Minimum spanning forest over `nodes` (indices into the matrix).
///
/// Candidate edges are the finite symmetric weights, taken in
/// (weight, a, b) order.
pub(crate) fn spanning_forest(
    matrix: &CostMatrix,
    nodes: &[usize],
    symmetry: Symmetry,
    kind: EdgeKind,
) -> Vec<Edge> {
    let mut candidates: Vec<Edge> = Vec::new();
    for (i, &a) in nodes.iter().enumerate() {
        for &b in &nodes[i + 1..] {
            let w = matrix.symmetric(a, b, symmetry);
            if w.is_finite() {
                candidates.push(Edge::new(a, b, w, kind));
            }
        }
    }
    candidates.sort_by(|x, y| {
        x.weight
            .total_cmp(&y.weight)
            .then(x.a.cmp(&y.a))
            .then(x.b.cmp(&y.b))
    });

    let mut uf = UnionFind::new(matrix.len());
    let mut tree = Vec::with_capacity(nodes.len().saturating_sub(1));
    for e in candidates {
        if uf.union(e.a, e.b) {
            tree.push(e);
            if tree.len() + 1 == nodes.len() {
                break;
            }
        }
    }
    tree
}

/// Minimum spanning tree of all sites.
///
/// Fails with [`Error::DisconnectedGraph`] when the finite costs do not
/// connect every site.
pub fn build_mst(matrix: &CostMatrix, sites: &[Site], symmetry: Symmetry) -> Result<NetworkGraph> {
    matrix.ensure_sites(sites)?;
    let nodes: Vec<usize> = (0..sites.len()).collect();
    let tree = spanning_forest(matrix, &nodes, symmetry, EdgeKind::Mst);

    if tree.len() + 1 < sites.len() {
        return Err(Error::DisconnectedGraph(format!(
            "spanning tree found only {} of {} edges",
            tree.len(),
            sites.len() - 1
        )));
    }

    let mut graph = NetworkGraph::new(sites.to_vec());
    for e in tree {
        graph.add_edge(e);
    }
    debug!(
        "mst: {} edges, total weight {:.3}",
        graph.edge_count(),
        graph.total_weight()
    );
    Ok(graph)
}
