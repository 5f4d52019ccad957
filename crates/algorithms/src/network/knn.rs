//! k-nearest-neighbour networks

use std::collections::BTreeSet;

use tracing::debug;

use super::graph::{Edge, EdgeKind, NetworkGraph};
use super::matrix::CostMatrix;
use super::site::Site;
use archterra_core::{Error, Result};

/// The `k` cheapest reachable targets of `from`, ordered by (cost, index)
pub(crate) fn nearest_by_cost(matrix: &CostMatrix, from: usize, k: usize) -> Vec<(usize, f64)> {
    let mut candidates: Vec<(usize, f64)> = matrix
        .row(from)
        .iter()
        .enumerate()
        .filter(|&(j, c)| j != from && c.is_finite())
        .map(|(j, &c)| (j, c))
        .collect();
    candidates.sort_by(|x, y| x.1.total_cmp(&y.1).then(x.0.cmp(&y.0)));
    candidates.truncate(k);
    candidates
}

/// Each site nominates its `k` cheapest reachable neighbours.
///
/// With `mutual_only` an edge needs both ends to nominate each other;
/// otherwise any nomination creates it. The edge weight is the cheaper of
/// the nominating directions.
pub fn build_knn(
    matrix: &CostMatrix,
    sites: &[Site],
    k: usize,
    mutual_only: bool,
) -> Result<NetworkGraph> {
    matrix.ensure_sites(sites)?;
    if k == 0 {
        return Err(Error::invalid_parameter("k", k, "must be >= 1"));
    }

    let nominations: Vec<Vec<(usize, f64)>> =
        (0..sites.len()).map(|i| nearest_by_cost(matrix, i, k)).collect();
    let nominated: BTreeSet<(usize, usize)> = nominations
        .iter()
        .enumerate()
        .flat_map(|(i, list)| list.iter().map(move |&(j, _)| (i, j)))
        .collect();

    let mut graph = NetworkGraph::new(sites.to_vec());
    for (i, list) in nominations.iter().enumerate() {
        for &(j, cost) in list {
            if mutual_only && !nominated.contains(&(j, i)) {
                continue;
            }
            graph.add_edge(Edge::new(i, j, cost, EdgeKind::Knn));
        }
    }
    graph.sort_edges();

    debug!(
        "knn (k = {}, mutual = {}): {} edges",
        k,
        mutual_only,
        graph.edge_count()
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::matrix::euclidean_matrix;

    fn line(n: usize) -> Vec<Site> {
        (0..n).map(|i| Site::new(format!("s{}", i), i as f64 * 10.0, 0.0)).collect()
    }

    #[test]
    fn k1_on_collinear_sites() {
        let sites = line(5);
        let m = euclidean_matrix(&sites).unwrap();
        let g = build_knn(&m, &sites, 1, false).unwrap();
        assert_eq!(g.edge_count(), 4);
        for (a, b) in [(0, 1), (1, 2), (2, 3), (3, 4)] {
            assert!(g.has_edge(a, b));
        }
    }

    #[test]
    fn mutual_only_keeps_reciprocal_pairs() {
        let sites = line(5);
        let m = euclidean_matrix(&sites).unwrap();
        let g = build_knn(&m, &sites, 1, true).unwrap();
        // Ties go to the lower index: 1 picks 0 and 3 picks 2, so only 0 <-> 1
        // is reciprocal
        assert_eq!(g.edge_count(), 1);
        assert!(g.has_edge(0, 1));
    }

    #[test]
    fn unreachable_targets_are_never_nominated() {
        let sites = line(3);
        let inf = f64::INFINITY;
        let m = CostMatrix::from_rows(3, vec![0.0, 1.0, inf, 1.0, 0.0, inf, inf, inf, 0.0]).unwrap();
        let g = build_knn(&m, &sites, 2, false).unwrap();
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.degrees()[2], 0);
    }

    #[test]
    fn zero_k_rejected() {
        let sites = line(3);
        let m = euclidean_matrix(&sites).unwrap();
        assert!(build_knn(&m, &sites, 0, false).is_err());
    }
}
