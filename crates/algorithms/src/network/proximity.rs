//! Planar proximity graphs over site positions
//!
//! References:
//! - Delaunay, B. (1934). Sur la sphère vide. Bulletin de l'Académie des
//!   Sciences de l'URSS, 6.
//! - Gabriel, K.R. & Sokal, R.R. (1969). A new statistical approach to
//!   geographic variation analysis. Systematic Zoology, 18(3).
//! - Toussaint, G.T. (1980). The relative neighbourhood graph of a finite
//!   planar set. Pattern Recognition, 12(4).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::delaunay::delaunay_edges;
use super::graph::{Edge, EdgeKind, NetworkGraph};
use super::kdtree::KdTree;
use super::site::{validate_sites, Site};
use archterra_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ProximityRule {
    /// All pairs within `radius`
    Threshold { radius: f64 },
    /// Each site's `k` nearest sites
    Knn {
        k: usize,
        #[serde(default)]
        mutual: bool,
    },
    /// Edges of the Delaunay triangulation
    Delaunay,
    /// No other site strictly inside the circle on the pair as diameter
    Gabriel,
    /// No other site closer to both ends than they are to each other
    RelativeNeighborhood,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProximityOptions {
    #[serde(flatten)]
    pub rule: ProximityRule,
    /// Drop edges longer than this
    #[serde(default)]
    pub max_edge_length: Option<f64>,
}

impl ProximityOptions {
    pub fn new(rule: ProximityRule) -> Self {
        Self {
            rule,
            max_edge_length: None,
        }
    }

    pub fn with_max_edge_length(mut self, length: f64) -> Self {
        self.max_edge_length = Some(length);
        self
    }
}

/// Relative tolerance for "strictly inside" tests
const INSIDE_EPSILON: f64 = 1e-12;

fn candidate_pairs(n: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..n).flat_map(move |i| (i + 1..n).map(move |j| (i, j)))
}

pub fn proximity_graph(sites: &[Site], options: &ProximityOptions) -> Result<NetworkGraph> {
    validate_sites(sites)?;
    if let Some(max) = options.max_edge_length {
        if !(max.is_finite() && max > 0.0) {
            return Err(Error::invalid_parameter("max_edge_length", max, "must be > 0"));
        }
    }

    let points: Vec<(f64, f64)> = sites.iter().map(Site::position).collect();
    let tree = KdTree::build(&points);
    let n = sites.len();
    let mut edges: Vec<(usize, usize)> = Vec::new();

    match options.rule {
        ProximityRule::Threshold { radius } => {
            if !(radius.is_finite() && radius > 0.0) {
                return Err(Error::invalid_parameter("radius", radius, "must be > 0"));
            }
            for (i, &(x, y)) in points.iter().enumerate() {
                edges.extend(
                    tree.within_radius(x, y, radius)
                        .into_iter()
                        .filter(|hit| hit.index > i)
                        .map(|hit| (i, hit.index)),
                );
            }
        }
        ProximityRule::Knn { k, mutual } => {
            if k == 0 {
                return Err(Error::invalid_parameter("k", k, "must be >= 1"));
            }
            let nominated: BTreeSet<(usize, usize)> = points
                .iter()
                .enumerate()
                .flat_map(|(i, &(x, y))| {
                    tree.k_nearest(x, y, k + 1)
                        .into_iter()
                        .filter(move |hit| hit.index != i)
                        .take(k)
                        .map(move |hit| (i, hit.index))
                })
                .collect();
            for &(i, j) in &nominated {
                if mutual && !nominated.contains(&(j, i)) {
                    continue;
                }
                edges.push((i.min(j), i.max(j)));
            }
        }
        ProximityRule::Delaunay => edges.extend(delaunay_edges(&points)),
        ProximityRule::Gabriel => {
            for (i, j) in candidate_pairs(n) {
                let (a, b) = (points[i], points[j]);
                let (mx, my) = ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0);
                let r_sq = ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)) / 4.0;
                let limit = r_sq * (1.0 - INSIDE_EPSILON);
                let blocked = tree
                    .within_radius(mx, my, r_sq.sqrt())
                    .iter()
                    .any(|hit| hit.index != i && hit.index != j && hit.distance_sq < limit);
                if !blocked {
                    edges.push((i, j));
                }
            }
        }
        ProximityRule::RelativeNeighborhood => {
            for (i, j) in candidate_pairs(n) {
                let (a, b) = (points[i], points[j]);
                let d_sq = (a.0 - b.0).powi(2) + (a.1 - b.1).powi(2);
                let limit = d_sq * (1.0 - INSIDE_EPSILON);
                let blocked = tree.within_radius(a.0, a.1, d_sq.sqrt()).iter().any(|hit| {
                    if hit.index == i || hit.index == j {
                        return false;
                    }
                    let (x, y) = points[hit.index];
                    let to_b = (x - b.0).powi(2) + (y - b.1).powi(2);
                    hit.distance_sq < limit && to_b < limit
                });
                if !blocked {
                    edges.push((i, j));
                }
            }
        }
    }

    let mut graph = NetworkGraph::new(sites.to_vec());
    for (i, j) in edges {
        let length = sites[i].distance(&sites[j]);
        if options.max_edge_length.is_some_and(|max| length > max) {
            continue;
        }
        graph.add_edge(Edge::new(i, j, length, EdgeKind::Proximity));
    }
    graph.sort_edges();

    debug!("proximity graph {:?}: {} edges", options.rule, graph.edge_count());
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_sites() -> Vec<Site> {
        // 3 x 3 lattice, spacing 1
        (0..9)
            .map(|i| Site::new(format!("s{}", i), (i % 3) as f64, (i / 3) as f64))
            .collect()
    }

    #[test]
    fn threshold() {
        let g = proximity_graph(&grid_sites(), &ProximityOptions::new(ProximityRule::Threshold { radius: 1.0 }))
            .unwrap();
        assert_eq!(g.edge_count(), 12);
        let g = proximity_graph(&grid_sites(), &ProximityOptions::new(ProximityRule::Threshold { radius: 1.5 }))
            .unwrap();
        assert_eq!(g.edge_count(), 20);
    }

    #[test]
    fn knn_collinear() {
        let sites: Vec<Site> = (0..5).map(|i| Site::new(format!("s{}", i), i as f64, 0.0)).collect();
        let g = proximity_graph(&sites, &ProximityOptions::new(ProximityRule::Knn { k: 1, mutual: false }))
            .unwrap();
        assert_eq!(g.edge_count(), 4);
        assert!(g.edges().iter().all(|e| e.b == e.a + 1));
    }

    #[test]
    fn gabriel_lattice() {
        // Diagonals of a unit square have the other corners on their circle,
        // not strictly inside, so they stay
        let g = proximity_graph(&grid_sites(), &ProximityOptions::new(ProximityRule::Gabriel)).unwrap();
        assert!(g.has_edge(0, 1));
        assert!(g.has_edge(0, 4));
        assert!(!g.has_edge(0, 2));
    }

    #[test]
    fn rng_is_subset_of_gabriel() {
        let sites = vec![
            Site::new("a", 0.0, 0.0),
            Site::new("b", 4.0, 0.0),
            Site::new("c", 2.0, 1.0),
            Site::new("d", 2.0, 5.0),
        ];
        let gabriel = proximity_graph(&sites, &ProximityOptions::new(ProximityRule::Gabriel)).unwrap();
        let rng =
            proximity_graph(&sites, &ProximityOptions::new(ProximityRule::RelativeNeighborhood)).unwrap();
        for e in rng.edges() {
            assert!(gabriel.has_edge(e.a, e.b));
        }
        // c sits inside the a-b lune
        assert!(!rng.has_edge(0, 1));
        assert!(rng.has_edge(0, 2));
    }

    fn scattered() -> Vec<Site> {
        [(0.0, 0.0), (7.0, 1.0), (3.0, 4.0), (9.0, 6.0), (1.0, 8.0), (5.5, 9.5), (4.0, 1.5)]
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| Site::new(format!("s{}", i), x, y))
            .collect()
    }

    #[test]
    fn delaunay_square_with_centre() {
        let sites = vec![
            Site::new("sw", 0.0, 0.0),
            Site::new("se", 2.0, 0.0),
            Site::new("ne", 2.0, 2.0),
            Site::new("nw", 0.0, 2.0),
            Site::new("c", 1.0, 1.0),
        ];
        let g = proximity_graph(&sites, &ProximityOptions::new(ProximityRule::Delaunay)).unwrap();
        assert_eq!(g.edge_count(), 8);
        assert!((0..4).all(|i| g.has_edge(i, 4)));
        assert!(!g.has_edge(0, 2));
        assert!(!g.has_edge(1, 3));

        // Sides are 2, spokes are sqrt(2)
        let spokes = ProximityOptions::new(ProximityRule::Delaunay).with_max_edge_length(1.5);
        let g = proximity_graph(&sites, &spokes).unwrap();
        assert_eq!(g.edge_count(), 4);
        assert!(g.edges().iter().all(|e| e.b == 4));
    }

    #[test]
    fn rng_within_gabriel_within_delaunay() {
        let sites = scattered();
        let delaunay = proximity_graph(&sites, &ProximityOptions::new(ProximityRule::Delaunay)).unwrap();
        let gabriel = proximity_graph(&sites, &ProximityOptions::new(ProximityRule::Gabriel)).unwrap();
        let rng =
            proximity_graph(&sites, &ProximityOptions::new(ProximityRule::RelativeNeighborhood)).unwrap();
        assert!(gabriel.edges().iter().all(|e| delaunay.has_edge(e.a, e.b)));
        assert!(rng.edges().iter().all(|e| gabriel.has_edge(e.a, e.b)));
        assert!(delaunay.edge_count() >= gabriel.edge_count());
        assert!(delaunay.is_connected());
    }

    #[test]
    fn max_edge_length() {
        let options = ProximityOptions::new(ProximityRule::Threshold { radius: 1.5 }).with_max_edge_length(1.0);
        let g = proximity_graph(&grid_sites(), &options).unwrap();
        assert_eq!(g.edge_count(), 12);
    }

    #[test]
    fn options_from_json() {
        let o: ProximityOptions = serde_json::from_str(r#"{"rule":"knn","k":2}"#).unwrap();
        assert_eq!(o.rule, ProximityRule::Knn { k: 2, mutual: false });
        assert_eq!(o.max_edge_length, None);
        let o: ProximityOptions =
            serde_json::from_str(r#"{"rule":"delaunay","max_edge_length":250.0}"#).unwrap();
        assert_eq!(o.rule, ProximityRule::Delaunay);
        assert_eq!(o.max_edge_length, Some(250.0));
    }
}
