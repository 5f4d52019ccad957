//! Node centrality
//!
//! Degree, closeness and Brandes betweenness on undirected site graphs,
//! either hop-based (BFS) or weighted (Dijkstra).
//!
//! Reference:
//! Brandes, U. (2001). A faster algorithm for betweenness centrality.
//! Journal of Mathematical Sociology, 25(2).

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use serde::{Deserialize, Serialize};

use super::graph::NetworkGraph;
use crate::maybe_rayon::*;
use archterra_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CentralityOptions {
    /// Use edge weights as distances; hop counts otherwise
    pub weighted: bool,
    /// Compute on each component instead of failing on a disconnected graph
    pub allow_disconnected: bool,
}

impl Default for CentralityOptions {
    fn default() -> Self {
        Self {
            weighted: true,
            allow_disconnected: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeCentrality {
    pub index: usize,
    pub id: String,
    pub degree: usize,
    /// Reachable nodes over the sum of their distances; 0 when isolated
    pub closeness: f64,
    /// Shortest paths through the node, each unordered pair counted once
    pub betweenness: f64,
}

/// Single-source shortest-path DAG for Brandes' accumulation
struct Sweep {
    /// Nodes in non-decreasing distance order
    order: Vec<usize>,
    dist: Vec<f64>,
    sigma: Vec<f64>,
    preds: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct State {
    dist: f64,
    node: usize,
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
            .dist
            .total_cmp(&self.dist)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Relative tolerance for equal-length shortest paths
const TIE_EPSILON: f64 = 1e-12;

fn sweep_bfs(adj: &[Vec<(usize, f64)>], s: usize) -> Sweep {
    let n = adj.len();
    let mut dist = vec![f64::INFINITY; n];
    let mut sigma = vec![0.0; n];
    let mut preds = vec![Vec::new(); n];
    let mut order = Vec::with_capacity(n);
    let mut queue = VecDeque::new();

    dist[s] = 0.0;
    sigma[s] = 1.0;
    queue.push_back(s);
    while let Some(v) = queue.pop_front() {
        order.push(v);
        for &(w, _) in &adj[v] {
            if dist[w].is_infinite() {
                dist[w] = dist[v] + 1.0;
                queue.push_back(w);
            }
            if dist[w] == dist[v] + 1.0 {
                sigma[w] += sigma[v];
                preds[w].push(v);
            }
        }
    }
    Sweep { order, dist, sigma, preds }
}

fn sweep_dijkstra(adj: &[Vec<(usize, f64)>], s: usize) -> Sweep {
    let n = adj.len();
    let mut dist = vec![f64::INFINITY; n];
    let mut sigma = vec![0.0; n];
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut done = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut heap = BinaryHeap::new();

    dist[s] = 0.0;
    sigma[s] = 1.0;
    heap.push(State { dist: 0.0, node: s });
    while let Some(State { dist: d, node: v }) = heap.pop() {
        if done[v] {
            continue;
        }
        done[v] = true;
        order.push(v);
        for &(w, weight) in &adj[v] {
            if done[w] {
                continue;
            }
            let candidate = d + weight;
            let tol = TIE_EPSILON * candidate.abs().max(1.0);
            if candidate < dist[w] - tol {
                dist[w] = candidate;
                sigma[w] = sigma[v];
                preds[w].clear();
                preds[w].push(v);
                heap.push(State { dist: candidate, node: w });
            } else if (candidate - dist[w]).abs() <= tol {
                sigma[w] += sigma[v];
                preds[w].push(v);
            }
        }
    }
    Sweep { order, dist, sigma, preds }
}

/// Degree, closeness and betweenness of every node.
///
/// Fails with [`Error::DisconnectedGraph`] on a disconnected graph unless
/// `allow_disconnected` is set, in which case closeness only counts the
/// nodes each node can reach.
pub fn centrality(graph: &NetworkGraph, options: &CentralityOptions) -> Result<Vec<NodeCentrality>> {
    let n = graph.node_count();
    if !options.allow_disconnected && !graph.is_connected() {
        return Err(Error::DisconnectedGraph(format!(
            "{} components; set allow_disconnected to analyse them separately",
            graph.components().len()
        )));
    }
    if options.weighted {
        if let Some(e) = graph.edges().iter().find(|e| !(e.weight.is_finite() && e.weight >= 0.0)) {
            return Err(Error::invalid_parameter(
                "weight",
                e.weight,
                format!("edge ({}, {}) needs a finite non-negative weight", e.a, e.b),
            ));
        }
    }

    let adj = graph.adjacency();
    let per_source: Vec<(f64, Vec<f64>)> = (0..n)
        .into_par_iter()
        .map(|s| {
            let sweep = if options.weighted {
                sweep_dijkstra(&adj, s)
            } else {
                sweep_bfs(&adj, s)
            };

            let reachable = sweep.order.len() - 1;
            let total: f64 = sweep.order.iter().map(|&v| sweep.dist[v]).sum();
            let closeness = if reachable > 0 && total > 0.0 {
                reachable as f64 / total
            } else {
                0.0
            };

            let mut delta = vec![0.0; n];
            for &w in sweep.order.iter().rev() {
                for &v in &sweep.preds[w] {
                    delta[v] += sweep.sigma[v] / sweep.sigma[w] * (1.0 + delta[w]);
                }
            }
            delta[s] = 0.0;
            (closeness, delta)
        })
        .collect();

    let degrees = graph.degrees();
    let mut betweenness = vec![0.0; n];
    for (_, delta) in &per_source {
        for (b, d) in betweenness.iter_mut().zip(delta) {
            *b += d;
        }
    }

    Ok((0..n)
        .map(|i| NodeCentrality {
            index: i,
            id: graph.nodes[i].id.clone(),
            degree: degrees[i],
            closeness: per_source[i].0,
            betweenness: betweenness[i] * 0.5,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::graph::{Edge, EdgeKind};
    use crate::network::site::Site;
    use approx::assert_relative_eq;

    fn path_graph(n: usize) -> NetworkGraph {
        let nodes = (0..n).map(|i| Site::new(format!("s{}", i), i as f64, 0.0)).collect();
        let mut g = NetworkGraph::new(nodes);
        for i in 0..n - 1 {
            g.add_edge(Edge::new(i, i + 1, 2.0, EdgeKind::Mst));
        }
        g
    }

    #[test]
    fn path_of_three() {
        let g = path_graph(3);
        let c = centrality(&g, &CentralityOptions::default()).unwrap();
        assert_eq!(c[1].degree, 2);
        assert_relative_eq!(c[1].betweenness, 1.0);
        assert_relative_eq!(c[0].betweenness, 0.0);
        // Weighted: middle node reaches 2 nodes at distance 2 each
        assert_relative_eq!(c[1].closeness, 0.5);
        assert_relative_eq!(c[0].closeness, 2.0 / 6.0);
    }

    #[test]
    fn hop_based() {
        let g = path_graph(5);
        let options = CentralityOptions { weighted: false, ..Default::default() };
        let c = centrality(&g, &options).unwrap();
        assert_relative_eq!(c[2].betweenness, 4.0);
        assert_relative_eq!(c[1].betweenness, 3.0);
        assert_relative_eq!(c[2].closeness, 4.0 / 6.0);
    }

    #[test]
    fn split_shortest_paths() {
        // Square 0-1-2-3-0: paths 0->2 go through 1 or 3
        let nodes = (0..4).map(|i| Site::new(format!("s{}", i), 0.0, 0.0)).collect();
        let mut g = NetworkGraph::new(nodes);
        for (a, b) in [(0, 1), (1, 2), (2, 3), (3, 0)] {
            g.add_edge(Edge::new(a, b, 1.0, EdgeKind::Knn));
        }
        let c = centrality(&g, &CentralityOptions::default()).unwrap();
        for node in &c {
            assert_relative_eq!(node.betweenness, 0.5);
        }
    }

    #[test]
    fn disconnected_graphs() {
        let nodes = (0..3).map(|i| Site::new(format!("s{}", i), 0.0, 0.0)).collect();
        let mut g = NetworkGraph::new(nodes);
        g.add_edge(Edge::new(0, 1, 1.0, EdgeKind::Knn));

        assert!(matches!(
            centrality(&g, &CentralityOptions::default()),
            Err(Error::DisconnectedGraph(_))
        ));

        let options = CentralityOptions { allow_disconnected: true, ..Default::default() };
        let c = centrality(&g, &options).unwrap();
        assert_eq!(c[2].closeness, 0.0);
        assert_relative_eq!(c[0].closeness, 1.0);
    }
}
