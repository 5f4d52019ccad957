//! Undirected site graphs

use std::collections::BTreeMap;

use serde::Serialize;

use super::site::Site;

/// What produced an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Mst,
    Knn,
    /// Node to one of its nearest hubs
    HubLink,
    /// Hub to hub, from the hub spanning tree
    HubMst,
    Proximity,
    Intervisibility,
}

/// An undirected edge with `a < b`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Edge {
    pub a: usize,
    pub b: usize,
    pub weight: f64,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(a: usize, b: usize, weight: f64, kind: EdgeKind) -> Self {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        Self { a, b, weight, kind }
    }

    pub fn other(&self, node: usize) -> Option<usize> {
        if node == self.a {
            Some(self.b)
        } else if node == self.b {
            Some(self.a)
        } else {
            None
        }
    }
}

/// Sites plus undirected weighted edges.
///
/// At most one edge per node pair; adding a duplicate keeps the cheaper one.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkGraph {
    pub nodes: Vec<Site>,
    edges: Vec<Edge>,
    #[serde(skip)]
    lookup: BTreeMap<(usize, usize), usize>,
}

impl NetworkGraph {
    pub fn new(nodes: Vec<Site>) -> Self {
        Self {
            nodes,
            edges: Vec::new(),
            lookup: BTreeMap::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Insert an edge; self-loops and out-of-range nodes are ignored.
    ///
    /// Returns whether the graph changed.
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        if edge.a == edge.b || edge.b >= self.nodes.len() {
            return false;
        }
        match self.lookup.get(&(edge.a, edge.b)) {
            Some(&i) => {
                if edge.weight < self.edges[i].weight {
                    self.edges[i] = edge;
                    true
                } else {
                    false
                }
            }
            None => {
                self.lookup.insert((edge.a, edge.b), self.edges.len());
                self.edges.push(edge);
                true
            }
        }
    }

    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.lookup.contains_key(&key)
    }

    pub fn edge_between(&self, a: usize, b: usize) -> Option<&Edge> {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.lookup.get(&key).map(|&i| &self.edges[i])
    }

    /// Neighbours of every node with the connecting edge weight
    pub fn adjacency(&self) -> Vec<Vec<(usize, f64)>> {
        let mut adj = vec![Vec::new(); self.nodes.len()];
        for e in &self.edges {
            adj[e.a].push((e.b, e.weight));
            adj[e.b].push((e.a, e.weight));
        }
        for list in &mut adj {
            list.sort_by_key(|&(n, _)| n);
        }
        adj
    }

    pub fn degrees(&self) -> Vec<usize> {
        let mut deg = vec![0; self.nodes.len()];
        for e in &self.edges {
            deg[e.a] += 1;
            deg[e.b] += 1;
        }
        deg
    }

    pub fn total_weight(&self) -> f64 {
        self.edges.iter().map(|e| e.weight).sum()
    }

    /// Connected components, each sorted, ordered by smallest member
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut uf = UnionFind::new(self.nodes.len());
        for e in &self.edges {
            uf.union(e.a, e.b);
        }
        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for node in 0..self.nodes.len() {
            groups.entry(uf.find(node)).or_default().push(node);
        }
        let mut comps: Vec<Vec<usize>> = groups.into_values().collect();
        comps.sort_by_key(|c| c[0]);
        comps
    }

    pub fn is_connected(&self) -> bool {
        self.components().len() <= 1
    }

    /// Sort edges by (a, b) for stable output
    pub(crate) fn sort_edges(&mut self) {
        self.edges.sort_by_key(|e| (e.a, e.b));
        self.lookup = self
            .edges
            .iter()
            .enumerate()
            .map(|(i, e)| ((e.a, e.b), i))
            .collect();
    }
}

/// Disjoint-set forest with path halving and union by size
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merge the sets of `a` and `b`; false when already joined
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(n: usize) -> Vec<Site> {
        (0..n).map(|i| Site::new(format!("s{}", i), i as f64, 0.0)).collect()
    }

    #[test]
    fn edges_are_normalised_and_deduplicated() {
        let mut g = NetworkGraph::new(nodes(3));
        assert!(g.add_edge(Edge::new(2, 0, 5.0, EdgeKind::Knn)));
        assert!(!g.add_edge(Edge::new(0, 2, 7.0, EdgeKind::Knn)));
        assert!(g.add_edge(Edge::new(0, 2, 3.0, EdgeKind::Knn)));
        assert!(!g.add_edge(Edge::new(1, 1, 1.0, EdgeKind::Knn)));
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.edges()[0].a, 0);
        assert_eq!(g.edge_between(2, 0).unwrap().weight, 3.0);
    }

    #[test]
    fn components_and_degrees() {
        let mut g = NetworkGraph::new(nodes(5));
        g.add_edge(Edge::new(0, 1, 1.0, EdgeKind::Mst));
        g.add_edge(Edge::new(3, 4, 1.0, EdgeKind::Mst));
        assert_eq!(g.components(), vec![vec![0, 1], vec![2], vec![3, 4]]);
        assert!(!g.is_connected());
        assert_eq!(g.degrees(), vec![1, 1, 0, 1, 1]);
    }

    #[test]
    fn union_find() {
        let mut uf = UnionFind::new(4);
        assert!(uf.union(0, 1));
        assert!(uf.union(2, 3));
        assert!(!uf.union(1, 0));
        assert!(uf.union(1, 3));
        assert_eq!(uf.find(0), uf.find(2));
    }
}
