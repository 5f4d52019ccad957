//! 2-D k-d tree over site positions
//!
//! Nearest-neighbour, k-nearest and radius queries. Equal distances are
//! ordered by point index, so results are deterministic with duplicate or
//! equidistant sites.
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

use std::cmp::Ordering;

#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    points: Vec<(f64, f64)>,
}

#[derive(Debug)]
struct KdNode {
    /// Index into `points`
    point_idx: usize,
    /// Split dimension: 0 = x, 1 = y
    split_dim: u8,
    left: Option<usize>,
    right: Option<usize>,
}

/// A query hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance_sq: f64,
}

impl Neighbor {
    pub fn distance(&self) -> f64 {
        self.distance_sq.sqrt()
    }

    fn key_cmp(&self, other: &Self) -> Ordering {
        self.distance_sq
            .total_cmp(&other.distance_sq)
            .then(self.index.cmp(&other.index))
    }
}

impl KdTree {
    /// Build with median splits, O(n log^2 n).
    pub fn build(points: &[(f64, f64)]) -> Self {
        let mut nodes = Vec::with_capacity(points.len());
        if !points.is_empty() {
            let mut indices: Vec<usize> = (0..points.len()).collect();
            build_recursive(points, &mut indices, 0, &mut nodes);
        }
        Self {
            nodes,
            points: points.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn hit(&self, idx: usize, qx: f64, qy: f64) -> Neighbor {
        let (x, y) = self.points[idx];
        Neighbor {
            index: idx,
            distance_sq: (qx - x) * (qx - x) + (qy - y) * (qy - y),
        }
    }

    /// Signed offset of the query from a node's splitting plane
    fn plane_offset(&self, node: &KdNode, qx: f64, qy: f64) -> f64 {
        let (x, y) = self.points[node.point_idx];
        if node.split_dim == 0 {
            qx - x
        } else {
            qy - y
        }
    }

    pub fn nearest(&self, qx: f64, qy: f64) -> Option<Neighbor> {
        self.k_nearest(qx, qy, 1).into_iter().next()
    }

    /// Up to `k` points ordered by (distance, index).
    pub fn k_nearest(&self, qx: f64, qy: f64, k: usize) -> Vec<Neighbor> {
        if self.nodes.is_empty() || k == 0 {
            return Vec::new();
        }
        // Kept sorted ascending; the last entry is the current k-th best
        let mut best: Vec<Neighbor> = Vec::with_capacity(k + 1);
        self.knn_recursive(0, qx, qy, k, &mut best);
        best
    }

    fn knn_recursive(&self, node_idx: usize, qx: f64, qy: f64, k: usize, best: &mut Vec<Neighbor>) {
        let node = &self.nodes[node_idx];
        let hit = self.hit(node.point_idx, qx, qy);

        let admit = best.len() < k || best.last().is_some_and(|w| hit.key_cmp(w) == Ordering::Less);
        if admit {
            let pos = best
                .binary_search_by(|probe| probe.key_cmp(&hit))
                .unwrap_or_else(|e| e);
            best.insert(pos, hit);
            best.truncate(k);
        }

        let diff = self.plane_offset(node, qx, qy);
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = first {
            self.knn_recursive(child, qx, qy, k, best);
        }

        // Ties across the plane can still win on index
        let explore = best.len() < k || best.last().is_some_and(|w| diff * diff <= w.distance_sq);
        if explore {
            if let Some(child) = second {
                self.knn_recursive(child, qx, qy, k, best);
            }
        }
    }

    /// All points within `radius` (inclusive), ordered by (distance, index).
    pub fn within_radius(&self, qx: f64, qy: f64, radius: f64) -> Vec<Neighbor> {
        if self.nodes.is_empty() || !(radius >= 0.0) {
            return Vec::new();
        }
        let mut results = Vec::new();
        self.radius_recursive(0, qx, qy, radius * radius, &mut results);
        results.sort_by(Neighbor::key_cmp);
        results
    }

    fn radius_recursive(&self, node_idx: usize, qx: f64, qy: f64, radius_sq: f64, results: &mut Vec<Neighbor>) {
        let node = &self.nodes[node_idx];
        let hit = self.hit(node.point_idx, qx, qy);
        if hit.distance_sq <= radius_sq {
            results.push(hit);
        }

        let diff = self.plane_offset(node, qx, qy);
        if let Some(left) = node.left {
            if diff > 0.0 || diff * diff <= radius_sq {
                self.radius_recursive(left, qx, qy, radius_sq, results);
            }
        }
        if let Some(right) = node.right {
            if diff < 0.0 || diff * diff <= radius_sq {
                self.radius_recursive(right, qx, qy, radius_sq, results);
            }
        }
    }
}

fn build_recursive(
    points: &[(f64, f64)],
    indices: &mut [usize],
    depth: usize,
    nodes: &mut Vec<KdNode>,
) -> usize {
    let split_dim = (depth % 2) as u8;
    let coord = |i: usize| if split_dim == 0 { points[i].0 } else { points[i].1 };
    indices.sort_by(|&a, &b| coord(a).total_cmp(&coord(b)).then(a.cmp(&b)));

    let median = indices.len() / 2;
    let node_idx = nodes.len();
    nodes.push(KdNode {
        point_idx: indices[median],
        split_dim,
        left: None,
        right: None,
    });

    let (left, rest) = indices.split_at_mut(median);
    let right = &mut rest[1..];
    if !left.is_empty() {
        let child = build_recursive(points, left, depth + 1, nodes);
        nodes[node_idx].left = Some(child);
    }
    if !right.is_empty() {
        let child = build_recursive(points, right, depth + 1, nodes);
        nodes[node_idx].right = Some(child);
    }
    node_idx
}
