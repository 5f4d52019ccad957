//! Delaunay triangulation of site positions (incremental Bowyer-Watson)
//!
//! Only the edge set is kept. Sites sharing a position are triangulated
//! once and linked to the first site at that position; a collinear set has
//! no triangles and yields the chain of consecutive sites along the line.
//!
//! References:
//! - Bowyer, A. (1981). Computing Dirichlet tessellations. The Computer
//!   Journal, 24(2).
//! - Watson, D.F. (1981). Computing the n-dimensional Delaunay tessellation
//!   with application to Voronoi polytopes. The Computer Journal, 24(2).

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy)]
struct Triangle {
    v: [usize; 3],
    cx: f64,
    cy: f64,
    radius_sq: f64,
}

impl Triangle {
    /// `None` for a degenerate (collinear) triple
    fn new(v: [usize; 3], points: &[(f64, f64)]) -> Option<Self> {
        let (ax, ay) = points[v[0]];
        let (bx, by) = points[v[1]];
        let (cx, cy) = points[v[2]];

        let d = 2.0 * (ax * (by - cy) + bx * (cy - ay) + cx * (ay - by));
        let scale = (bx - ax).abs().max((by - ay).abs()).max((cx - ax).abs()).max((cy - ay).abs());
        if d.abs() <= 1e-12 * scale * scale {
            return None;
        }

        let a2 = ax * ax + ay * ay;
        let b2 = bx * bx + by * by;
        let c2 = cx * cx + cy * cy;
        let ux = (a2 * (by - cy) + b2 * (cy - ay) + c2 * (ay - by)) / d;
        let uy = (a2 * (cx - bx) + b2 * (ax - cx) + c2 * (bx - ax)) / d;

        Some(Self {
            v,
            cx: ux,
            cy: uy,
            radius_sq: (ax - ux).powi(2) + (ay - uy).powi(2),
        })
    }

    fn encloses(&self, (x, y): (f64, f64)) -> bool {
        (x - self.cx).powi(2) + (y - self.cy).powi(2) <= self.radius_sq
    }

    fn edges(&self) -> [(usize, usize); 3] {
        let [a, b, c] = self.v;
        [(a, b), (b, c), (c, a)]
    }
}

fn undirected(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

/// Triangles over `points`, as index triples into `points`.
fn triangulate(points: &[(f64, f64)]) -> Vec<[usize; 3]> {
    if points.len() < 3 {
        return Vec::new();
    }

    let (mut min_x, mut min_y) = (f64::MAX, f64::MAX);
    let (mut max_x, mut max_y) = (f64::MIN, f64::MIN);
    for &(x, y) in points {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    let delta = (max_x - min_x).max(max_y - min_y).max(1.0) * 100.0;
    let mid_x = (min_x + max_x) / 2.0;

    // Super-triangle vertices sit after the real points
    let n = points.len();
    let mut vertices = points.to_vec();
    vertices.push((min_x - delta, min_y - delta));
    vertices.push((mid_x, max_y + delta));
    vertices.push((max_x + delta, min_y - delta));

    let mut triangles: Vec<Triangle> = Triangle::new([n, n + 1, n + 2], &vertices).into_iter().collect();

    for vi in 0..n {
        let p = vertices[vi];
        let (bad, kept): (Vec<Triangle>, Vec<Triangle>) =
            triangles.into_iter().partition(|t| t.encloses(p));

        // Hole boundary: edges used by exactly one bad triangle
        let mut uses: BTreeMap<(usize, usize), ((usize, usize), usize)> = BTreeMap::new();
        for (a, b) in bad.iter().flat_map(Triangle::edges) {
            uses.entry(undirected(a, b)).or_insert(((a, b), 0)).1 += 1;
        }

        triangles = kept;
        triangles.extend(
            uses.into_values()
                .filter(|&(_, count)| count == 1)
                .filter_map(|((a, b), _)| Triangle::new([a, b, vi], &vertices)),
        );
    }

    triangles
        .into_iter()
        .filter(|t| t.v.iter().all(|&v| v < n))
        .map(|t| t.v)
        .collect()
}

/// Consecutive pairs after ordering points along the line through the set
fn chain(points: &[(f64, f64)], members: &[usize]) -> Vec<(usize, usize)> {
    let Some(&first) = members.first() else {
        return Vec::new();
    };
    let origin = points[first];
    let far = members
        .iter()
        .map(|&i| points[i])
        .max_by(|a, b| {
            let da = (a.0 - origin.0).powi(2) + (a.1 - origin.1).powi(2);
            let db = (b.0 - origin.0).powi(2) + (b.1 - origin.1).powi(2);
            da.total_cmp(&db)
        })
        .unwrap_or(origin);
    let (ux, uy) = (far.0 - origin.0, far.1 - origin.1);

    let mut ordered = members.to_vec();
    ordered.sort_by(|&a, &b| {
        let ta = (points[a].0 - origin.0) * ux + (points[a].1 - origin.1) * uy;
        let tb = (points[b].0 - origin.0) * ux + (points[b].1 - origin.1) * uy;
        ta.total_cmp(&tb).then(a.cmp(&b))
    });
    ordered.windows(2).map(|w| undirected(w[0], w[1])).collect()
}

/// Undirected Delaunay edges `(i, j)` with `i < j`, sorted.
pub(crate) fn delaunay_edges(points: &[(f64, f64)]) -> Vec<(usize, usize)> {
    // First index at each distinct position
    let mut first_at: BTreeMap<(u64, u64), usize> = BTreeMap::new();
    let mut representative = Vec::with_capacity(points.len());
    for (i, &(x, y)) in points.iter().enumerate() {
        let key = ((x + 0.0).to_bits(), (y + 0.0).to_bits());
        representative.push(*first_at.entry(key).or_insert(i));
    }

    let members: Vec<usize> = (0..points.len()).filter(|&i| representative[i] == i).collect();
    let distinct: Vec<(f64, f64)> = members.iter().map(|&i| points[i]).collect();

    let mut edges: BTreeSet<(usize, usize)> = BTreeSet::new();
    let triangles = triangulate(&distinct);
    if triangles.is_empty() {
        edges.extend(chain(points, &members));
    } else {
        for [a, b, c] in triangles {
            let (a, b, c) = (members[a], members[b], members[c]);
            edges.insert(undirected(a, b));
            edges.insert(undirected(b, c));
            edges.insert(undirected(c, a));
        }
    }
    for (i, &r) in representative.iter().enumerate() {
        if r != i {
            edges.insert(undirected(r, i));
        }
    }

    edges.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_with_centre() {
        // Every corner links to the centre; the hull closes the fan
        let points = [(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0), (1.0, 1.0)];
        let edges = delaunay_edges(&points);
        assert_eq!(
            edges,
            vec![(0, 1), (0, 3), (0, 4), (1, 2), (1, 4), (2, 3), (2, 4), (3, 4)]
        );
    }

    #[test]
    fn empty_circle_picks_the_short_diagonal() {
        // Flattened rhombus: the short vertical diagonal is Delaunay
        let points = [(0.0, 0.0), (2.0, -0.5), (4.0, 0.0), (2.0, 0.5)];
        let edges = delaunay_edges(&points);
        assert!(edges.contains(&(1, 3)));
        assert!(!edges.contains(&(0, 2)));
        assert_eq!(edges.len(), 5);
    }

    #[test]
    fn edge_and_triangle_counts_follow_euler() {
        // 3n - 3 - h edges and 2n - 2 - h triangles for h hull vertices
        let points: Vec<(f64, f64)> = (0..25)
            .map(|i| {
                let (r, c) = ((i / 5) as f64, (i % 5) as f64);
                (c * 10.0 + 0.37 * r * r, r * 10.0 + 0.21 * c * c)
            })
            .collect();
        let triangles = triangulate(&points);
        let edges = delaunay_edges(&points);
        assert_eq!(edges.len() - triangles.len(), 25 - 1);
        assert_eq!(triangles.len(), 38);
    }

    #[test]
    fn collinear_points_form_a_chain() {
        let points = [(3.0, 3.0), (0.0, 0.0), (2.0, 2.0), (1.0, 1.0)];
        assert_eq!(delaunay_edges(&points), vec![(0, 2), (1, 3), (2, 3)]);
    }

    #[test]
    fn duplicates_attach_to_first_site() {
        let points = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 0.0)];
        let edges = delaunay_edges(&points);
        assert_eq!(edges, vec![(0, 1), (0, 2), (1, 2), (1, 3)]);
    }

    #[test]
    fn fewer_than_three() {
        assert!(delaunay_edges(&[]).is_empty());
        assert_eq!(delaunay_edges(&[(0.0, 0.0), (5.0, 5.0)]), vec![(0, 1)]);
    }
}
