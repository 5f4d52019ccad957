//! End-to-end scenarios on synthetic elevation grids.
//!
//! Each test builds a small DEM in memory and runs a full analysis chain:
//! viewshed to statistics, cost surface to path or corridor, cost matrix to
//! network.

use approx::assert_relative_eq;
use archterra_algorithms::movement::{
    accumulate, build_cost_surface, extract_corridor, extract_path, path_cost, CostPreset,
    CostSurfaceOptions, SearchDirection, ToblerParams, UniformParams,
};
use archterra_algorithms::network::{
    build_knn, build_mst, euclidean_matrix, intervisibility_graph, pairwise_least_cost,
    IntervisibilityOptions, Site, Symmetry, VisibilityRule,
};
use archterra_algorithms::visibility::{
    compute_viewshed, visibility_stats, Viewpoint, ViewshedMode, ViewshedOptions,
};
use archterra_core::{CancelToken, Cell, ElevationGrid, Error, GeoTransform, Monitor};

const CELL: f64 = 10.0;

fn grid_from(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> ElevationGrid {
    let values = (0..rows)
        .flat_map(|r| (0..cols).map(move |c| (r, c)))
        .map(|(r, c)| f(r, c))
        .collect();
    let transform = GeoTransform::new(0.0, rows as f64 * CELL, CELL, -CELL);
    ElevationGrid::from_vec(values, rows, cols, transform, Some(-9999.0)).unwrap()
}

fn flat(rows: usize, cols: usize) -> ElevationGrid {
    grid_from(rows, cols, |_, _| 100.0)
}

/// Gaussian hill of 80 m in the middle of a 21 x 21 grid
fn hill() -> ElevationGrid {
    grid_from(21, 21, |r, c| {
        let (dr, dc) = (r as f64 - 10.0, c as f64 - 10.0);
        100.0 + 80.0 * (-(dr * dr + dc * dc) / 18.0).exp()
    })
}

/// Centre of cell (row, col) in map coordinates
fn centre(grid: &ElevationGrid, row: usize, col: usize) -> (f64, f64) {
    grid.cell_center(Cell::new(row, col))
}

fn tobler() -> CostPreset {
    CostPreset::Tobler(ToblerParams::default())
}

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

#[test]
fn flat_grid_is_fully_visible_from_the_centre() {
    let grid = flat(10, 10);
    let (x, y) = centre(&grid, 5, 5);
    let mode = ViewshedMode::Single {
        viewpoint: Viewpoint::new(x, y),
    };
    let out = compute_viewshed(&grid, &mode, &ViewshedOptions::default(), &Monitor::new()).unwrap();
    let stats = visibility_stats(&out.field, None).unwrap();

    assert_eq!(out.evaluated, 1);
    assert_eq!(stats.visible_cells, 100);
    assert_relative_eq!(stats.visible_ratio, 1.0);
    assert_relative_eq!(stats.visible_area, 100.0 * CELL * CELL);
}

#[test]
fn cumulative_viewshed_skips_viewpoints_off_the_grid() {
    let grid = hill();
    let (x, y) = centre(&grid, 10, 10);
    let mode = ViewshedMode::Cumulative {
        viewpoints: vec![Viewpoint::new(x, y), Viewpoint::new(-500.0, -500.0)],
    };
    let out = compute_viewshed(&grid, &mode, &ViewshedOptions::default(), &Monitor::new()).unwrap();

    assert_eq!(out.evaluated, 1);
    assert_eq!(out.failures.len(), 1);
    assert_eq!(out.failures[0].index, 1);
}

#[test]
fn intervisibility_edges_are_undirected_and_mutual_is_stricter() {
    let grid = hill();
    let sites: Vec<Site> = [(2, 2), (2, 18), (18, 2), (18, 18), (10, 10), (5, 10)]
        .iter()
        .enumerate()
        .map(|(i, &(r, c))| {
            let (x, y) = centre(&grid, r, c);
            Site::new(format!("s{}", i), x, y)
        })
        .collect();

    let mutual = IntervisibilityOptions::default();
    let either = IntervisibilityOptions {
        rule: VisibilityRule::Either,
        ..mutual
    };
    let m = intervisibility_graph(&grid, &sites, &mutual, &Monitor::new()).unwrap();
    let e = intervisibility_graph(&grid, &sites, &either, &Monitor::new()).unwrap();

    assert_eq!(m.evaluated, 15);
    assert!(m.failures.is_empty());
    for edge in m.graph.edges() {
        assert!(edge.a < edge.b);
        assert!(e.graph.has_edge(edge.b, edge.a));
    }
    // Opposite corners are hidden from each other by the summit
    assert!(!m.graph.has_edge(0, 3));
    assert!(!m.graph.has_edge(1, 2));
    assert!(!e.graph.has_edge(0, 3));
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

#[test]
fn sources_cost_nothing_and_costs_grow_along_paths() {
    let grid = hill();
    let model = tobler();
    let surface = build_cost_surface(&grid, &model, None, &CostSurfaceOptions::default()).unwrap();
    let source = Cell::new(0, 0);
    let field = accumulate(&surface, &[source], SearchDirection::Outbound, &Monitor::new()).unwrap();

    assert_eq!(field.cost_at(source).unwrap(), 0.0);
    let path = extract_path(&field, Cell::new(20, 20)).unwrap();
    assert_eq!(path.start(), Some(source));
    for w in path.cells.windows(2) {
        assert!(field.cost_at(w[0]).unwrap() <= field.cost_at(w[1]).unwrap());
    }
}

#[test]
fn path_cost_matches_accumulated_cost_both_ways() {
    let grid = hill();
    let model = tobler();
    let surface = build_cost_surface(&grid, &model, None, &CostSurfaceOptions::default()).unwrap();
    let (a, b) = (Cell::new(3, 1), Cell::new(17, 19));

    let outbound = accumulate(&surface, &[a], SearchDirection::Outbound, &Monitor::new()).unwrap();
    let there = extract_path(&outbound, b).unwrap();
    assert_eq!(there.end(), Some(b));
    assert_relative_eq!(
        path_cost(&surface, &there).unwrap(),
        outbound.cost_at(b).unwrap(),
        max_relative = 1e-9
    );

    let inbound = accumulate(&surface, &[a], SearchDirection::Inbound, &Monitor::new()).unwrap();
    let back = extract_path(&inbound, b).unwrap();
    assert_eq!(back.start(), Some(b));
    assert_eq!(back.end(), Some(a));
    assert_relative_eq!(
        path_cost(&surface, &back).unwrap(),
        inbound.cost_at(b).unwrap(),
        max_relative = 1e-9
    );
}

#[test]
fn corridor_contains_the_least_cost_path_and_grows_with_budget() {
    let grid = hill();
    let model = tobler();
    let surface = build_cost_surface(&grid, &model, None, &CostSurfaceOptions::default()).unwrap();
    let (a, b) = (Cell::new(10, 0), Cell::new(10, 20));

    let from_a = accumulate(&surface, &[a], SearchDirection::Outbound, &Monitor::new()).unwrap();
    let to_b = accumulate(&surface, &[b], SearchDirection::Inbound, &Monitor::new()).unwrap();
    let corridor = extract_corridor(&from_a, &to_b).unwrap();
    assert_relative_eq!(corridor.lcp_cost(), from_a.cost_at(b).unwrap(), max_relative = 1e-9);

    let tight = corridor.mask(0.0).unwrap();
    let path = extract_path(&from_a, b).unwrap();
    for cell in &path.cells {
        assert_eq!(tight.get(cell.row, cell.col).unwrap(), 1);
    }

    let mut previous = 0;
    for budget in [0.0, 10.0, 60.0, 300.0, 1e9] {
        let cells = corridor.summary(budget).unwrap().cells;
        assert!(cells >= previous);
        previous = cells;
    }
    assert_eq!(previous, 21 * 21);
}

#[test]
fn cancelled_accumulation_returns_cancelled() {
    let grid = hill();
    let model = tobler();
    let surface = build_cost_surface(&grid, &model, None, &CostSurfaceOptions::default()).unwrap();
    let token = CancelToken::new();
    token.cancel();
    let monitor = Monitor::new().with_cancel(token).with_interval(1);

    let result = accumulate(&surface, &[Cell::new(0, 0)], SearchDirection::Outbound, &monitor);
    assert!(matches!(result, Err(Error::Cancelled)));
}

// ---------------------------------------------------------------------------
// Barrier of no-data between opposite corners
// ---------------------------------------------------------------------------

/// 10 x 10 grid with a two-cell-wide no-data band along the anti-diagonal
fn split_grid() -> ElevationGrid {
    grid_from(10, 10, |r, c| if r + c == 9 || r + c == 10 { -9999.0 } else { 50.0 })
}

#[test]
fn nodata_band_makes_the_far_corner_unreachable() {
    let grid = split_grid();
    let model = tobler();
    let surface = build_cost_surface(&grid, &model, None, &CostSurfaceOptions::default()).unwrap();
    let field = accumulate(&surface, &[Cell::new(0, 0)], SearchDirection::Outbound, &Monitor::new()).unwrap();

    assert!(field.is_reached(Cell::new(0, 8)));
    assert!(!field.is_reached(Cell::new(9, 9)));
    assert!(matches!(
        extract_path(&field, Cell::new(9, 9)),
        Err(Error::Unreachable { row: 9, col: 9 })
    ));
}

#[test]
fn nodata_band_disconnects_the_spanning_tree() {
    let grid = split_grid();
    let model = tobler();
    let surface = build_cost_surface(&grid, &model, None, &CostSurfaceOptions::default()).unwrap();
    let (x0, y0) = centre(&grid, 0, 0);
    let (x9, y9) = centre(&grid, 9, 9);
    let sites = vec![Site::new("nw", x0, y0), Site::new("se", x9, y9)];

    let costs = pairwise_least_cost(&surface, &sites, &Monitor::new()).unwrap();
    assert!(costs.failures.is_empty());
    assert!(costs.matrix.get(0, 1).is_infinite());
    assert!(matches!(
        build_mst(&costs.matrix, &sites, Symmetry::Average),
        Err(Error::DisconnectedGraph(_))
    ));
}

// ---------------------------------------------------------------------------
// Networks
// ---------------------------------------------------------------------------

fn row_of_sites(grid: &ElevationGrid, n: usize) -> Vec<Site> {
    (0..n)
        .map(|i| {
            let (x, y) = centre(grid, 5, 2 + 3 * i);
            Site::new(format!("site{}", i), x, y)
        })
        .collect()
}

#[test]
fn knn_with_one_neighbour_on_collinear_sites() {
    let grid = flat(11, 17);
    let model = CostPreset::Uniform(UniformParams::default());
    let surface = build_cost_surface(&grid, &model, None, &CostSurfaceOptions::default()).unwrap();
    let sites = row_of_sites(&grid, 5);

    let costs = pairwise_least_cost(&surface, &sites, &Monitor::new()).unwrap();
    let graph = build_knn(&costs.matrix, &sites, 1, false).unwrap();

    assert!(graph.edge_count() <= 5);
    assert!(graph.degrees().iter().all(|&d| d >= 1));
    assert!(graph.has_edge(0, 1));
    assert!(graph.has_edge(3, 4));
}

#[test]
fn spanning_tree_over_a_hill_has_n_minus_one_edges() {
    let grid = hill();
    let model = tobler();
    let surface = build_cost_surface(&grid, &model, None, &CostSurfaceOptions::default()).unwrap();
    let sites: Vec<Site> = [(1, 1), (1, 19), (19, 1), (19, 19), (10, 3), (3, 10)]
        .iter()
        .enumerate()
        .map(|(i, &(r, c))| {
            let (x, y) = centre(&grid, r, c);
            Site::new(format!("s{}", i), x, y)
        })
        .collect();

    let costs = pairwise_least_cost(&surface, &sites, &Monitor::new()).unwrap();
    let mst = build_mst(&costs.matrix, &sites, Symmetry::Average).unwrap();
    assert_eq!(mst.edge_count(), sites.len() - 1);
    assert!(mst.is_connected());

    let planar = build_mst(&euclidean_matrix(&sites).unwrap(), &sites, Symmetry::Average).unwrap();
    assert_eq!(planar.edge_count(), sites.len() - 1);
}
