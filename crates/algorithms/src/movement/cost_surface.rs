//! Anisotropic cost surface over an elevation grid
//!
//! The surface is an implicit graph: nodes are valid cells, edges are the
//! 4 or 8 moves to valid neighbours, and an edge's cost is evaluated at
//! traversal time from the directional slope of that move:
//!
//! ```text
//! edge(a -> b) = cost_per_metre((z_b - z_a) / d) * d * (f_a + f_b) / 2
//! ```
//!
//! where `d` is the planar step length and `f` the optional friction
//! multiplier (1 when absent).

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cost_model::{validate_model, CostUnits, SlopeCost};
use archterra_core::raster::{Cell, Direction, ElevationGrid, Raster};
use archterra_core::{Error, Result};

/// An implicit directed grid graph.
pub trait GridGraph: Sync {
    fn shape(&self) -> (usize, usize);

    /// Moves considered from every cell
    fn directions(&self) -> &[Direction];

    /// Cost of the move from `from` one step in `dir`.
    ///
    /// `Ok(None)` when the move leaves the grid or touches an impassable
    /// cell; `Err` only for a model that produced an invalid cost.
    fn edge_cost(&self, from: Cell, dir: Direction) -> Result<Option<f64>>;

    /// Whether a cell can be part of a route at all
    fn is_passable(&self, cell: Cell) -> bool;

    /// Raster whose georeferencing outputs inherit
    fn reference(&self) -> &Raster<f64>;
}

/// Connectivity options
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostSurfaceOptions {
    /// 8-connectivity when true, 4-connectivity otherwise
    pub allow_diagonal: bool,
}

impl Default for CostSurfaceOptions {
    fn default() -> Self {
        Self { allow_diagonal: true }
    }
}

/// Slope-driven cost surface over an [`ElevationGrid`].
pub struct CostSurface<'a> {
    grid: &'a ElevationGrid,
    model: &'a dyn SlopeCost,
    friction: Option<&'a Raster<f64>>,
    directions: &'static [Direction],
}

impl std::fmt::Debug for CostSurface<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostSurface")
            .field("shape", &self.grid.shape())
            .field("model", &self.model.name())
            .field("friction", &self.friction.is_some())
            .field("directions", &self.directions.len())
            .finish()
    }
}

impl<'a> CostSurface<'a> {
    pub fn grid(&self) -> &'a ElevationGrid {
        self.grid
    }

    pub fn model(&self) -> &'a dyn SlopeCost {
        self.model
    }

    pub fn units(&self) -> CostUnits {
        self.model.units()
    }

    /// Friction multiplier of a cell; `None` when impassable
    fn friction_at(&self, cell: Cell) -> Option<f64> {
        match self.friction {
            None => Some(1.0),
            Some(f) => {
                let v = f.data()[(cell.row, cell.col)];
                (v.is_finite() && !f.is_nodata(v)).then_some(v)
            }
        }
    }
}

impl GridGraph for CostSurface<'_> {
    fn shape(&self) -> (usize, usize) {
        self.grid.shape()
    }

    fn directions(&self) -> &[Direction] {
        self.directions
    }

    fn is_passable(&self, cell: Cell) -> bool {
        self.grid.is_valid(cell) && self.friction_at(cell).is_some()
    }

    fn edge_cost(&self, from: Cell, dir: Direction) -> Result<Option<f64>> {
        let (rows, cols) = self.grid.shape();
        let Some(to) = from.step(dir, rows, cols) else {
            return Ok(None);
        };
        let (Some(za), Some(zb)) = (self.grid.value(from), self.grid.value(to)) else {
            return Ok(None);
        };
        let (Some(fa), Some(fb)) = (self.friction_at(from), self.friction_at(to)) else {
            return Ok(None);
        };

        let (sx, sy) = self.grid.cell_size();
        let horizontal = dir.distance(sx, sy);
        let slope = (zb - za) / horizontal;
        let per_metre = self.model.cost_per_metre(slope);
        if !(per_metre.is_finite() && per_metre >= 0.0) {
            return Err(Error::InvalidCostModel {
                model: self.model.name().to_string(),
                reason: format!("cost per metre {} at slope {:.4} from cell {}", per_metre, slope, from),
            });
        }

        Ok(Some(per_metre * horizontal * (fa + fb) / 2.0))
    }

    fn reference(&self) -> &Raster<f64> {
        self.grid.raster()
    }
}

/// Validate a model and optional friction raster and bind them to a grid.
///
/// The model must be finite and non-negative over the probe slope range,
/// and the friction raster congruent with the grid with no negative cells.
/// NaN or no-data friction marks a cell impassable.
pub fn build_cost_surface<'a>(
    grid: &'a ElevationGrid,
    model: &'a dyn SlopeCost,
    friction: Option<&'a Raster<f64>>,
    options: &CostSurfaceOptions,
) -> Result<CostSurface<'a>> {
    validate_model(model)?;

    if let Some(f) = friction {
        grid.raster().ensure_congruent(f)?;
        if let Some(((row, col), v)) = f
            .data()
            .indexed_iter()
            .find(|&(_, &v)| v.is_finite() && !f.is_nodata(v) && v < 0.0)
        {
            return Err(Error::invalid_parameter(
                "friction",
                v,
                format!("negative friction at cell ({}, {})", row, col),
            ));
        }
    }

    let directions: &'static [Direction] = if options.allow_diagonal {
        &Direction::ALL
    } else {
        &Direction::CARDINAL
    };

    debug!(
        "cost surface: model {}, {} directions, friction {}",
        model.name(),
        directions.len(),
        friction.is_some()
    );

    Ok(CostSurface {
        grid,
        model,
        friction,
        directions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::cost_model::{CostPreset, NaismithParams, UniformParams};
    use approx::assert_relative_eq;
    use archterra_core::GeoTransform;

    fn ramp() -> ElevationGrid {
        // Rises 1 m per column eastward, 10 m cells
        let values = (0..25).map(|i| (i % 5) as f64).collect();
        ElevationGrid::from_vec(values, 5, 5, GeoTransform::new(0.0, 50.0, 10.0, -10.0), None).unwrap()
    }

    #[test]
    fn edge_cost_is_directional() {
        let grid = ramp();
        let model = CostPreset::Naismith(NaismithParams::default());
        let surface = build_cost_surface(&grid, &model, None, &CostSurfaceOptions::default()).unwrap();

        let c = Cell::new(2, 2);
        let up = surface.edge_cost(c, Direction::East).unwrap().unwrap();
        let down = surface.edge_cost(c, Direction::West).unwrap().unwrap();
        // 10 m at 0.72 s/m plus 1 m climb at 6 s/m
        assert_relative_eq!(up, 13.2, epsilon = 1e-9);
        assert_relative_eq!(down, 7.2, epsilon = 1e-9);
    }

    #[test]
    fn diagonal_uses_planar_length() {
        let grid = ramp();
        let model = UniformParams::default();
        let surface = build_cost_surface(&grid, &model, None, &CostSurfaceOptions::default()).unwrap();
        let d = surface.edge_cost(Cell::new(2, 2), Direction::NorthEast).unwrap().unwrap();
        assert_relative_eq!(d, 10.0 * std::f64::consts::SQRT_2, epsilon = 1e-9);
    }

    #[test]
    fn four_connectivity() {
        let grid = ramp();
        let model = UniformParams::default();
        let options = CostSurfaceOptions { allow_diagonal: false };
        let surface = build_cost_surface(&grid, &model, None, &options).unwrap();
        assert_eq!(surface.directions().len(), 4);
    }

    #[test]
    fn off_grid_and_nodata_moves_are_absent() {
        let mut values = vec![0.0; 9];
        values[4] = f64::NAN;
        let grid =
            ElevationGrid::from_vec(values, 3, 3, GeoTransform::new(0.0, 3.0, 1.0, -1.0), None).unwrap();
        let model = UniformParams::default();
        let surface = build_cost_surface(&grid, &model, None, &CostSurfaceOptions::default()).unwrap();
        assert_eq!(surface.edge_cost(Cell::new(0, 0), Direction::North).unwrap(), None);
        assert_eq!(surface.edge_cost(Cell::new(0, 0), Direction::SouthEast).unwrap(), None);
        assert!(!surface.is_passable(Cell::new(1, 1)));
    }

    #[test]
    fn friction_scales_edges() {
        let grid = ramp();
        let model = UniformParams::default();
        let mut friction = grid.raster().like(1.0);
        friction.set(2, 3, 3.0).unwrap();
        friction.set(0, 0, f64::NAN).unwrap();
        let surface =
            build_cost_surface(&grid, &model, Some(&friction), &CostSurfaceOptions::default()).unwrap();

        let e = surface.edge_cost(Cell::new(2, 2), Direction::East).unwrap().unwrap();
        assert_relative_eq!(e, 20.0, epsilon = 1e-9);
        assert!(!surface.is_passable(Cell::new(0, 0)));
        assert_eq!(surface.edge_cost(Cell::new(0, 1), Direction::West).unwrap(), None);
    }

    #[test]
    fn rejects_bad_friction() {
        let grid = ramp();
        let model = UniformParams::default();

        let small = Raster::filled(3, 3, 1.0);
        assert!(matches!(
            build_cost_surface(&grid, &model, Some(&small), &CostSurfaceOptions::default()),
            Err(Error::SizeMismatch { .. })
        ));

        let mut negative = grid.raster().like(1.0);
        negative.set(1, 1, -0.5).unwrap();
        assert!(matches!(
            build_cost_surface(&grid, &model, Some(&negative), &CostSurfaceOptions::default()),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn rejects_invalid_model_before_work() {
        let grid = ramp();
        let model = UniformParams { cost_per_metre: f64::INFINITY };
        assert!(matches!(
            build_cost_surface(&grid, &model, None, &CostSurfaceOptions::default()),
            Err(Error::InvalidCostModel { .. })
        ));
    }
}
