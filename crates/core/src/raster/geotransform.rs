//! Affine georeferencing for grids

use serde::{Deserialize, Serialize};

/// Affine transformation between cell indices and map coordinates.
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// Elevation grids are north-up: rotations are zero and `pixel_height` is
/// negative, so row 0 is the northern edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Cell size in X
    pub pixel_width: f64,
    /// Cell size in Y (negative for north-up grids)
    pub pixel_height: f64,
    #[serde(default)]
    pub row_rotation: f64,
    #[serde(default)]
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a north-up transform with no rotation
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Map coordinates of the centre of cell (col, row)
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.fractional_to_geo(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Map coordinates of the upper-left corner of cell (col, row)
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        self.fractional_to_geo(col as f64, row as f64)
    }

    fn fractional_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Fractional (col, row) for a map coordinate; `floor` gives the cell index.
    ///
    /// Returns NaNs for a degenerate transform.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;

        if det.abs() < 1e-12 {
            return (f64::NAN, f64::NAN);
        }

        let dx = x - self.origin_x;
        let dy = y - self.origin_y;

        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;

        (col, row)
    }

    /// Cell width in map units (always positive)
    pub fn cell_width(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Cell height in map units (always positive)
    pub fn cell_height(&self) -> f64 {
        self.pixel_height.abs()
    }

    /// Mean cell size, for callers that assume square cells
    pub fn cell_size(&self) -> f64 {
        0.5 * (self.cell_width() + self.cell_height())
    }

    pub fn cell_area(&self) -> f64 {
        self.cell_width() * self.cell_height()
    }

    /// Check if this is a north-up transform (no rotation)
    pub fn is_north_up(&self) -> bool {
        self.row_rotation.abs() < 1e-12 && self.col_rotation.abs() < 1e-12
    }

    /// Bounding box (min_x, min_y, max_x, max_y) of a grid with these dimensions
    pub fn bounds(&self, cols: usize, rows: usize) -> (f64, f64, f64, f64) {
        let corners = [
            self.pixel_to_geo_corner(0, 0),
            self.pixel_to_geo_corner(cols, 0),
            self.pixel_to_geo_corner(0, rows),
            self.pixel_to_geo_corner(cols, rows),
        ];

        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pixel_to_geo_roundtrip() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);

        let (x, y) = gt.pixel_to_geo(5, 10);
        assert_relative_eq!(x, 155.0, epsilon = 1e-10);
        assert_relative_eq!(y, 95.0, epsilon = 1e-10);

        let (col, row) = gt.geo_to_pixel(x, y);
        assert_relative_eq!(col, 5.5, epsilon = 1e-10);
        assert_relative_eq!(row, 10.5, epsilon = 1e-10);
    }

    #[test]
    fn test_bounds() {
        let gt = GeoTransform::new(0.0, 100.0, 2.0, -1.0);
        let (min_x, min_y, max_x, max_y) = gt.bounds(50, 100);

        assert_relative_eq!(min_x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(min_y, 0.0, epsilon = 1e-10);
        assert_relative_eq!(max_x, 100.0, epsilon = 1e-10);
        assert_relative_eq!(max_y, 100.0, epsilon = 1e-10);
    }

    #[test]
    fn test_cell_dimensions() {
        let gt = GeoTransform::new(0.0, 0.0, 30.0, -25.0);
        assert_relative_eq!(gt.cell_width(), 30.0);
        assert_relative_eq!(gt.cell_height(), 25.0);
        assert_relative_eq!(gt.cell_area(), 750.0);
        assert!(gt.is_north_up());
    }
}
