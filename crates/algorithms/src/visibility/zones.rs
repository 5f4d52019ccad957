//! Higuchi (1975) landscape distance zones
//!
//! Near view (< 500 m), middle view (< 2500 m) and far view. Zones classify
//! visible cells by distance from the observer and weight cumulative scores.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::viewshed::{Viewpoint, NODATA_CODE, VISIBLE};
use archterra_core::raster::{Cell, ElevationGrid, Raster};
use archterra_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DistanceZone {
    Near = 1,
    Middle = 2,
    Far = 3,
}

/// Zone boundaries in map units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HiguchiZones {
    pub near_limit: f64,
    pub middle_limit: f64,
}

impl Default for HiguchiZones {
    fn default() -> Self {
        Self {
            near_limit: 500.0,
            middle_limit: 2500.0,
        }
    }
}

impl HiguchiZones {
    pub fn classify(&self, distance: f64) -> DistanceZone {
        if distance < self.near_limit {
            DistanceZone::Near
        } else if distance < self.middle_limit {
            DistanceZone::Middle
        } else {
            DistanceZone::Far
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.near_limit > 0.0 && self.middle_limit > self.near_limit) {
            return Err(Error::invalid_parameter(
                "zones",
                format!("{}/{}", self.near_limit, self.middle_limit),
                "need 0 < near_limit < middle_limit",
            ));
        }
        Ok(())
    }
}

/// Per-zone multipliers for cumulative visibility
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneWeights {
    pub zones: HiguchiZones,
    pub near: f64,
    pub middle: f64,
    pub far: f64,
}

impl Default for ZoneWeights {
    fn default() -> Self {
        Self {
            zones: HiguchiZones::default(),
            near: 1.0,
            middle: 0.5,
            far: 0.25,
        }
    }
}

impl ZoneWeights {
    pub fn weight_at(&self, distance: f64) -> f64 {
        match self.zones.classify(distance) {
            DistanceZone::Near => self.near,
            DistanceZone::Middle => self.middle,
            DistanceZone::Far => self.far,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.zones.validate()?;
        for (name, w) in [("near", self.near), ("middle", self.middle), ("far", self.far)] {
            if !(w.is_finite() && w >= 0.0) {
                return Err(Error::invalid_parameter("zone_weight", format!("{}={}", name, w), "must be >= 0"));
            }
        }
        Ok(())
    }
}

/// Zone code of every visible cell of a binary viewshed.
///
/// 0 = not visible, 1..=3 = [`DistanceZone`] code, 255 = no data.
pub fn classify_zones(
    grid: &ElevationGrid,
    viewpoint: &Viewpoint,
    visibility: &Raster<u8>,
    zones: &HiguchiZones,
) -> Result<Raster<u8>> {
    zones.validate()?;
    grid.raster().ensure_congruent(visibility)?;

    let (rows, cols) = grid.shape();
    let codes = Array2::from_shape_fn((rows, cols), |(row, col)| {
        match visibility.data()[(row, col)] {
            VISIBLE => {
                let (x, y) = grid.cell_center(Cell::new(row, col));
                let d = (x - viewpoint.x).hypot(y - viewpoint.y);
                zones.classify(d) as u8
            }
            NODATA_CODE => NODATA_CODE,
            _ => 0,
        }
    });

    let mut output = grid.raster().with_same_meta::<u8>(rows, cols);
    output.set_nodata(Some(NODATA_CODE));
    *output.data_mut() = codes;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use archterra_core::GeoTransform;

    #[test]
    fn classify_boundaries() {
        let z = HiguchiZones::default();
        assert_eq!(z.classify(0.0), DistanceZone::Near);
        assert_eq!(z.classify(499.9), DistanceZone::Near);
        assert_eq!(z.classify(500.0), DistanceZone::Middle);
        assert_eq!(z.classify(2499.0), DistanceZone::Middle);
        assert_eq!(z.classify(2500.0), DistanceZone::Far);
    }

    #[test]
    fn weights_follow_zones() {
        let w = ZoneWeights::default();
        assert_eq!(w.weight_at(100.0), 1.0);
        assert_eq!(w.weight_at(1000.0), 0.5);
        assert_eq!(w.weight_at(5000.0), 0.25);
        assert!(ZoneWeights { far: -1.0, ..Default::default() }.validate().is_err());
        assert!(HiguchiZones { near_limit: 600.0, middle_limit: 500.0 }.validate().is_err());
    }

    #[test]
    fn zone_raster_codes() {
        // 1 x 4 strip of 400 m cells: centres at 200, 600, 1000, 1400 from x = 0
        let grid = ElevationGrid::from_vec(
            vec![0.0; 4],
            1,
            4,
            GeoTransform::new(0.0, 400.0, 400.0, -400.0),
            None,
        )
        .unwrap();
        let vp = Viewpoint::new(0.0, 200.0);
        let mut vis = grid.raster().with_same_meta::<u8>(1, 4);
        vis.set(0, 0, VISIBLE).unwrap();
        vis.set(0, 1, VISIBLE).unwrap();
        vis.set(0, 3, NODATA_CODE).unwrap();

        let zones = classify_zones(&grid, &vp, &vis, &HiguchiZones::default()).unwrap();
        assert_eq!(zones.get(0, 0).unwrap(), DistanceZone::Near as u8);
        assert_eq!(zones.get(0, 1).unwrap(), DistanceZone::Middle as u8);
        assert_eq!(zones.get(0, 2).unwrap(), 0);
        assert_eq!(zones.get(0, 3).unwrap(), NODATA_CODE);
    }
}
