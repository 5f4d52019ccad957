//! Coordinate reference system metadata
//!
//! Grids carry their CRS through to every derived product. No reprojection
//! happens here; the engine only requires that distances are in map units.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate reference system, identified by EPSG code and/or WKT.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CRS {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    epsg: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    wkt: Option<String>,
}

impl CRS {
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            wkt: None,
        }
    }

    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            epsg: None,
            wkt: Some(wkt.into()),
        }
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Check if two CRS are equivalent, comparing EPSG codes first
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        match (self.epsg, other.epsg, &self.wkt, &other.wkt) {
            (Some(a), Some(b), _, _) => a == b,
            (_, _, Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Short identifier, e.g. `EPSG:32633`
    pub fn identifier(&self) -> String {
        match (self.epsg, &self.wkt) {
            (Some(code), _) => format!("EPSG:{}", code),
            (None, Some(wkt)) => format!("WKT:{}", wkt.chars().take(50).collect::<String>()),
            (None, None) => "Unknown".to_string(),
        }
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}
