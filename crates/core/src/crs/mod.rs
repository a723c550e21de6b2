//! Coordinate Reference System handling
//!
//! Sentinel-2 tiles are delivered in WGS84 / UTM, so a CRS here is an EPSG
//! code with helpers to recognise the geographic and UTM families.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// EPSG code of WGS84 geographic coordinates (longitude, latitude).
pub const EPSG_WGS84: u32 = 4326;

/// Coordinate Reference System identified by its EPSG code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CRS {
    epsg: u32,
}

/// UTM zone parameters decoded from an EPSG code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    /// Zone number, 1..=60
    pub zone: u32,
    /// Northern hemisphere (EPSG 326xx) or southern (327xx)
    pub north: bool,
}

impl UtmZone {
    /// Longitude of the zone's central meridian, in degrees
    pub fn central_meridian(&self) -> f64 {
        (self.zone as f64 - 1.0) * 6.0 - 180.0 + 3.0
    }

    /// Zone containing a WGS84 point (no Norway/Svalbard exceptions)
    pub fn for_point(lon: f64, lat: f64) -> Self {
        let zone = (((lon + 180.0) / 6.0).floor() as i64).clamp(0, 59) as u32 + 1;
        Self { zone, north: lat >= 0.0 }
    }

    /// EPSG code for this zone
    pub fn epsg(&self) -> u32 {
        if self.north {
            32600 + self.zone
        } else {
            32700 + self.zone
        }
    }
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self { epsg: code }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(EPSG_WGS84)
    }

    /// EPSG code
    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// Whether this CRS uses longitude/latitude degrees
    pub fn is_geographic(&self) -> bool {
        self.epsg == EPSG_WGS84
    }

    /// Decode UTM zone information.
    ///
    /// - EPSG 326xx → zone xx, North hemisphere
    /// - EPSG 327xx → zone xx, South hemisphere
    pub fn utm_zone(&self) -> Option<UtmZone> {
        match self.epsg {
            32601..=32660 => Some(UtmZone {
                zone: self.epsg - 32600,
                north: true,
            }),
            32701..=32760 => Some(UtmZone {
                zone: self.epsg - 32700,
                north: false,
            }),
            _ => None,
        }
    }

    /// String identifier, e.g. `EPSG:32630`
    pub fn identifier(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl FromStr for CRS {
    type Err = Error;

    /// Accepts `EPSG:32630`, `epsg:32630` or a bare `32630`.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let code = trimmed
            .strip_prefix("EPSG:")
            .or_else(|| trimmed.strip_prefix("epsg:"))
            .unwrap_or(trimmed);
        code.parse::<u32>()
            .map(CRS::from_epsg)
            .map_err(|_| Error::InvalidParameter {
                name: "crs",
                value: s.to_string(),
                reason: "expected an EPSG code".into(),
            })
    }
}
