//! Pure-Rust WGS84 ↔ UTM reprojection (Snyder 1987, USGS formulas).
//!
//! Covers EPSG 4326 plus 326xx (UTM North) and 327xx (UTM South), which is
//! every CRS Sentinel-2 L2A tiles are published in. No libproj.

use s2cluster_core::crs::{UtmZone, CRS};

// ── WGS84 ellipsoid constants ────────────────────────────────────────────

const A: f64 = 6_378_137.0; // semi-major axis (m)
const F: f64 = 1.0 / 298.257_223_563; // flattening
const E2: f64 = 2.0 * F - F * F; // eccentricity squared
const E_PRIME2: f64 = E2 / (1.0 - E2); // second eccentricity squared
const K0: f64 = 0.9996; // UTM scale factor
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

// ── Public API ───────────────────────────────────────────────────────────

/// Whether points can be moved between `crs` and WGS84.
pub fn is_supported(crs: CRS) -> bool {
    crs.is_geographic() || crs.utm_zone().is_some()
}

/// Transform a point between two supported CRSs.
///
/// Geographic coordinates are `(longitude, latitude)` in degrees; UTM
/// coordinates are `(easting, northing)` in metres. Returns `None` when
/// either CRS is unsupported.
pub fn transform_point(from: CRS, to: CRS, x: f64, y: f64) -> Option<(f64, f64)> {
    if from == to {
        return is_supported(from).then_some((x, y));
    }

    let (lon, lat) = if from.is_geographic() {
        (x, y)
    } else {
        utm_to_wgs84(x, y, from.utm_zone()?)
    };

    if to.is_geographic() {
        Some((lon, lat))
    } else {
        Some(wgs84_to_utm(lon, lat, to.utm_zone()?))
    }
}

// ── Core projection (Snyder 1987, USGS Prof. Paper 1395, pp. 61-64) ─────

/// WGS84 (longitude, latitude) degrees → UTM (easting, northing) metres.
pub fn wgs84_to_utm(lon_deg: f64, lat_deg: f64, zone: UtmZone) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let lon0 = zone.central_meridian().to_radians();

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a = cos_lat * (lon - lon0);
    let m = meridional_arc(lat);

    let a2 = a * a;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    // Snyder eq. 8-9
    let easting = K0
        * n
        * (a + (1.0 - t + c) * a2 * a / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a / 120.0)
        + FALSE_EASTING;

    // Snyder eq. 8-10
    let northing = K0
        * (m + n
            * tan_lat
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

    let northing = if zone.north {
        northing
    } else {
        northing + FALSE_NORTHING_SOUTH
    };

    (easting, northing)
}

/// UTM (easting, northing) metres → WGS84 (longitude, latitude) degrees.
pub fn utm_to_wgs84(easting: f64, northing: f64, zone: UtmZone) -> (f64, f64) {
    let x = easting - FALSE_EASTING;
    let y = if zone.north {
        northing
    } else {
        northing - FALSE_NORTHING_SOUTH
    };

    let e4 = E2 * E2;
    let e6 = e4 * E2;

    // Footpoint latitude (Snyder eqs. 7-19, 3-24, 3-26)
    let m = y / K0;
    let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
    let sqrt_1_e2 = (1.0 - E2).sqrt();
    let e1 = (1.0 - sqrt_1_e2) / (1.0 + sqrt_1_e2);
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_3 * e1;

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();

    let c1 = E_PRIME2 * cos_phi1 * cos_phi1;
    let t1 = tan_phi1 * tan_phi1;
    let w = 1.0 - E2 * sin_phi1 * sin_phi1;
    let n1 = A / w.sqrt();
    let r1 = A * (1.0 - E2) / w.powf(1.5);
    let d = x / (n1 * K0);

    let d2 = d * d;
    let d3 = d2 * d;
    let d4 = d2 * d2;
    let d5 = d4 * d;
    let d6 = d4 * d2;

    // Snyder eqs. 8-17, 8-18
    let lat = phi1
        - (n1 * tan_phi1 / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * E_PRIME2
                    - 3.0 * c1 * c1)
                    * d6
                    / 720.0);

    let lon = zone.central_meridian().to_radians()
        + (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1)
                * d5
                / 120.0)
            / cos_phi1;

    (lon.to_degrees(), lat.to_degrees())
}

/// Meridional arc from equator to latitude `lat` (radians).
/// Snyder eq. 3-21.
fn meridional_arc(lat: f64) -> f64 {
    let e4 = E2 * E2;
    let e6 = e4 * E2;

    A * ((1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * E2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const ZONE_30N: UtmZone = UtmZone { zone: 30, north: true };
    const ZONE_21S: UtmZone = UtmZone { zone: 21, north: false };

    // Reference values from pyproj (PROJ 9.x):
    //   Transformer.from_crs(4326, 32630, always_xy=True).transform(-3.7037, 40.4168)
    #[test]
    fn madrid_wgs84_to_utm30n() {
        let (e, n) = wgs84_to_utm(-3.7037, 40.4168, ZONE_30N);
        assert_abs_diff_eq!(e, 440_298.94, epsilon = 1.0);
        assert_abs_diff_eq!(n, 4_474_257.31, epsilon = 1.0);
    }

    #[test]
    fn madrid_utm30n_to_wgs84() {
        let (lon, lat) = utm_to_wgs84(440_298.94, 4_474_257.31, ZONE_30N);
        assert_abs_diff_eq!(lon, -3.7037, epsilon = 1e-5);
        assert_abs_diff_eq!(lat, 40.4168, epsilon = 1e-5);
    }

    #[test]
    fn buenos_aires_wgs84_to_utm21s() {
        let (e, n) = wgs84_to_utm(-58.3816, -34.6037, ZONE_21S);
        assert_abs_diff_eq!(e, 373_317.50, epsilon = 1.0);
        assert_abs_diff_eq!(n, 6_170_036.17, epsilon = 1.0);
    }

    #[test]
    fn equator_central_meridian() {
        let (e, n) = wgs84_to_utm(-3.0, 0.0, ZONE_30N);
        assert_abs_diff_eq!(e, 500_000.0, epsilon = 0.01);
        assert_abs_diff_eq!(n, 0.0, epsilon = 0.01);
        let (lon, lat) = utm_to_wgs84(500_000.0, 0.0, ZONE_30N);
        assert_abs_diff_eq!(lon, -3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(lat, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn round_trip_across_zone() {
        // Victoria, BC in zone 10N, plus points near the zone edges
        let zone = UtmZone { zone: 10, north: true };
        for &(lon, lat) in &[(-123.37294, 48.46334), (-125.9, 60.0), (-120.1, 30.0)] {
            let (e, n) = wgs84_to_utm(lon, lat, zone);
            let (lon2, lat2) = utm_to_wgs84(e, n, zone);
            assert_abs_diff_eq!(lon2, lon, epsilon = 1e-6);
            assert_abs_diff_eq!(lat2, lat, epsilon = 1e-6);
        }
    }

    #[test]
    fn transform_point_dispatch() {
        let wgs84 = CRS::wgs84();
        let utm = CRS::from_epsg(32630);

        let (e, n) = transform_point(wgs84, utm, -3.7037, 40.4168).unwrap();
        let (lon, lat) = transform_point(utm, wgs84, e, n).unwrap();
        assert_abs_diff_eq!(lon, -3.7037, epsilon = 1e-6);
        assert_abs_diff_eq!(lat, 40.4168, epsilon = 1e-6);

        assert_eq!(transform_point(utm, utm, 1.0, 2.0), Some((1.0, 2.0)));
        assert!(transform_point(wgs84, CRS::from_epsg(3857), 0.0, 0.0).is_none());
        assert!(transform_point(CRS::from_epsg(3857), wgs84, 0.0, 0.0).is_none());
    }
}
