//! GCJ-02 ⇄ BD-09 datum correction.
//!
//! Baidu publishes no closed-form definition of BD-09; this is the widely
//! used empirical approximation. Every constant below feeds directly into
//! tile selection, so they must not be "tidied up".

use std::f64::consts::PI;

use sat_mosaic_geo_models::GeoPoint;

/// Angular frequency of the trigonometric perturbation.
const X_PI: f64 = PI * 3000.0 / 180.0;

/// Radial perturbation amplitude.
const RADIUS_AMPLITUDE: f64 = 0.000_02;

/// Angular perturbation amplitude.
const THETA_AMPLITUDE: f64 = 0.000_003;

/// Constant longitude shift.
const LON_OFFSET: f64 = 0.0065;

/// Constant latitude shift.
const LAT_OFFSET: f64 = 0.006;

/// Converts a GCJ-02 coordinate into Baidu's BD-09 datum.
#[must_use]
#[allow(clippy::suboptimal_flops)]
pub fn gcj02_to_bd09(point: GeoPoint) -> GeoPoint {
    let x = point.lon;
    let y = point.lat;
    let z = (x * x + y * y).sqrt() + RADIUS_AMPLITUDE * (y * X_PI).sin();
    let theta = y.atan2(x) + THETA_AMPLITUDE * (x * X_PI).cos();
    GeoPoint::new(z * theta.cos() + LON_OFFSET, z * theta.sin() + LAT_OFFSET)
}

/// Approximate inverse of [`gcj02_to_bd09`] (error well below 1e-5°).
#[must_use]
#[allow(clippy::suboptimal_flops)]
pub fn bd09_to_gcj02(point: GeoPoint) -> GeoPoint {
    let x = point.lon - LON_OFFSET;
    let y = point.lat - LAT_OFFSET;
    let z = (x * x + y * y).sqrt() - RADIUS_AMPLITUDE * (y * X_PI).sin();
    let theta = y.atan2(x) - THETA_AMPLITUDE * (x * X_PI).cos();
    GeoPoint::new(z * theta.cos(), z * theta.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifts_beijing_by_known_offset() {
        // Tiananmen in GCJ-02 lands roughly 0.0065° east and 0.0064° north.
        let gcj = GeoPoint::new(116.397_39, 39.908_72);
        let bd = gcj02_to_bd09(gcj);
        assert!((bd.lon - gcj.lon - 0.006_4).abs() < 0.001, "lon {}", bd.lon);
        assert!((bd.lat - gcj.lat - 0.006_4).abs() < 0.001, "lat {}", bd.lat);
    }

    #[test]
    fn is_deterministic() {
        let gcj = GeoPoint::new(121.473_7, 31.230_4);
        let a = gcj02_to_bd09(gcj);
        let b = gcj02_to_bd09(gcj);
        assert_eq!(a.lon.to_bits(), b.lon.to_bits());
        assert_eq!(a.lat.to_bits(), b.lat.to_bits());
    }

    #[test]
    fn inverse_recovers_input() {
        let points = [
            GeoPoint::new(116.397_39, 39.908_72),
            GeoPoint::new(121.473_7, 31.230_4),
            GeoPoint::new(113.264_4, 23.129_1),
            GeoPoint::new(114.057_9, 22.543_1),
        ];
        for gcj in points {
            let back = bd09_to_gcj02(gcj02_to_bd09(gcj));
            assert!((back.lon - gcj.lon).abs() < 1e-5, "{gcj:?} -> {back:?}");
            assert!((back.lat - gcj.lat).abs() < 1e-5, "{gcj:?} -> {back:?}");
        }
    }
}
