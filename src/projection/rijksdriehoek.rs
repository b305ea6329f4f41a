//! Rijksdriehoek (EPSG:28992) to WGS84 conversion.
//!
//! Approximation series by Schreutelkamp and Strang van Hees, accurate to
//! well below a meter over the Netherlands.

/// RD x of the Amersfoort reference point
pub const X0: f64 = 155_000.0;
/// RD y of the Amersfoort reference point
pub const Y0: f64 = 463_000.0;
/// Latitude of the Amersfoort reference point
pub const PHI0: f64 = 52.155_174_40;
/// Longitude of the Amersfoort reference point
pub const LAM0: f64 = 5.387_206_21;

// (p, q, coefficient) for dX^p * dY^q, result in arc seconds
const LATITUDE_TERMS: [(i32, i32, f64); 11] = [
    (0, 1, 3235.65389),
    (2, 0, -32.58297),
    (0, 2, -0.24750),
    (2, 1, -0.84978),
    (0, 3, -0.06550),
    (2, 2, -0.01709),
    (1, 0, -0.00738),
    (4, 0, 0.00530),
    (2, 3, -0.00039),
    (4, 1, 0.00033),
    (1, 1, -0.00012),
];

const LONGITUDE_TERMS: [(i32, i32, f64); 12] = [
    (1, 0, 5260.52916),
    (1, 1, 105.94684),
    (1, 2, 2.45656),
    (3, 0, -0.81885),
    (1, 3, 0.05594),
    (3, 1, -0.05607),
    (0, 1, 0.01199),
    (3, 2, -0.00256),
    (1, 4, 0.00128),
    (0, 2, 0.00022),
    (2, 0, -0.00022),
    (5, 0, 0.00026),
];

/// Convert RD coordinates (meters) to `(latitude, longitude)` in degrees.
pub fn rd_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let dx = (x - X0) * 1e-5;
    let dy = (y - Y0) * 1e-5;

    let series = |terms: &[(i32, i32, f64)]| -> f64 {
        terms
            .iter()
            .map(|&(p, q, k)| k * dx.powi(p) * dy.powi(q))
            .sum()
    };

    let latitude = PHI0 + series(&LATITUDE_TERMS) / 3600.0;
    let longitude = LAM0 + series(&LONGITUDE_TERMS) / 3600.0;
    (latitude, longitude)
}
