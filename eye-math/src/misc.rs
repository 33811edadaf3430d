//! Spherical coordinate and interpolation helpers.
//!
//! Spherical angles follow the eye-camera convention where `y` is the polar
//! axis: `theta` is measured from +y and `psi` is the azimuth in the x/z plane.

use nalgebra::Vector3;

/// Linear interpolation between `a` and `b`
pub fn lerp(a: f64, b: f64, alpha: f64) -> f64 {
    a * (1.0 - alpha) + b * alpha
}

/// Spherical to cartesian: `r * (sinθ cosψ, cosθ, sinθ sinψ)`
pub fn sph2cart(r: f64, theta: f64, psi: f64) -> Vector3<f64> {
    r * Vector3::new(theta.sin() * psi.cos(), theta.cos(), theta.sin() * psi.sin())
}

/// Cartesian to spherical angles `(theta, psi)`.
///
/// Returns `None` for the zero vector.
pub fn cart2sph(v: &Vector3<f64>) -> Option<(f64, f64)> {
    let r = v.norm();
    if r == 0.0 {
        return None;
    }
    Some(((v.y / r).clamp(-1.0, 1.0).acos(), v.z.atan2(v.x)))
}

/// Great-circle angle between two directions given as spherical angles.
///
/// `theta` is a polar angle measured from +y, not a latitude, so the usual
/// `cos φ1·cos φ2` term of the latitude form becomes `sin θ1·sin θ2`.
pub fn haversine(theta1: f64, psi1: f64, theta2: f64, psi2: f64) -> f64 {
    if theta1 == theta2 && psi1 == psi2 {
        return 0.0;
    }
    let d_theta = ((theta2 - theta1) / 2.0).sin();
    let d_psi = ((psi2 - psi1) / 2.0).sin();
    let h = d_theta * d_theta + theta1.sin() * theta2.sin() * d_psi * d_psi;
    2.0 * h.sqrt().clamp(0.0, 1.0).asin()
}
