//! Eyeball sphere fitting from binned pupil observations.
//!
//! Every observation contributes a pupil centre `c_i` and normal `n_i`. A
//! sphere `(S, R)` explains it when `c_i = S + R·n_i`. Each observation has
//! two candidate normals, so the fit alternates between picking the candidate
//! nearest to the current sphere and an iteratively reweighted linear solve
//! for `(S, R)` with Huber weights scaled by observation confidence.

use eye_math::Sphere;
use nalgebra::{Matrix2, Matrix4, Vector2, Vector3, Vector4};
use thiserror::Error;

use crate::observation::Observation;
use crate::tuning::SolverSettings;

/// Fewest observations that can constrain centre and radius
pub const MIN_OBSERVATIONS: usize = 2;

/// Smallest mean angular spread of minor-axis lines accepted for initialisation
const MIN_LINE_SPREAD: f64 = 0.1;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SphereFitError {
    #[error("need at least {needed} observations, got {got}")]
    InsufficientObservations { needed: usize, got: usize },

    #[error("observation geometry does not constrain the sphere")]
    Singular,

    #[error("no convergence after {iterations} iterations")]
    NotConverged { iterations: usize },

    #[error("fitted radius {0} is not positive")]
    DegenerateRadius(f64),
}

/// Converged sphere fit
#[derive(Debug, Clone, PartialEq)]
pub struct SphereFit {
    pub sphere: Sphere,
    /// Weighted RMS distance between observed and predicted pupil centres, mm
    pub solver_fit: f64,
    pub iterations: usize,
    /// Candidate index chosen for each observation
    pub choices: Vec<usize>,
}

#[inline]
fn huber_weight(abs_r: f64, delta: f64) -> f64 {
    if abs_r <= delta {
        1.0
    } else {
        delta / abs_r
    }
}

/// Fit a sphere to `observations`, starting from `previous` when given
pub fn fit_sphere(
    observations: &[&Observation],
    previous: Option<&Sphere>,
    settings: &SolverSettings,
) -> Result<SphereFit, SphereFitError> {
    if observations.len() < MIN_OBSERVATIONS {
        return Err(SphereFitError::InsufficientObservations {
            needed: MIN_OBSERVATIONS,
            got: observations.len(),
        });
    }

    let mut sphere = match previous.filter(|s| !s.is_null()) {
        Some(sphere) => *sphere,
        None => {
            let choices = initial_choices(observations)?;
            let weights: Vec<f64> = observations.iter().map(|o| o.confidence).collect();
            solve_linear(observations, &choices, &weights)?
        }
    };

    let delta = settings.huber_delta.max(1e-9);
    for iteration in 1..=settings.max_iterations {
        let (choices, residuals): (Vec<usize>, Vec<f64>) = observations
            .iter()
            .map(|o| o.nearest_candidate(&sphere))
            .unzip();
        let weights: Vec<f64> = observations
            .iter()
            .zip(&residuals)
            .map(|(o, r)| o.confidence * huber_weight(*r, delta))
            .collect();

        let next = solve_linear(observations, &choices, &weights)?;
        let step = (next.center - sphere.center)
            .push(next.radius - sphere.radius)
            .norm();
        sphere = next;

        if step < settings.tolerance {
            let solver_fit = weighted_rms(observations, &choices, &weights, &sphere);
            return Ok(SphereFit {
                sphere,
                solver_fit,
                iterations: iteration,
                choices,
            });
        }
    }

    Err(SphereFitError::NotConverged {
        iterations: settings.max_iterations,
    })
}

/// Candidate choice without a prior sphere.
///
/// Pupil centres lie on the minor-axis line through the projected eyeball
/// centre, displaced from it along the image direction of their normal.
fn initial_choices(observations: &[&Observation]) -> Result<Vec<usize>, SphereFitError> {
    let mut a = Matrix2::<f64>::zeros();
    let mut b = Vector2::<f64>::zeros();
    for o in observations {
        let dir = o.ellipse.minor_axis();
        let projector = Matrix2::identity() - dir * dir.transpose();
        a += projector;
        b += projector * o.ellipse.center;
    }
    // Nearly parallel lines pin the intersection down only across their direction
    let spread = a.symmetric_eigenvalues().min() / observations.len() as f64;
    if spread < MIN_LINE_SPREAD {
        return Err(SphereFitError::Singular);
    }
    let eye_center = a.lu().solve(&b).ok_or(SphereFitError::Singular)?;
    if !eye_center.iter().all(|v| v.is_finite()) {
        return Err(SphereFitError::Singular);
    }

    Ok(observations
        .iter()
        .map(|o| {
            let outward = o.ellipse.center - eye_center;
            let n0 = o.candidates[0].normal.xy();
            if n0.dot(&outward) >= 0.0 {
                0
            } else {
                1
            }
        })
        .collect())
}

/// Weighted least squares for `c_i = S + R·n_i` with fixed candidate choices
fn solve_linear(
    observations: &[&Observation],
    choices: &[usize],
    weights: &[f64],
) -> Result<Sphere, SphereFitError> {
    let mut lhs = Matrix4::<f64>::zeros();
    let mut rhs = Vector4::<f64>::zeros();
    let mut first_normal: Option<Vector3<f64>> = None;
    let mut spread = 0.0f64;

    for ((o, &choice), &w) in observations.iter().zip(choices).zip(weights) {
        if !(w.is_finite() && w > 0.0) {
            continue;
        }
        let circle = &o.candidates[choice];
        let n = circle.normal;
        let c = circle.center;

        let reference = *first_normal.get_or_insert(n);
        spread = spread.max((n - reference).norm());

        let mut row = Matrix4::<f64>::identity();
        row.fixed_view_mut::<3, 1>(0, 3).copy_from(&n);
        row.fixed_view_mut::<1, 3>(3, 0).copy_from(&n.transpose());
        row[(3, 3)] = n.norm_squared();
        lhs += row * w;
        rhs += Vector4::new(c.x, c.y, c.z, n.dot(&c)) * w;
    }

    // Identical normals leave centre and radius confounded
    if spread < 1e-9 {
        return Err(SphereFitError::Singular);
    }

    let x = lhs.lu().solve(&rhs).ok_or(SphereFitError::Singular)?;
    if !x.iter().all(|v| v.is_finite()) {
        return Err(SphereFitError::Singular);
    }
    let radius = x[3];
    if radius <= 0.0 {
        return Err(SphereFitError::DegenerateRadius(radius));
    }
    Ok(Sphere::new(Vector3::new(x[0], x[1], x[2]), radius))
}

fn weighted_rms(
    observations: &[&Observation],
    choices: &[usize],
    weights: &[f64],
    sphere: &Sphere,
) -> f64 {
    let (sum, total) = observations.iter().zip(choices).zip(weights).fold(
        (0.0, 0.0),
        |(sum, total), ((o, &choice), &w)| {
            let r = o.candidate_residual(choice, sphere);
            (sum + w * r * r, total + w)
        },
    );
    if total > 0.0 {
        (sum / total).sqrt()
    } else {
        0.0
    }
}
