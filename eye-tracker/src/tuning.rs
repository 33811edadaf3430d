//! Tracker tuning: fixed limits plus the curves that map `model_sensitivity`
//! to spawn and retirement thresholds.

use eye_math::misc::lerp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TuningError {
    #[error("invalid tuning value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> TuningError {
    TuningError::InvalidField {
        field,
        reason: reason.into(),
    }
}

/// Linear map from sensitivity in `[0, 1]` to a threshold
///
/// Sensitivities outside the unit interval are clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitivityCurve {
    pub at_zero: f64,
    pub at_one: f64,
}

impl SensitivityCurve {
    pub fn new(at_zero: f64, at_one: f64) -> Self {
        Self { at_zero, at_one }
    }

    pub fn at(&self, sensitivity: f64) -> f64 {
        lerp(self.at_zero, self.at_one, sensitivity.clamp(0.0, 1.0))
    }

    fn is_finite(&self) -> bool {
        self.at_zero.is_finite() && self.at_one.is_finite()
    }

    fn min(&self) -> f64 {
        self.at_zero.min(self.at_one)
    }
}

/// Settings of the iterative sphere solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub max_iterations: usize,
    /// Convergence threshold on the parameter step, millimetres
    pub tolerance: f64,
    /// Residual above which observations are down-weighted, millimetres
    pub huber_delta: f64,
    /// Residual at which frame quality drops to one half, millimetres
    pub fit_scale: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-6,
            huber_delta: 1.0,
            fit_scale: 0.5,
        }
    }
}

/// Everything that shapes model lifecycle besides the host's properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerTuning {
    /// Population cap
    pub max_models: usize,
    /// 2D confidence below which a frame adds no observation
    pub observation_confidence_floor: f64,
    /// Binned observations needed before a model fits its sphere
    pub min_fit_observations: usize,
    /// Accepted observations at which maturity reaches 1
    pub maturity_saturation: usize,
    /// Window of the weighted confidence average
    pub confidence_window: usize,
    /// Window of the performance average
    pub performance_window: usize,
    /// Edge of the image-space observation bins, pixels
    pub bin_size_px: f64,
    /// Consecutive steep performance drops before a model may be retired
    pub retire_patience: usize,
    pub solver: SolverSettings,
    /// Best confidence below which the spawn timer runs
    pub spawn_confidence: SensitivityCurve,
    /// Seconds of low confidence before a new model spawns
    pub spawn_delay_s: SensitivityCurve,
    /// Performance gradient below which a drop counts towards retirement
    pub retire_gradient: SensitivityCurve,
    /// Residual above which a model rejects an observation, millimetres
    pub observation_tolerance_mm: SensitivityCurve,
}

impl Default for TrackerTuning {
    fn default() -> Self {
        Self {
            max_models: 4,
            observation_confidence_floor: 0.6,
            min_fit_observations: 3,
            maturity_saturation: 60,
            confidence_window: 20,
            performance_window: 30,
            bin_size_px: 8.0,
            retire_patience: 15,
            solver: SolverSettings::default(),
            spawn_confidence: SensitivityCurve::new(0.3, 0.8),
            spawn_delay_s: SensitivityCurve::new(10.0, 2.0),
            retire_gradient: SensitivityCurve::new(-0.02, -0.002),
            observation_tolerance_mm: SensitivityCurve::new(8.0, 3.0),
        }
    }
}

impl TrackerTuning {
    /// Check every field before a tracker is built from it
    pub fn validate(&self) -> Result<(), TuningError> {
        if self.max_models == 0 {
            return Err(invalid("max_models", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.observation_confidence_floor) {
            return Err(invalid("observation_confidence_floor", "must be in [0, 1]"));
        }
        if self.min_fit_observations < 2 {
            return Err(invalid("min_fit_observations", "must be at least 2"));
        }
        for (field, value) in [
            ("maturity_saturation", self.maturity_saturation),
            ("confidence_window", self.confidence_window),
            ("performance_window", self.performance_window),
            ("solver.max_iterations", self.solver.max_iterations),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be at least 1"));
            }
        }
        for (field, value) in [
            ("bin_size_px", self.bin_size_px),
            ("solver.tolerance", self.solver.tolerance),
            ("solver.huber_delta", self.solver.huber_delta),
            ("solver.fit_scale", self.solver.fit_scale),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(field, format!("must be finite and positive, got {value}")));
            }
        }
        for (field, curve) in [
            ("spawn_confidence", &self.spawn_confidence),
            ("spawn_delay_s", &self.spawn_delay_s),
            ("retire_gradient", &self.retire_gradient),
            ("observation_tolerance_mm", &self.observation_tolerance_mm),
        ] {
            if !curve.is_finite() {
                return Err(invalid(field, "curve ends must be finite"));
            }
        }
        if self.spawn_delay_s.min() < 0.0 {
            return Err(invalid("spawn_delay_s", "must not be negative"));
        }
        if self.observation_tolerance_mm.min() <= 0.0 {
            return Err(invalid("observation_tolerance_mm", "must be positive"));
        }
        Ok(())
    }
}
