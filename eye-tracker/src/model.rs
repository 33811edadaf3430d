//! A single eyeball hypothesis and the statistics used to rank it.

use std::collections::BTreeMap;

use eye_math::{Circle3D, MovingAverageError, SimpleMovingAverage, Sphere, WeightedMovingAverage};
use nalgebra::Vector3;
use pupil_shared::ModelDebugProperties;

use crate::observation::Observation;
use crate::sphere_fit::{fit_sphere, SphereFitError};
use crate::tuning::TrackerTuning;

/// What a model did with one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationOutcome {
    Accepted,
    /// Residual against the model's sphere exceeded the tolerance
    Rejected,
}

/// Ranking key: confidence, then maturity, then the older id
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelRank {
    pub confidence: f64,
    pub maturity: f64,
    pub id: u64,
}

impl ModelRank {
    /// Whether `self` should be selected over `other`
    pub fn beats(&self, other: &ModelRank) -> bool {
        self.confidence
            .total_cmp(&other.confidence)
            .then(self.maturity.total_cmp(&other.maturity))
            .then(other.id.cmp(&self.id))
            .is_gt()
    }
}

/// Eyeball hypothesis with its own observation history and smoothing filters
#[derive(Debug, Clone)]
pub struct EyeModel {
    id: u64,
    birth_timestamp: f64,
    sphere: Sphere,
    initial_sphere: Sphere,
    bins: BTreeMap<(i64, i64), Observation>,
    accepted: usize,
    maturity: f64,
    solver_fit: f64,
    confidence_filter: WeightedMovingAverage<f64>,
    performance_filter: SimpleMovingAverage<f64>,
    confidence: f64,
    performance: Option<f64>,
    performance_gradient: f64,
    negative_streak: usize,
    last_circle: Circle3D,
}

impl EyeModel {
    pub fn new(
        id: u64,
        birth_timestamp: f64,
        tuning: &TrackerTuning,
    ) -> Result<Self, MovingAverageError> {
        Ok(Self {
            id,
            birth_timestamp,
            sphere: Sphere::null(),
            initial_sphere: Sphere::null(),
            bins: BTreeMap::new(),
            accepted: 0,
            maturity: 0.0,
            solver_fit: 0.0,
            confidence_filter: WeightedMovingAverage::new(tuning.confidence_window)?,
            performance_filter: SimpleMovingAverage::new(tuning.performance_window)?,
            confidence: 0.0,
            performance: None,
            performance_gradient: 0.0,
            negative_streak: 0,
            last_circle: Circle3D::null(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn birth_timestamp(&self) -> f64 {
        self.birth_timestamp
    }

    pub fn sphere(&self) -> &Sphere {
        &self.sphere
    }

    pub fn initial_sphere(&self) -> &Sphere {
        &self.initial_sphere
    }

    pub fn maturity(&self) -> f64 {
        self.maturity
    }

    pub fn solver_fit(&self) -> f64 {
        self.solver_fit
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn performance(&self) -> f64 {
        self.performance.unwrap_or(0.0)
    }

    pub fn performance_gradient(&self) -> f64 {
        self.performance_gradient
    }

    /// Consecutive updates whose gradient fell below the retirement bound
    pub fn negative_streak(&self) -> usize {
        self.negative_streak
    }

    pub fn observation_count(&self) -> usize {
        self.bins.len()
    }

    /// Candidate circle picked for the most recent accepted observation
    pub fn last_circle(&self) -> &Circle3D {
        &self.last_circle
    }

    pub fn rank(&self) -> ModelRank {
        ModelRank {
            confidence: self.confidence,
            maturity: self.maturity,
            id: self.id,
        }
    }

    /// Candidate of `observation` that agrees best with this model
    pub fn predicted_circle(&self, observation: &Observation) -> Circle3D {
        if self.sphere.is_null() {
            return observation.candidates[0];
        }
        let (index, _) = observation.nearest_candidate(&self.sphere);
        observation.candidates[index]
    }

    /// Fold one observation into the model.
    ///
    /// Runs the acceptance test, refits the sphere and advances the
    /// confidence and performance filters. A failed fit keeps the previous
    /// sphere and `solver_fit` and counts as a zero-quality frame.
    pub fn observe(
        &mut self,
        observation: &Observation,
        tolerance_mm: f64,
        retire_gradient: f64,
        tuning: &TrackerTuning,
    ) -> ObservationOutcome {
        let outcome = if self.sphere.is_null() {
            ObservationOutcome::Accepted
        } else {
            let (_, residual) = observation.nearest_candidate(&self.sphere);
            if residual > tolerance_mm {
                log::debug!(
                    "Model {} rejected observation at t={:.3}: residual {residual:.2}mm > {tolerance_mm:.2}mm",
                    self.id,
                    observation.timestamp
                );
                ObservationOutcome::Rejected
            } else {
                ObservationOutcome::Accepted
            }
        };

        let mut fitted = false;
        if outcome == ObservationOutcome::Accepted {
            self.bins
                .insert(observation.bin(tuning.bin_size_px), observation.clone());
            self.accepted += 1;
            self.maturity = (self.accepted as f64 / tuning.maturity_saturation as f64).min(1.0);

            if self.bins.len() >= tuning.min_fit_observations {
                fitted = self.refit(tuning);
            }
            self.last_circle = self.predicted_circle(observation);
        }

        let quality = if fitted {
            1.0 / (1.0 + (self.solver_fit / tuning.solver.fit_scale).powi(2))
        } else {
            0.0
        };
        self.confidence_filter
            .add_value(quality, observation.confidence);
        self.confidence = self.confidence_filter.average().clamp(0.0, 1.0);
        self.update_performance(retire_gradient);

        outcome
    }

    fn refit(&mut self, tuning: &TrackerTuning) -> bool {
        let observations: Vec<&Observation> = self.bins.values().collect();
        let previous = (!self.sphere.is_null()).then_some(&self.sphere);
        match fit_sphere(&observations, previous, &tuning.solver) {
            Ok(fit) => {
                if self.initial_sphere.is_null() {
                    log::info!(
                        "Model {} initial sphere: center {:?}, radius {:.2}mm",
                        self.id,
                        fit.sphere.center.as_slice(),
                        fit.sphere.radius
                    );
                    self.initial_sphere = fit.sphere;
                }
                self.sphere = fit.sphere;
                self.solver_fit = fit.solver_fit;
                true
            }
            Err(SphereFitError::NotConverged { iterations }) => {
                log::warn!("Model {} fit did not converge in {iterations} iterations", self.id);
                false
            }
            Err(e) => {
                log::debug!("Model {} fit failed: {e}", self.id);
                false
            }
        }
    }

    fn update_performance(&mut self, retire_gradient: f64) {
        self.performance_filter.add_value(self.confidence);
        let performance = self.performance_filter.average();
        self.performance_gradient = self
            .performance
            .map_or(0.0, |previous| performance - previous);
        self.performance = Some(performance);

        if self.performance_gradient < retire_gradient {
            self.negative_streak += 1;
        } else {
            self.negative_streak = 0;
        }
    }

    /// Pupil centres of the binned observations, using the candidate each
    /// agrees with best
    pub fn bin_positions(&self) -> Vec<Vector3<f64>> {
        self.bins
            .values()
            .map(|o| self.predicted_circle(o).center)
            .collect()
    }

    pub fn debug_properties(&self) -> ModelDebugProperties {
        ModelDebugProperties {
            sphere: self.sphere,
            initial_sphere: self.initial_sphere,
            bin_positions: self.bin_positions(),
            maturity: self.maturity,
            solver_fit: self.solver_fit,
            confidence: self.confidence,
            performance: self.performance(),
            performance_gradient: self.performance_gradient,
            model_id: self.id,
            birth_timestamp: self.birth_timestamp,
        }
    }

    #[cfg(test)]
    pub(crate) fn set_stats(&mut self, confidence: f64, maturity: f64, negative_streak: usize) {
        self.confidence = confidence;
        self.maturity = maturity;
        self.negative_streak = negative_streak;
    }
}
