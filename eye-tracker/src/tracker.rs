//! Multi-hypothesis eye-model tracker.
//!
//! Keeps a small population of [`EyeModel`]s keyed by id, feeds every frame's
//! observation to all of them, spawns a fresh hypothesis when the best one
//! stays poor for too long, retires hypotheses that keep degrading once a
//! newer one overtakes them, and reports the best-ranked model each frame.

use std::collections::BTreeMap;

use eye_math::{Circle3D, MovingAverageError};
use nalgebra::Vector3;
use pupil_shared::{Detector2DResult, Detector3DProperties, Detector3DResult};
use thiserror::Error;

use crate::camera::{Reprojector, Unprojector};
use crate::model::EyeModel;
use crate::observation::Observation;
use crate::tuning::{TrackerTuning, TuningError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("invalid 3D detector properties: {0}")]
    InvalidProperties(String),

    #[error("invalid tracker tuning: {0}")]
    InvalidTuning(#[from] TuningError),

    #[error("filter setup failed: {0}")]
    Filter(#[from] MovingAverageError),
}

/// Tracker over a population of eye-model hypotheses
pub struct EyeModelTracker<C> {
    camera: C,
    tuning: TrackerTuning,
    models: BTreeMap<u64, EyeModel>,
    /// Next id to hand out; ids start at 1 so 0 can mean "no model"
    next_id: u64,
    /// Start of the current run of frames where the best confidence was too low
    low_confidence_since: Option<f64>,
}

impl<C: Unprojector + Reprojector> EyeModelTracker<C> {
    pub fn new(camera: C, tuning: TrackerTuning) -> Result<Self, TrackerError> {
        tuning.validate()?;
        Ok(Self {
            camera,
            tuning,
            models: BTreeMap::new(),
            next_id: 1,
            low_confidence_since: None,
        })
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn tuning(&self) -> &TrackerTuning {
        &self.tuning
    }

    /// Live models in id order
    pub fn models(&self) -> impl Iterator<Item = &EyeModel> {
        self.models.values()
    }

    pub fn model_ids(&self) -> Vec<u64> {
        self.models.keys().copied().collect()
    }

    /// Best-ranked live model
    pub fn selected(&self) -> Option<&EyeModel> {
        self.models
            .values()
            .fold(None, |best: Option<&EyeModel>, model| match best {
                Some(b) if !model.rank().beats(&b.rank()) => Some(b),
                _ => Some(model),
            })
    }

    /// Drop every model; ids keep increasing
    pub fn reset(&mut self) {
        log::info!("Resetting tracker, dropping {} models", self.models.len());
        self.models.clear();
        self.low_confidence_since = None;
    }

    /// Process one frame.
    ///
    /// `result` is the frame's 2D detection, or `None` if the 2D stage did
    /// not run. Debug fields of the returned record are filled only when
    /// `debug` is set.
    pub fn update(
        &mut self,
        result: Option<&Detector2DResult>,
        timestamp: f64,
        properties: &Detector3DProperties,
        debug: bool,
    ) -> Result<Detector3DResult, TrackerError> {
        let sensitivity = properties.model_sensitivity;
        if !sensitivity.is_finite() || !(0.0..=1.0).contains(&sensitivity) {
            return Err(TrackerError::InvalidProperties(format!(
                "model_sensitivity must be in [0, 1], got {sensitivity}"
            )));
        }

        let observation = result
            .filter(|r| r.confidence >= self.tuning.observation_confidence_floor)
            .and_then(|r| {
                let observation = Observation::from_result(r, &self.camera);
                if observation.is_none() && r.has_detection() {
                    log::debug!("Dropping frame at t={timestamp:.3}: ellipse could not be unprojected");
                }
                observation
            });

        if properties.model_is_frozen {
            // Low confidence has to persist for the full delay while live
            self.low_confidence_since = None;
        } else {
            if let Some(observation) = &observation {
                if self.models.is_empty() {
                    self.spawn(timestamp)?;
                }
                self.observe_all(observation, sensitivity);
            }
            self.check_spawn(timestamp, sensitivity)?;
            self.retire_overtaken();
            self.enforce_cap();
        }

        Ok(self.report(observation.as_ref(), result, timestamp, debug))
    }

    fn spawn(&mut self, timestamp: f64) -> Result<u64, TrackerError> {
        let id = self.next_id;
        let model = EyeModel::new(id, timestamp, &self.tuning)?;
        self.next_id += 1;
        self.models.insert(id, model);
        log::info!(
            "Spawned eye model {id} at t={timestamp:.3} ({} live)",
            self.models.len()
        );
        Ok(id)
    }

    fn observe_all(&mut self, observation: &Observation, sensitivity: f64) {
        let tolerance = self.tuning.observation_tolerance_mm.at(sensitivity);
        let retire_gradient = self.tuning.retire_gradient.at(sensitivity);
        for model in self.models.values_mut() {
            model.observe(observation, tolerance, retire_gradient, &self.tuning);
        }
    }

    fn check_spawn(&mut self, timestamp: f64, sensitivity: f64) -> Result<(), TrackerError> {
        let Some(best) = self.selected().map(|m| m.confidence()) else {
            self.low_confidence_since = None;
            return Ok(());
        };

        if best >= self.tuning.spawn_confidence.at(sensitivity) {
            self.low_confidence_since = None;
            return Ok(());
        }

        let since = *self.low_confidence_since.get_or_insert(timestamp);
        if timestamp - since >= self.tuning.spawn_delay_s.at(sensitivity) {
            log::info!(
                "Best confidence {best:.3} low since t={since:.3}, spawning a new hypothesis"
            );
            self.spawn(timestamp)?;
            self.low_confidence_since = None;
        }
        Ok(())
    }

    /// Retire models that keep degrading once a newer model has overtaken them
    fn retire_overtaken(&mut self) {
        if self.models.len() < 2 {
            return;
        }
        let patience = self.tuning.retire_patience;
        let retired: Vec<u64> = self
            .models
            .values()
            .filter(|model| model.negative_streak() >= patience)
            .filter(|model| {
                self.models
                    .range(model.id() + 1..)
                    .any(|(_, newer)| newer.confidence() > model.confidence())
            })
            .map(|model| model.id())
            .collect();

        for id in retired {
            if let Some(model) = self.models.remove(&id) {
                log::info!(
                    "Retired eye model {id}: confidence {:.3}, gradient {:.4} for {} updates",
                    model.confidence(),
                    model.performance_gradient(),
                    model.negative_streak()
                );
            }
        }
    }

    /// Evict the lowest-ranked models, never the newest, while over the cap
    fn enforce_cap(&mut self) {
        while self.models.len() > self.tuning.max_models {
            let newest = self.models.keys().next_back().copied();
            let worst = self
                .models
                .values()
                .filter(|model| Some(model.id()) != newest)
                .fold(None, |worst: Option<&EyeModel>, model| match worst {
                    Some(w) if !w.rank().beats(&model.rank()) => Some(w),
                    _ => Some(model),
                })
                .map(|model| model.id());

            let Some(id) = worst else {
                break;
            };
            self.models.remove(&id);
            log::info!(
                "Evicted eye model {id}, population cap is {}",
                self.tuning.max_models
            );
        }
    }

    fn report(
        &self,
        observation: Option<&Observation>,
        result: Option<&Detector2DResult>,
        timestamp: f64,
        debug: bool,
    ) -> Detector3DResult {
        let mut report = Detector3DResult::unassigned(timestamp);
        let Some(model) = self.selected() else {
            return report;
        };

        report.model_id = model.id();
        report.model_birth_timestamp = model.birth_timestamp();
        report.model_confidence = model.confidence();
        report.confidence = model.confidence();
        report.sphere = *model.sphere();
        if let Some(projected) = self.camera.project_sphere(model.sphere()) {
            report.projected_sphere = projected;
        }

        if let Some(observation) = observation {
            report.circle = self.pupil_on_sphere(model, observation);
            if let Some(ellipse) = self.camera.project_circle(&report.circle) {
                report.ellipse = ellipse;
            }
        }

        if debug {
            report.models = self.models.values().map(|m| m.debug_properties()).collect();
            if let Some(observation) = observation {
                report.predicted_circle = model.predicted_circle(observation);
            }
            if let Some(result) = result {
                report.edges = self.edges_on_sphere(model, result);
            }
        }
        report
    }

    /// Pupil circle where the observation's viewing ray meets the model sphere.
    ///
    /// Falls back to the model's preferred candidate when the ray misses.
    fn pupil_on_sphere(&self, model: &EyeModel, observation: &Observation) -> Circle3D {
        let sphere = model.sphere();
        if sphere.is_null() {
            return model.predicted_circle(observation);
        }
        let center = observation.ellipse.center;
        let hit = self
            .camera
            .pixel_ray(center.x, center.y)
            .and_then(|ray| sphere.intersect_ray(&Vector3::zeros(), &ray));
        let Some(point) = hit else {
            return model.predicted_circle(observation);
        };

        let normal = (point - sphere.center) / sphere.radius;
        let candidate = model.predicted_circle(observation);
        // Rescale the radius to the depth the pupil actually sits at
        let radius = candidate.radius * point.z / candidate.center.z;
        Circle3D::new(point, normal, radius)
    }

    fn edges_on_sphere(&self, model: &EyeModel, result: &Detector2DResult) -> Vec<Vector3<f64>> {
        let sphere = model.sphere();
        if sphere.is_null() {
            return Vec::new();
        }
        result
            .final_edges_in_image()
            .filter_map(|edge| {
                let ray = self.camera.pixel_ray(f64::from(edge.x), f64::from(edge.y))?;
                sphere.intersect_ray(&Vector3::zeros(), &ray)
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn model_mut(&mut self, id: u64) -> Option<&mut EyeModel> {
        self.models.get_mut(&id)
    }

    #[cfg(test)]
    pub(crate) fn spawn_for_test(&mut self, timestamp: f64) -> u64 {
        self.spawn(timestamp).unwrap()
    }
}
