//! One trainable, scoreable model per gesture type.

use std::fmt;

use glove_data::{GestureDataSet, GestureInstance, GestureType};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::hmm::GaussianHmm;
use crate::kmeans::kmeans;

/// Lloyd rounds used when clustering a single instance for the fallback
/// score.
const SCORE_KMEANS_ITERATIONS: usize = 50;

// ════════════════════════════════════════════════════════════════════════════
// Configuration
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub kmeans_iterations:     usize,
    pub baum_welch_iterations: usize,
    /// Added to every covariance diagonal after each estimate.
    pub variance_floor:        f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            kmeans_iterations:     50,
            baum_welch_iterations: 15,
            variance_floor:        1e-2,
        }
    }
}

impl TrainingConfig {
    pub fn kmeans_iterations(mut self, n: usize) -> Self {
        self.kmeans_iterations = n;
        self
    }

    pub fn baum_welch_iterations(mut self, n: usize) -> Self {
        self.baum_welch_iterations = n;
        self
    }

    pub fn variance_floor(mut self, floor: f64) -> Self {
        self.variance_floor = floor;
        self
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Errors
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrainingStage {
    Seeding,
    Refinement,
}

impl fmt::Display for TrainingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrainingStage::Seeding    => "seeding",
            TrainingStage::Refinement => "refinement",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum TrainingError {
    #[error("training data set is empty")]
    EmptyDataSet,
    #[error("instance {index} has observation width {found}, model expects {expected}")]
    WidthMismatch { index: usize, expected: usize, found: usize },
    #[error("{rows} observations cannot seed {states} states")]
    TooFewObservations { rows: usize, states: usize },
    #[error("{stage} produced a degenerate emission for state {state}")]
    Degenerate { stage: TrainingStage, state: usize },
}

/// A trained model whose shape does not fit the gesture it is attached to.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("model has {found_states} states x width {found_width}, {gesture} needs {expected_states} x {expected_width}")]
pub struct ShapeMismatch {
    pub gesture:         GestureType,
    pub expected_states: usize,
    pub expected_width:  usize,
    pub found_states:    usize,
    pub found_width:     usize,
}

// ════════════════════════════════════════════════════════════════════════════
// GestureModel
// ════════════════════════════════════════════════════════════════════════════

/// Hidden Markov model for one [`GestureType`]; untrained until the first
/// successful [`GestureModel::train`].
#[derive(Clone, Debug)]
pub struct GestureModel {
    gesture: GestureType,
    hmm:     Option<GaussianHmm>,
}

fn observations(inst: &GestureInstance) -> Vec<DVector<f64>> {
    inst.observation_rows().into_iter().map(DVector::from_vec).collect()
}

impl GestureModel {
    pub fn new(gesture: GestureType) -> Self {
        GestureModel { gesture, hmm: None }
    }

    /// Attach already-trained parameters, e.g. loaded from disk.
    pub fn with_hmm(gesture: GestureType, hmm: GaussianHmm) -> Result<Self, ShapeMismatch> {
        let model = GestureModel::new(gesture);
        if hmm.num_states() != model.num_states() || hmm.width() != model.width() {
            return Err(ShapeMismatch {
                gesture,
                expected_states: model.num_states(),
                expected_width:  model.width(),
                found_states:    hmm.num_states(),
                found_width:     hmm.width(),
            });
        }
        Ok(GestureModel { gesture, hmm: Some(hmm) })
    }

    pub fn gesture(&self) -> GestureType { self.gesture }
    pub fn num_states(&self) -> usize { self.gesture.num_states() }
    pub fn width(&self) -> usize { self.gesture.observation_width() }
    pub fn is_trained(&self) -> bool { self.hmm.is_some() }
    pub fn hmm(&self) -> Option<&GaussianHmm> { self.hmm.as_ref() }

    pub fn untrain(&mut self) {
        self.hmm = None;
    }

    // ── training ──────────────────────────────────────────────────────────

    /// Train on `data`. An untrained model is seeded by k-means first; a
    /// trained one is refined from its current parameters on `data` alone.
    /// On any error the model is left exactly as it was.
    pub fn train(&mut self, data: &GestureDataSet, config: &TrainingConfig) -> Result<(), TrainingError> {
        if data.is_empty() {
            return Err(TrainingError::EmptyDataSet);
        }
        let expected = self.width();
        for (index, inst) in data.iter().enumerate() {
            let found = inst.observation_width();
            if found != expected {
                return Err(TrainingError::WidthMismatch { index, expected, found });
            }
        }

        let sequences: Vec<Vec<DVector<f64>>> = data.iter().map(observations).collect();
        let start = match &self.hmm {
            Some(hmm) => hmm.clone(),
            None => self.seed(&sequences, config)?,
        };

        let mut hmm = start;
        for iteration in 0..config.baum_welch_iterations {
            let (next, ll) = hmm
                .baum_welch_step(&sequences, config.variance_floor)
                .map_err(|state| self.degenerate(TrainingStage::Refinement, state))?;
            debug!(gesture = %self.gesture, iteration, log_likelihood = ll, "baum-welch");
            hmm = next;
        }
        if let Some(state) = hmm.first_degenerate_state() {
            return Err(self.degenerate(TrainingStage::Refinement, state));
        }

        info!(
            gesture = %self.gesture,
            instances = data.len(),
            retrained = self.hmm.is_some(),
            "model trained"
        );
        self.hmm = Some(hmm);
        Ok(())
    }

    fn seed(&self, sequences: &[Vec<DVector<f64>>], config: &TrainingConfig) -> Result<GaussianHmm, TrainingError> {
        let pooled: Vec<DVector<f64>> = sequences.iter().flatten().cloned().collect();
        let states = self.num_states();
        let clustering = kmeans(&pooled, states, config.kmeans_iterations)
            .ok_or(TrainingError::TooFewObservations { rows: pooled.len(), states })?;
        GaussianHmm::seed(sequences, &clustering, config.variance_floor)
            .map_err(|state| self.degenerate(TrainingStage::Seeding, state))
    }

    fn degenerate(&self, stage: TrainingStage, state: usize) -> TrainingError {
        warn!(gesture = %self.gesture, %stage, state, "training produced a degenerate model");
        TrainingError::Degenerate { stage, state }
    }

    // ── scoring ───────────────────────────────────────────────────────────

    // The trained model, if `inst` can be scored against it at all.
    fn scoreable(&self, inst: &GestureInstance) -> Option<&GaussianHmm> {
        let hmm = self.hmm.as_ref()?;
        if inst.observation_width() != self.width() || inst.num_samples() < self.num_states() {
            return None;
        }
        Some(hmm)
    }

    /// log P(O, Q*) along the Viterbi path, or `None` when the instance
    /// cannot be scored (untrained, wrong width, too few samples).
    pub fn log_score(&self, inst: &GestureInstance) -> Option<f64> {
        let hmm = self.scoreable(inst)?;
        hmm.viterbi(&observations(inst)).map(|(_, lp)| lp)
    }

    /// `exp(log_score)`, `0.0` when the instance cannot be scored.
    pub fn score(&self, inst: &GestureInstance) -> f64 {
        self.log_score(inst).map_or(0.0, f64::exp)
    }

    /// Log of the fallback score: cluster the instance into one centroid per
    /// state, order the centroids by when they first occur, and decode that
    /// short sequence.
    pub fn kmeans_log_score(&self, inst: &GestureInstance) -> Option<f64> {
        let hmm = self.scoreable(inst)?;
        let rows = observations(inst);
        let clustering = kmeans(&rows, self.num_states(), SCORE_KMEANS_ITERATIONS)?;
        let centroids: Vec<DVector<f64>> = clustering
            .first_appearance_order()
            .into_iter()
            .map(|c| clustering.centroids[c].clone())
            .collect();
        hmm.viterbi(&centroids).map(|(_, lp)| lp)
    }

    /// `exp(kmeans_log_score)`, `0.0` when the instance cannot be scored.
    pub fn kmeans_score(&self, inst: &GestureInstance) -> f64 {
        self.kmeans_log_score(inst).map_or(0.0, f64::exp)
    }
}
