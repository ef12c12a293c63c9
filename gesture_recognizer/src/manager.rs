//! Recognizer manager: scores an instance against every matching model and
//! applies the acceptance gates.
//!
//! Decision sequence for one instance:
//!
//! 1. duration outside `[min_duration_secs, max_duration_secs]` → no match;
//! 2. best Viterbi score over the models whose handedness matches;
//! 3. below `min_base_probability` → compute the best k-means fallback score;
//! 4. fallback below `min_kmeans_probability` → no match;
//! 5. primary ≥ `epsilon_probability` picks the primary type, otherwise a
//!    fallback ≥ `last_chance_probability` picks the fallback type;
//! 6. the candidate's minimum fierceness and sample count must be met.
//!
//! All comparisons are made on natural logs of the probabilities.

use std::io::{Read, Write};
use std::path::Path;

use gesture_hmm::TrainingError;
use glove_data::{ActionKind, Entity, GestureDataSet, GestureInstance, GestureType, PlayerGestureInstance};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{LogThresholds, RecognizerConfig};
use crate::engine::Engine;
use crate::engine_file::{self, EngineError};
use crate::result::{GestureScore, RecognitionResult};

#[derive(Clone, Debug, PartialEq, Error)]
#[error("training {gesture}: {source}")]
pub struct ManagerTrainingError {
    pub gesture: GestureType,
    #[source]
    pub source:  TrainingError,
}

/// What the game layer receives for an accepted gesture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecognizedGesture {
    pub player:     Entity,
    pub gesture:    GestureType,
    pub action:     ActionKind,
    pub uses_left:  bool,
    pub uses_right: bool,
}

impl RecognizedGesture {
    pub fn new(player: Entity, gesture: GestureType) -> Self {
        RecognizedGesture {
            player,
            gesture,
            action:     gesture.action(),
            uses_left:  gesture.uses_left(),
            uses_right: gesture.uses_right(),
        }
    }
}

// Highest-scoring entry; first one wins ties.
fn best_of(scores: impl Iterator<Item = (GestureType, Option<f64>)>) -> Option<(GestureType, f64)> {
    scores.fold(None, |best, (g, score)| match (best, score) {
        (_, None) => best,
        (None, Some(s)) => Some((g, s)),
        (Some((_, b)), Some(s)) if s > b => Some((g, s)),
        (Some(_), Some(_)) => best,
    })
}

// Steps 3 to 5: pick a candidate from the best primary score, computing the
// k-means fallback only when the primary is below the base threshold.
fn select(
    primary:  Option<(GestureType, f64)>,
    fallback: impl FnOnce() -> Option<(GestureType, f64)>,
    t:        &LogThresholds,
) -> Option<GestureType> {
    let primary_log = primary.map_or(f64::NEG_INFINITY, |(_, s)| s);

    let mut backup = None;
    if primary_log < t.min_base {
        backup = fallback();
        let backup_log = backup.map_or(f64::NEG_INFINITY, |(_, s)| s);
        debug!(primary = primary_log, fallback = backup_log, "primary score below base threshold");
        if backup_log < t.min_kmeans {
            return None;
        }
    }

    if primary_log >= t.epsilon {
        return primary.map(|(g, _)| g);
    }
    let chosen = backup.filter(|(_, s)| *s >= t.last_chance).map(|(g, _)| g);
    if chosen.is_none() {
        debug!(primary = primary_log, "no candidate above the acceptance thresholds");
    }
    chosen
}

// ════════════════════════════════════════════════════════════════════════════
// RecognizerManager
// ════════════════════════════════════════════════════════════════════════════

/// Owns the model engine and the recognition thresholds. Every method takes
/// `&self`, so one manager can be shared between a trainer and any number
/// of recognizing threads through an `Arc`.
pub struct RecognizerManager {
    engine: Engine,
    config: RecognizerConfig,
}

impl Default for RecognizerManager {
    fn default() -> Self {
        RecognizerManager::new(RecognizerConfig::default())
    }
}

impl RecognizerManager {
    pub fn new(config: RecognizerConfig) -> Self {
        RecognizerManager { engine: Engine::new(), config }
    }

    pub fn config(&self) -> &RecognizerConfig { &self.config }
    pub fn engine(&self) -> &Engine { &self.engine }

    // ── training ──────────────────────────────────────────────────────────

    /// Train `gesture` on a copy of `data` with the instances of the wrong
    /// handedness removed.
    pub fn train(&self, gesture: GestureType, data: &GestureDataSet) -> Result<(), ManagerTrainingError> {
        let mut clean = data.clone();
        let dropped = clean.retain_for(gesture);
        if dropped > 0 {
            info!(gesture = %gesture, dropped, kept = clean.len(), "ignoring training instances with the wrong hands");
        }
        self.engine
            .train(gesture, &clean, &self.config.training)
            .map_err(|source| ManagerTrainingError { gesture, source })
    }

    pub fn untrain(&self, gesture: GestureType) {
        self.engine.untrain(gesture);
    }

    pub fn clear(&self) {
        self.engine.clear();
    }

    pub fn is_trained(&self, gesture: GestureType) -> bool {
        self.engine.is_trained(gesture)
    }

    // ── gates ─────────────────────────────────────────────────────────────

    /// Duration check applied before any scoring.
    pub fn is_acceptable(&self, inst: &GestureInstance) -> bool {
        let d = inst.duration();
        d >= self.config.min_duration_secs && d <= self.config.max_duration_secs
    }

    /// Physical check of `inst` against one gesture type: hands, strength
    /// and length.
    pub fn is_acceptable_for(&self, inst: &GestureInstance, gesture: GestureType) -> bool {
        if !gesture.handedness().matches(inst) {
            return false;
        }
        let fierceness = inst.fierceness();
        if fierceness < gesture.min_fierceness() {
            debug!(gesture = %gesture, fierceness, required = gesture.min_fierceness(), "not fierce enough");
            return false;
        }
        if inst.num_samples() < gesture.min_samples() {
            debug!(gesture = %gesture, samples = inst.num_samples(), required = gesture.min_samples(), "too few samples");
            return false;
        }
        true
    }

    fn candidates(inst: &GestureInstance) -> impl Iterator<Item = GestureType> + '_ {
        GestureType::ALL.into_iter().filter(move |g| g.handedness().matches(inst))
    }

    // ── recognition ───────────────────────────────────────────────────────

    pub fn recognize(&self, inst: &GestureInstance) -> Option<GestureType> {
        if !self.is_acceptable(inst) {
            debug!(duration = inst.duration(), "instance duration out of range");
            return None;
        }
        let primary = best_of(
            Self::candidates(inst).map(|g| (g, self.engine.with_model(g, |m| m.log_score(inst)))),
        );
        let fallback = || {
            best_of(Self::candidates(inst).map(|g| (g, self.engine.with_model(g, |m| m.kmeans_log_score(inst)))))
        };
        let gesture = select(primary, fallback, &self.config.log_thresholds())?;

        if !self.is_acceptable_for(inst, gesture) {
            return None;
        }
        debug!(gesture = %gesture, "recognized");
        Some(gesture)
    }

    /// Both scores for every registered type. Types whose handedness does
    /// not match, and every type when the duration gate fails, are left
    /// unscored.
    pub fn recognize_with_full_result(&self, inst: &GestureInstance) -> RecognitionResult {
        let mut result = RecognitionResult::unscored();
        if !self.is_acceptable(inst) {
            return result;
        }
        for score in result.scores.iter_mut() {
            let g = score.gesture;
            if g.handedness().matches(inst) {
                *score = self.engine.with_model(g, |m| GestureScore::new(g, m.log_score(inst), m.kmeans_log_score(inst)));
            }
        }
        result
    }

    pub fn recognize_player_gesture(&self, item: &PlayerGestureInstance) -> Option<RecognizedGesture> {
        let gesture = self.recognize(&item.instance)?;
        info!(player = item.player.name(), gesture = %gesture, "gesture recognized");
        Some(RecognizedGesture::new(item.player, gesture))
    }

    // ── persistence ───────────────────────────────────────────────────────

    pub fn save<W: Write>(&self, w: W) -> Result<(), EngineError> {
        engine_file::write_engine(&self.engine, w)
    }

    /// Replace models from a saved engine. Nothing changes if the stream is
    /// rejected.
    pub fn load<R: Read>(&self, r: R) -> Result<(), EngineError> {
        engine_file::read_engine(&self.engine, r)
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        engine_file::save_to_path(&self.engine, path)
    }

    pub fn load_from_path(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        engine_file::load_from_path(&self.engine, path)
    }
}
