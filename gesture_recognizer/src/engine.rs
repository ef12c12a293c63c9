//! The model map: one [`GestureModel`] per [`GestureType`].
//!
//! Each slot pairs a reader/writer lock around the model with a training
//! mutex. Scorers take the read lock; a trainer holds the slot's training
//! mutex, fits a clone of the model without any model lock held, and then
//! swaps the result in under a brief write lock.

use std::sync::{Mutex, PoisonError, RwLock};

use gesture_hmm::{GaussianHmm, GestureModel, TrainingConfig, TrainingError};
use glove_data::{GestureDataSet, GestureType};

struct ModelSlot {
    model:    RwLock<GestureModel>,
    training: Mutex<()>,
}

impl ModelSlot {
    fn new(gesture: GestureType) -> Self {
        ModelSlot {
            model:    RwLock::new(GestureModel::new(gesture)),
            training: Mutex::new(()),
        }
    }
}

/// Per-type models, shareable between threads by reference.
pub struct Engine {
    // Indexed by `GestureType as usize`.
    slots: Vec<ModelSlot>,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

impl Engine {
    /// Every gesture type, untrained.
    pub fn new() -> Self {
        Engine { slots: GestureType::ALL.into_iter().map(ModelSlot::new).collect() }
    }

    fn slot(&self, gesture: GestureType) -> &ModelSlot {
        &self.slots[gesture as usize]
    }

    /// Run `f` with read access to `gesture`'s model.
    pub fn with_model<R>(&self, gesture: GestureType, f: impl FnOnce(&GestureModel) -> R) -> R {
        let guard = self.slot(gesture).model.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Copy of `gesture`'s model as it is right now.
    pub fn snapshot(&self, gesture: GestureType) -> GestureModel {
        self.with_model(gesture, GestureModel::clone)
    }

    pub fn is_trained(&self, gesture: GestureType) -> bool {
        self.with_model(gesture, GestureModel::is_trained)
    }

    /// Replace `gesture`'s model wholesale.
    pub fn replace(&self, gesture: GestureType, model: GestureModel) {
        let slot = self.slot(gesture);
        let _training = slot.training.lock().unwrap_or_else(PoisonError::into_inner);
        *slot.model.write().unwrap_or_else(PoisonError::into_inner) = model;
    }

    /// Put `model` into the slot of the gesture it belongs to.
    pub(crate) fn install(&self, model: GestureModel) {
        self.replace(model.gesture(), model);
    }

    pub fn untrain(&self, gesture: GestureType) {
        self.replace(gesture, GestureModel::new(gesture));
    }

    pub fn clear(&self) {
        for gesture in GestureType::ALL {
            self.untrain(gesture);
        }
    }

    /// Train `gesture` on `data`. Scoring of the same type keeps using the
    /// previous parameters until training has finished.
    pub fn train(
        &self,
        gesture: GestureType,
        data:    &GestureDataSet,
        config:  &TrainingConfig,
    ) -> Result<(), TrainingError> {
        let slot = self.slot(gesture);
        let _training = slot.training.lock().unwrap_or_else(PoisonError::into_inner);

        let mut model = self.snapshot(gesture);
        model.train(data, config)?;

        *slot.model.write().unwrap_or_else(PoisonError::into_inner) = model;
        Ok(())
    }

    /// Trained parameters of every type, in registry order.
    pub fn trained_hmms(&self) -> Vec<(GestureType, Option<GaussianHmm>)> {
        GestureType::ALL
            .into_iter()
            .map(|g| (g, self.with_model(g, |m| m.hmm().cloned())))
            .collect()
    }
}
