//! # glove_data
//!
//! Value types shared by every stage of the glove gesture pipeline.
//!
//! | Type | Meaning |
//! |---|---|
//! | [`SensorSample`] | One gyro / accelerometer / magnetometer reading |
//! | [`GestureInstance`] | One recorded attempt at a move, one or two hands |
//! | [`GestureDataSet`] | Training instances for a single [`GestureType`] |
//! | [`GestureType`] | Static registry of the moves the game knows about |
//! | [`Entity`] | Who produced the data (player 1, player 2, ringmaster) |
//!
//! ## Quick start
//!
//! ```rust
//! use glove_data::{GestureInstance, GestureType, SensorSample};
//!
//! let samples: Vec<SensorSample> = (0..8)
//!     .map(|i| SensorSample::from_accel(i as f64 * 100.0, 0.0, 0.0))
//!     .collect();
//! let times: Vec<f64> = (0..8).map(|i| i as f64 * 0.02).collect();
//!
//! let inst = GestureInstance::left_handed(samples, times).unwrap();
//! assert_eq!(inst.observation_width(), 3);
//! assert!((inst.fierceness() - 700.0).abs() < 1e-9);
//! assert!(GestureType::LeftJab.handedness().matches(&inst));
//! ```

pub mod sample;
pub mod instance;
pub mod data_set;
pub mod gesture_type;
pub mod synthetic;

pub use sample::SensorSample;
pub use instance::{GestureInstance, Hand, InvalidGesture};
pub use data_set::{DataFileError, GestureDataSet};
pub use gesture_type::{ActionKind, GestureGenre, GestureProfile, GestureType, Handedness};

use serde::{Deserialize, Serialize};

/// Source identity attached to device events and to the gestures built from
/// them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Entity {
    Player1,
    Player2,
    Ringmaster,
}

impl Entity {
    pub fn name(self) -> &'static str {
        match self {
            Entity::Player1    => "player1",
            Entity::Player2    => "player2",
            Entity::Ringmaster => "ringmaster",
        }
    }
}

/// A gesture instance tagged with the player that performed it.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerGestureInstance {
    pub player:   Entity,
    pub instance: GestureInstance,
}
