//! # gesture_recognizer
//!
//! Classifies coalesced glove gestures against one trained model per
//! [`GestureType`](glove_data::GestureType) and hands accepted moves to the
//! game layer.
//!
//! * [`RecognizerManager`] owns the per-type models and the acceptance
//!   thresholds; it trains, recognizes, saves and loads.
//! * [`spawn_recognition_worker`] runs a manager on its own thread behind a
//!   channel; [`Pipeline`] chains it after the event coalescer.
//! * [`PipelineConfig`] reads every tunable from one TOML file.
//!
//! ## Quick start
//!
//! ```rust
//! use gesture_recognizer::RecognizerManager;
//! use glove_data::synthetic::{Stroke, SyntheticMotion};
//! use glove_data::{GestureType, Handedness};
//!
//! let jab = SyntheticMotion::new(Stroke::Jab, Handedness::Left);
//! let manager = RecognizerManager::default();
//! manager.train(GestureType::LeftJab, &jab.data_set(8, 1).unwrap()).unwrap();
//!
//! let unseen = jab.instance(500).unwrap();
//! assert_eq!(manager.recognize(&unseen), Some(GestureType::LeftJab));
//!
//! let mut saved = Vec::new();
//! manager.save(&mut saved).unwrap();
//! ```

pub mod config;
pub mod engine;
pub mod engine_file;
pub mod manager;
pub mod result;
pub mod worker;

pub use config::{ConfigError, PipelineConfig, RecognizerConfig};
pub use engine::Engine;
pub use engine_file::{EngineError, EngineFormatError};
pub use manager::{ManagerTrainingError, RecognizedGesture, RecognizerManager};
pub use result::{GestureScore, RecognitionResult};
pub use worker::{spawn_recognition_worker, Pipeline, RecognitionWorker};
