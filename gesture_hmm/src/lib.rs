//! # gesture_hmm
//!
//! Statistical gesture models: one Gaussian-emission hidden Markov model per
//! [`GestureType`](glove_data::GestureType).
//!
//! Training pools every instance's acceleration rows, clusters them with
//! k-means to seed the per-state Gaussians and the transition counts, then
//! runs a fixed number of multi-sequence Baum-Welch rounds. Scoring decodes
//! the Viterbi path and reports `exp(log P(O, Q*))`.
//!
//! ## Quick start
//!
//! ```rust
//! use gesture_hmm::{GestureModel, TrainingConfig};
//! use glove_data::synthetic::{Stroke, SyntheticMotion};
//! use glove_data::{GestureType, Handedness};
//!
//! let motion = SyntheticMotion::new(Stroke::Jab, Handedness::Left);
//! let data = motion.data_set(6, 1).unwrap();
//!
//! let mut model = GestureModel::new(GestureType::LeftJab);
//! model.train(&data, &TrainingConfig::default()).unwrap();
//!
//! let unseen = motion.instance(42).unwrap();
//! assert!(model.log_score(&unseen).is_some());
//! ```

pub mod gaussian;
pub mod kmeans;
pub mod hmm;
pub mod model;
pub mod codec;

pub use codec::{decode_hmm, encode_hmm, ByteReader, DecodeError};
pub use gaussian::Gaussian;
pub use hmm::GaussianHmm;
pub use kmeans::{kmeans, Clustering};
pub use model::{GestureModel, ShapeMismatch, TrainingConfig, TrainingError, TrainingStage};
