//! A fully recorded gesture: one or two hands of samples plus elapsed time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gesture_type::Handedness;
use crate::sample::SensorSample;

/// Accelerometer components contributed to an observation row per hand.
pub const AXES_PER_HAND: usize = 3;

/// Which glove a sequence of samples came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub fn other(self) -> Hand {
        match self {
            Hand::Left  => Hand::Right,
            Hand::Right => Hand::Left,
        }
    }
}

/// Structural violations rejected by [`GestureInstance::new`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidGesture {
    #[error("gesture has no glove data for either hand")]
    NoHands,
    #[error("{0:?} hand is present but holds no samples")]
    EmptyHand(Hand),
    #[error("{hand:?} hand has {samples} samples but there are {time_pts} time points")]
    LengthMismatch { hand: Hand, samples: usize, time_pts: usize },
    #[error("time point {index} is not finite")]
    NonFiniteTime { index: usize },
    #[error("time point {index} goes backwards ({prev} -> {next})")]
    DecreasingTime { index: usize, prev: f64, next: f64 },
}

/// One complete attempt at a move.
///
/// Invariants (enforced at construction and on deserialize):
/// at least one hand present, every present hand non-empty and the same
/// length as `time_pts`, `time_pts` finite and non-decreasing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGestureInstance", into = "RawGestureInstance")]
pub struct GestureInstance {
    left:     Option<Vec<SensorSample>>,
    right:    Option<Vec<SensorSample>>,
    time_pts: Vec<f64>,
}

#[derive(Serialize, Deserialize)]
struct RawGestureInstance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    left:     Option<Vec<SensorSample>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    right:    Option<Vec<SensorSample>>,
    time_pts: Vec<f64>,
}

impl TryFrom<RawGestureInstance> for GestureInstance {
    type Error = InvalidGesture;
    fn try_from(raw: RawGestureInstance) -> Result<Self, Self::Error> {
        GestureInstance::new(raw.left, raw.right, raw.time_pts)
    }
}

impl From<GestureInstance> for RawGestureInstance {
    fn from(g: GestureInstance) -> Self {
        RawGestureInstance { left: g.left, right: g.right, time_pts: g.time_pts }
    }
}

impl GestureInstance {
    pub fn new(
        left:     Option<Vec<SensorSample>>,
        right:    Option<Vec<SensorSample>>,
        time_pts: Vec<f64>,
    ) -> Result<Self, InvalidGesture> {
        if left.is_none() && right.is_none() {
            return Err(InvalidGesture::NoHands);
        }
        for (hand, data) in [(Hand::Left, &left), (Hand::Right, &right)] {
            if let Some(samples) = data {
                if samples.is_empty() {
                    return Err(InvalidGesture::EmptyHand(hand));
                }
                if samples.len() != time_pts.len() {
                    return Err(InvalidGesture::LengthMismatch {
                        hand,
                        samples:  samples.len(),
                        time_pts: time_pts.len(),
                    });
                }
            }
        }
        for (index, t) in time_pts.iter().enumerate() {
            if !t.is_finite() {
                return Err(InvalidGesture::NonFiniteTime { index });
            }
            if index > 0 && *t < time_pts[index - 1] {
                return Err(InvalidGesture::DecreasingTime {
                    index,
                    prev: time_pts[index - 1],
                    next: *t,
                });
            }
        }
        Ok(GestureInstance { left, right, time_pts })
    }

    pub fn left_handed(samples: Vec<SensorSample>, time_pts: Vec<f64>) -> Result<Self, InvalidGesture> {
        Self::new(Some(samples), None, time_pts)
    }

    pub fn right_handed(samples: Vec<SensorSample>, time_pts: Vec<f64>) -> Result<Self, InvalidGesture> {
        Self::new(None, Some(samples), time_pts)
    }

    pub fn two_handed(
        left:     Vec<SensorSample>,
        right:    Vec<SensorSample>,
        time_pts: Vec<f64>,
    ) -> Result<Self, InvalidGesture> {
        Self::new(Some(left), Some(right), time_pts)
    }

    // ── accessors ─────────────────────────────────────────────────────────

    pub fn left(&self) -> Option<&[SensorSample]> { self.left.as_deref() }
    pub fn right(&self) -> Option<&[SensorSample]> { self.right.as_deref() }
    pub fn time_pts(&self) -> &[f64] { &self.time_pts }

    pub fn hand(&self, hand: Hand) -> Option<&[SensorSample]> {
        match hand {
            Hand::Left  => self.left(),
            Hand::Right => self.right(),
        }
    }

    pub fn has_left(&self) -> bool { self.left.is_some() }
    pub fn has_right(&self) -> bool { self.right.is_some() }

    pub fn num_samples(&self) -> usize { self.time_pts.len() }

    pub fn handedness(&self) -> Handedness {
        match (self.has_left(), self.has_right()) {
            (true, true) => Handedness::Both,
            (true, false) => Handedness::Left,
            _ => Handedness::Right,
        }
    }

    // ── derived metrics ───────────────────────────────────────────────────

    /// 3 per present hand.
    pub fn observation_width(&self) -> usize {
        self.handedness().num_hands() * AXES_PER_HAND
    }

    /// One row per sample: left accel xyz (if present) then right accel xyz
    /// (if present). Gyro and magnetometer do not take part.
    pub fn observation_rows(&self) -> Vec<Vec<f64>> {
        (0..self.num_samples())
            .map(|i| {
                let mut row = Vec::with_capacity(self.observation_width());
                for hand in [&self.left, &self.right].into_iter().flatten() {
                    row.extend(hand[i].accel().iter().copied());
                }
                row
            })
            .collect()
    }

    /// Elapsed seconds between the first and last sample.
    pub fn duration(&self) -> f64 {
        match (self.time_pts.first(), self.time_pts.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// Max minus min acceleration magnitude over one hand, `None` if the
    /// hand is absent.
    pub fn hand_fierceness(&self, hand: Hand) -> Option<f64> {
        let samples = self.hand(hand)?;
        let (lo, hi) = samples.iter().map(SensorSample::accel_magnitude).fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(lo, hi), m| (lo.min(m), hi.max(m)),
        );
        Some(hi - lo)
    }

    /// The larger of the present hands' fierceness values.
    pub fn fierceness(&self) -> f64 {
        [Hand::Left, Hand::Right]
            .into_iter()
            .filter_map(|h| self.hand_fierceness(h))
            .fold(0.0, f64::max)
    }
}
