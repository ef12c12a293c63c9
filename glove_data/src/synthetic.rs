//! Deterministic synthetic glove motion.
//!
//! Produces repeatable accelerometer traces for a handful of stroke shapes so
//! training and recognition can be exercised without hardware. Variation
//! between repetitions comes from a small linear congruential generator
//! seeded by the caller, so the same seed always yields the same instance.

use std::f64::consts::PI;

use nalgebra::Vector3;

use crate::data_set::GestureDataSet;
use crate::gesture_type::Handedness;
use crate::instance::{GestureInstance, InvalidGesture};
use crate::sample::SensorSample;

// Noise amplitude as a fraction of the peak.
const JITTER: f64 = 0.03;

/// Basic accelerometer trajectory shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stroke {
    /// Straight punch: one pulse along +x followed by a short recoil.
    Jab,
    /// Sweep through the x/y plane.
    Hook,
    /// Rise along +z then drop.
    Uppercut,
    /// Downward cut along -z with a sideways drift.
    Chop,
    /// Full circle in the x/y plane.
    Circle,
}

impl Stroke {
    /// Unit-amplitude acceleration at normalised time `u` in `[0, 1]`.
    fn shape(self, u: f64) -> Vector3<f64> {
        match self {
            Stroke::Jab => {
                let x = if u < 0.7 { (PI * u / 0.7).sin() } else { -0.3 * (PI * (u - 0.7) / 0.3).sin() };
                Vector3::new(x, 0.0, 0.0)
            }
            Stroke::Hook => {
                let a = PI * u;
                Vector3::new(a.cos(), a.sin(), 0.0)
            }
            Stroke::Uppercut => Vector3::new(0.0, 0.0, (PI * u).sin() * (1.0 - 0.5 * u)),
            Stroke::Chop => Vector3::new(0.0, 0.3 * u, -(PI * u).sin()),
            Stroke::Circle => {
                let a = 2.0 * PI * u;
                Vector3::new(a.cos(), a.sin(), 0.0)
            }
        }
    }
}

/// Builder for repeatable synthetic gesture instances.
#[derive(Clone, Debug)]
pub struct SyntheticMotion {
    stroke:     Stroke,
    handedness: Handedness,
    samples:    usize,
    peak:       f64,
    dt:         f64,
}

impl SyntheticMotion {
    pub fn new(stroke: Stroke, handedness: Handedness) -> Self {
        SyntheticMotion {
            stroke,
            handedness,
            samples: 40,
            peak:    12_000.0,
            dt:      0.01,
        }
    }

    pub fn samples(mut self, n: usize) -> Self { self.samples = n; self }
    pub fn peak(mut self, peak: f64) -> Self { self.peak = peak; self }
    pub fn dt(mut self, dt: f64) -> Self { self.dt = dt; self }

    /// One repetition; different seeds give slightly different amplitude,
    /// phase and noise.
    pub fn instance(&self, seed: u64) -> Result<GestureInstance, InvalidGesture> {
        let mut rng = Lcg::new(seed);
        let time_pts: Vec<f64> = (0..self.samples).map(|i| i as f64 * self.dt).collect();

        let left = self.handedness.uses_left().then(|| self.trace(&mut rng, 1.0));
        let right = self.handedness.uses_right().then(|| self.trace(&mut rng, -1.0));
        GestureInstance::new(left, right, time_pts)
    }

    /// `count` repetitions seeded `seed`, `seed + 1`, ...
    pub fn data_set(&self, count: usize, seed: u64) -> Result<GestureDataSet, InvalidGesture> {
        (0..count as u64).map(|i| self.instance(seed.wrapping_add(i))).collect()
    }

    // The right hand mirrors the left along x.
    fn trace(&self, rng: &mut Lcg, mirror: f64) -> Vec<SensorSample> {
        let scale = self.peak * (1.0 + 0.1 * (rng.next_f64() - 0.5));
        let phase = 0.05 * (rng.next_f64() - 0.5);
        let noise = self.peak * JITTER;
        let last = (self.samples.max(2) - 1) as f64;

        (0..self.samples)
            .map(|i| {
                let u = (i as f64 / last + phase).clamp(0.0, 1.0);
                let mut a = self.stroke.shape(u) * scale;
                a.x *= mirror;
                for v in a.iter_mut() {
                    *v += noise * (rng.next_f64() - 0.5);
                }
                SensorSample::new(Vector3::zeros(), a, Vector3::zeros())
            })
            .collect()
    }
}

struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Lcg(seed ^ 0x9E37_79B9_7F4A_7C15)
    }

    fn next_f64(&mut self) -> f64 {
        self.0 = self.0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}
