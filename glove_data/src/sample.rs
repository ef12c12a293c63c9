//! A single time-slice of glove sensor data.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Per-axis tolerance used by [`SensorSample`]'s equality.
pub const SAMPLE_EPSILON: f64 = 1e-4;

/// One gyroscope / accelerometer / magnetometer reading.
///
/// Equality is approximate: two samples are equal when every axis of every
/// sensor differs by at most [`SAMPLE_EPSILON`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SensorSample {
    gyro:    Vector3<f64>,
    accel:   Vector3<f64>,
    magneto: Vector3<f64>,
}

impl SensorSample {
    pub fn new(gyro: Vector3<f64>, accel: Vector3<f64>, magneto: Vector3<f64>) -> Self {
        SensorSample { gyro, accel, magneto }
    }

    /// Build from the 9-value device payload: gyro xyz, accel xyz, mag xyz.
    pub fn from_payload(p: [f64; 9]) -> Self {
        SensorSample {
            gyro:    Vector3::new(p[0], p[1], p[2]),
            accel:   Vector3::new(p[3], p[4], p[5]),
            magneto: Vector3::new(p[6], p[7], p[8]),
        }
    }

    /// Sample with only accelerometer data; gyro and magnetometer are zero.
    pub fn from_accel(x: f64, y: f64, z: f64) -> Self {
        SensorSample {
            gyro:    Vector3::zeros(),
            accel:   Vector3::new(x, y, z),
            magneto: Vector3::zeros(),
        }
    }

    pub fn gyro(&self) -> &Vector3<f64> { &self.gyro }
    pub fn accel(&self) -> &Vector3<f64> { &self.accel }
    pub fn magneto(&self) -> &Vector3<f64> { &self.magneto }

    /// Euclidean length of the acceleration vector.
    pub fn accel_magnitude(&self) -> f64 {
        self.accel.norm()
    }
}

fn approx_eq(a: &Vector3<f64>, b: &Vector3<f64>) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= SAMPLE_EPSILON)
}

impl PartialEq for SensorSample {
    fn eq(&self, other: &Self) -> bool {
        approx_eq(&self.gyro, &other.gyro)
            && approx_eq(&self.accel, &other.accel)
            && approx_eq(&self.magneto, &other.magneto)
    }
}
