use serde::{Deserialize, Serialize};

/// Tuning for the event coalescer and its thread.
///
/// Every field has a default, so a partial `[coalescer]` TOML table works.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoalescerConfig {
    /// A glove buffer holding this many samples is flushed immediately.
    pub buffer_capacity:             usize,
    /// Maximum first-sample skew (seconds) for two gloves to form one gesture.
    pub coactivation_threshold_secs: f64,
    /// Bound of the output channel; a full channel drops new instances.
    pub output_capacity:             usize,
    /// How long the thread waits on its input before re-checking the stop flag.
    pub poll_interval_ms:            u64,
    /// A pressed glove that goes this long without any event is treated as
    /// released. `0` disables the check.
    pub release_timeout_ms:          u64,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        CoalescerConfig {
            buffer_capacity:             128,
            coactivation_threshold_secs: 0.5,
            output_capacity:             256,
            poll_interval_ms:            50,
            release_timeout_ms:          800,
        }
    }
}

impl CoalescerConfig {
    pub fn buffer_capacity(mut self, n: usize) -> Self {
        self.buffer_capacity = n.max(1);
        self
    }

    pub fn coactivation_threshold_secs(mut self, secs: f64) -> Self {
        self.coactivation_threshold_secs = secs;
        self
    }

    pub fn output_capacity(mut self, n: usize) -> Self {
        self.output_capacity = n;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn release_timeout_ms(mut self, ms: u64) -> Self {
        self.release_timeout_ms = ms;
        self
    }

    /// Threshold in the millisecond units of device timestamps.
    pub(crate) fn coactivation_threshold_ms(&self) -> f64 {
        self.coactivation_threshold_secs * 1000.0
    }
}
