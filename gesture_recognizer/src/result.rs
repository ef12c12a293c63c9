//! Per-type score report for one gesture instance.

use std::fmt;

use glove_data::GestureType;

/// Both scores of one gesture type against one instance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureScore {
    pub gesture:    GestureType,
    /// Viterbi score, `exp(log_base)`.
    pub base:       f64,
    /// k-means fallback score, `exp(log_kmeans)`.
    pub kmeans:     f64,
    pub log_base:   Option<f64>,
    pub log_kmeans: Option<f64>,
}

impl GestureScore {
    pub(crate) fn unscored(gesture: GestureType) -> Self {
        GestureScore { gesture, base: 0.0, kmeans: 0.0, log_base: None, log_kmeans: None }
    }

    pub(crate) fn new(gesture: GestureType, log_base: Option<f64>, log_kmeans: Option<f64>) -> Self {
        GestureScore {
            gesture,
            base:   log_base.map_or(0.0, f64::exp),
            kmeans: log_kmeans.map_or(0.0, f64::exp),
            log_base,
            log_kmeans,
        }
    }

    /// Log of `max(base, kmeans)`; `-inf` when neither could be computed.
    pub fn best_log(&self) -> f64 {
        let b = self.log_base.unwrap_or(f64::NEG_INFINITY);
        let k = self.log_kmeans.unwrap_or(f64::NEG_INFINITY);
        b.max(k)
    }

    pub fn is_scored(&self) -> bool {
        self.log_base.is_some() || self.log_kmeans.is_some()
    }
}

/// Scores of every registered gesture type, in registry order.
#[derive(Clone, Debug, PartialEq)]
pub struct RecognitionResult {
    pub scores: Vec<GestureScore>,
}

impl RecognitionResult {
    pub(crate) fn unscored() -> Self {
        RecognitionResult { scores: GestureType::ALL.into_iter().map(GestureScore::unscored).collect() }
    }

    pub fn get(&self, gesture: GestureType) -> Option<&GestureScore> {
        self.scores.iter().find(|s| s.gesture == gesture)
    }

    /// Scores ordered by `max(base, kmeans)`, best first. Ties keep
    /// registry order.
    pub fn ranked(&self) -> Vec<&GestureScore> {
        let mut out: Vec<&GestureScore> = self.scores.iter().collect();
        out.sort_by(|a, b| b.best_log().total_cmp(&a.best_log()));
        out
    }

    /// Highest-ranked type that could be scored at all.
    pub fn best(&self) -> Option<GestureType> {
        self.ranked().into_iter().find(|s| s.is_scored()).map(|s| s.gesture)
    }
}

fn fmt_log(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

impl fmt::Display for RecognitionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<34} {:>11} {:>11} {:>10} {:>10}", "gesture", "base", "kmeans", "ln base", "ln kmeans")?;
        for s in self.ranked() {
            writeln!(
                f,
                "{:<34} {:>11.3e} {:>11.3e} {:>10} {:>10}",
                s.gesture.name(),
                s.base,
                s.kmeans,
                fmt_log(s.log_base),
                fmt_log(s.log_kmeans),
            )?;
        }
        Ok(())
    }
}
