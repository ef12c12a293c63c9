//! Continuous-emission hidden Markov model.
//!
//! All recursions run in log space; parameters are stored as plain
//! probabilities. Observation sequences are slices of `DVector`s whose
//! length equals the emission dimension.

use nalgebra::{DMatrix, DVector};
use tracing::trace;

use crate::gaussian::{floor_variance, weighted_moments, Gaussian};
use crate::kmeans::Clustering;

/// Occupancy below this leaves a state's parameters untouched.
const MIN_OCCUPANCY: f64 = 1e-12;

fn log_sum_exp(xs: impl IntoIterator<Item = f64>) -> f64 {
    let xs: Vec<f64> = xs.into_iter().collect();
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + xs.iter().map(|x| (x - max).exp()).sum::<f64>().ln()
}

#[derive(Clone, Debug)]
pub struct GaussianHmm {
    initial:    DVector<f64>,
    transition: DMatrix<f64>,
    states:     Vec<Gaussian>,
}

impl GaussianHmm {
    /// `None` unless `initial` has one entry per state, `transition` is
    /// square over the states, and every emission has the same dimension.
    pub fn new(initial: DVector<f64>, transition: DMatrix<f64>, states: Vec<Gaussian>) -> Option<Self> {
        let n = states.len();
        let width = states.first()?.dim();
        if initial.len() != n || transition.nrows() != n || transition.ncols() != n {
            return None;
        }
        if states.iter().any(|g| g.dim() != width) {
            return None;
        }
        Some(GaussianHmm { initial, transition, states })
    }

    pub fn num_states(&self) -> usize { self.states.len() }
    pub fn width(&self) -> usize { self.states[0].dim() }
    pub fn initial(&self) -> &DVector<f64> { &self.initial }
    pub fn transition(&self) -> &DMatrix<f64> { &self.transition }
    pub fn states(&self) -> &[Gaussian] { &self.states }

    /// First state whose emission mean is not finite.
    pub fn first_degenerate_state(&self) -> Option<usize> {
        self.states.iter().position(|g| g.mean().iter().any(|v| !v.is_finite()))
    }

    // ════════════════════════════════════════════════════════════════════════
    // Seeding from a clustering
    // ════════════════════════════════════════════════════════════════════════

    /// Build a model whose emissions are the clusters' moments and whose
    /// initial/transition probabilities count the label paths (add-one
    /// smoothed). `clustering` must cover the concatenation of `sequences`.
    ///
    /// `Err(state)` names the first cluster that cannot seed a valid
    /// emission.
    pub fn seed(sequences: &[Vec<DVector<f64>>], clustering: &Clustering, variance_floor: f64) -> Result<Self, usize> {
        let n = clustering.k();
        let pooled: Vec<&DVector<f64>> = sequences.iter().flatten().collect();

        let mut states = Vec::with_capacity(n);
        for (state, centroid) in clustering.centroids.iter().enumerate() {
            if centroid.iter().any(|v| !v.is_finite()) {
                return Err(state);
            }
            let members: Vec<DVector<f64>> = pooled
                .iter()
                .zip(&clustering.labels)
                .filter(|(_, l)| **l == state)
                .map(|(p, _)| (*p).clone())
                .collect();
            let weights = vec![1.0; members.len()];
            let (mean, mut cov) = weighted_moments(&members, &weights).ok_or(state)?;
            floor_variance(&mut cov, variance_floor);
            states.push(Gaussian::new(mean, cov).ok_or(state)?);
        }

        let mut initial = DVector::from_element(n, 1.0);
        let mut transition = DMatrix::from_element(n, n, 1.0);
        let mut offset = 0;
        for seq in sequences {
            let path = &clustering.labels[offset..offset + seq.len()];
            offset += seq.len();
            if let Some(first) = path.first() {
                initial[*first] += 1.0;
            }
            for pair in path.windows(2) {
                transition[(pair[0], pair[1])] += 1.0;
            }
        }
        let total = initial.sum();
        initial /= total;
        for mut row in transition.row_iter_mut() {
            let s = row.sum();
            row /= s;
        }

        Ok(GaussianHmm { initial, transition, states })
    }

    // ════════════════════════════════════════════════════════════════════════
    // Recursions
    // ════════════════════════════════════════════════════════════════════════

    fn log_initial(&self) -> Vec<f64> {
        self.initial.iter().map(|p| p.ln()).collect()
    }

    fn log_transition(&self) -> DMatrix<f64> {
        self.transition.map(f64::ln)
    }

    /// `le[t][i]` = log density of observation `t` under state `i`.
    fn log_emissions(&self, obs: &[DVector<f64>]) -> Vec<Vec<f64>> {
        obs.iter()
            .map(|o| self.states.iter().map(|g| g.log_pdf(o)).collect())
            .collect()
    }

    fn forward_le(&self, le: &[Vec<f64>], log_a: &DMatrix<f64>) -> (Vec<Vec<f64>>, f64) {
        let n = self.num_states();
        let log_pi = self.log_initial();
        let mut alpha = vec![vec![f64::NEG_INFINITY; n]; le.len()];
        if le.is_empty() {
            return (alpha, f64::NEG_INFINITY);
        }
        for i in 0..n {
            alpha[0][i] = log_pi[i] + le[0][i];
        }
        for t in 1..le.len() {
            let prev = alpha[t - 1].clone();
            for j in 0..n {
                alpha[t][j] = log_sum_exp((0..n).map(|i| prev[i] + log_a[(i, j)])) + le[t][j];
            }
        }
        let ll = log_sum_exp(alpha[le.len() - 1].iter().copied());
        (alpha, ll)
    }

    fn backward_le(&self, le: &[Vec<f64>], log_a: &DMatrix<f64>) -> Vec<Vec<f64>> {
        let n = self.num_states();
        let len = le.len();
        let mut beta = vec![vec![0.0; n]; len];
        for t in (0..len.saturating_sub(1)).rev() {
            let next = beta[t + 1].clone();
            for i in 0..n {
                beta[t][i] = log_sum_exp((0..n).map(|j| log_a[(i, j)] + le[t + 1][j] + next[j]));
            }
        }
        beta
    }

    /// Log forward variables and the sequence log-likelihood.
    pub fn forward(&self, obs: &[DVector<f64>]) -> (Vec<Vec<f64>>, f64) {
        self.forward_le(&self.log_emissions(obs), &self.log_transition())
    }

    /// Log backward variables.
    pub fn backward(&self, obs: &[DVector<f64>]) -> Vec<Vec<f64>> {
        self.backward_le(&self.log_emissions(obs), &self.log_transition())
    }

    /// log P(O | model), summed over all state paths.
    pub fn log_likelihood(&self, obs: &[DVector<f64>]) -> f64 {
        self.forward(obs).1
    }

    /// Most likely state path and its joint log-probability log P(O, Q*).
    /// `None` for an empty sequence.
    pub fn viterbi(&self, obs: &[DVector<f64>]) -> Option<(Vec<usize>, f64)> {
        if obs.is_empty() {
            return None;
        }
        let n = self.num_states();
        let le = self.log_emissions(obs);
        let log_a = self.log_transition();
        let log_pi = self.log_initial();

        let mut delta: Vec<f64> = (0..n).map(|i| log_pi[i] + le[0][i]).collect();
        let mut psi = vec![vec![0usize; n]; obs.len()];

        for t in 1..obs.len() {
            let mut next = vec![f64::NEG_INFINITY; n];
            for j in 0..n {
                let mut best = 0;
                let mut best_v = f64::NEG_INFINITY;
                for i in 0..n {
                    let v = delta[i] + log_a[(i, j)];
                    if v > best_v {
                        best = i;
                        best_v = v;
                    }
                }
                next[j] = best_v + le[t][j];
                psi[t][j] = best;
            }
            delta = next;
        }

        let (mut state, log_p) = delta
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |acc, (i, v)| if v > acc.1 { (i, v) } else { acc });

        let mut path = vec![0; obs.len()];
        for t in (0..obs.len()).rev() {
            path[t] = state;
            state = psi[t][state];
        }
        Some((path, log_p))
    }

    // ════════════════════════════════════════════════════════════════════════
    // Baum-Welch
    // ════════════════════════════════════════════════════════════════════════

    /// One multi-sequence re-estimation step.
    ///
    /// Returns the updated model and the total log-likelihood of the
    /// sequences under `self`. Sequences the current model finds impossible
    /// are skipped. A state with (near) zero occupancy keeps its emission
    /// and transition row. `Err(state)` names a state whose re-estimated
    /// emission is not a valid Gaussian.
    pub fn baum_welch_step(&self, sequences: &[Vec<DVector<f64>>], variance_floor: f64) -> Result<(Self, f64), usize> {
        let n = self.num_states();
        let log_a = self.log_transition();

        let mut pi_acc = DVector::<f64>::zeros(n);
        let mut xi_acc = DMatrix::<f64>::zeros(n, n);
        let mut from_acc = DVector::<f64>::zeros(n);
        let mut points: Vec<DVector<f64>> = Vec::new();
        let mut weights: Vec<Vec<f64>> = vec![Vec::new(); n];
        let mut total_ll = 0.0;
        let mut used = 0usize;

        for (s, seq) in sequences.iter().enumerate() {
            if seq.is_empty() {
                continue;
            }
            let le = self.log_emissions(seq);
            let (alpha, ll) = self.forward_le(&le, &log_a);
            if !ll.is_finite() {
                trace!(sequence = s, "sequence impossible under current model, skipped");
                continue;
            }
            let beta = self.backward_le(&le, &log_a);
            used += 1;
            total_ll += ll;

            for t in 0..seq.len() {
                for i in 0..n {
                    let g = (alpha[t][i] + beta[t][i] - ll).exp();
                    weights[i].push(g);
                    if t == 0 {
                        pi_acc[i] += g;
                    }
                    if t + 1 < seq.len() {
                        from_acc[i] += g;
                        for j in 0..n {
                            xi_acc[(i, j)] +=
                                (alpha[t][i] + log_a[(i, j)] + le[t + 1][j] + beta[t + 1][j] - ll).exp();
                        }
                    }
                }
                points.push(seq[t].clone());
            }
        }

        if used == 0 {
            return Ok((self.clone(), f64::NEG_INFINITY));
        }

        let mut initial = pi_acc / used as f64;
        let pi_sum = initial.sum();
        if pi_sum > 0.0 {
            initial /= pi_sum;
        } else {
            initial = self.initial.clone();
        }

        let mut transition = self.transition.clone();
        for i in 0..n {
            if from_acc[i] <= MIN_OCCUPANCY {
                continue;
            }
            let row_sum: f64 = (0..n).map(|j| xi_acc[(i, j)]).sum();
            if row_sum > 0.0 {
                for j in 0..n {
                    transition[(i, j)] = xi_acc[(i, j)] / row_sum;
                }
            }
        }

        let mut states = Vec::with_capacity(n);
        for (i, w) in weights.iter().enumerate() {
            let occupancy: f64 = w.iter().sum();
            if occupancy <= MIN_OCCUPANCY {
                states.push(self.states[i].clone());
                continue;
            }
            let (mean, mut cov) = weighted_moments(&points, w).ok_or(i)?;
            floor_variance(&mut cov, variance_floor);
            states.push(Gaussian::new(mean, cov).ok_or(i)?);
        }

        Ok((GaussianHmm { initial, transition, states }, total_ll))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmeans::kmeans;

    fn v(x: f64) -> DVector<f64> {
        DVector::from_vec(vec![x])
    }

    fn two_state() -> GaussianHmm {
        GaussianHmm::new(
            DVector::from_vec(vec![0.9, 0.1]),
            DMatrix::from_row_slice(2, 2, &[0.8, 0.2, 0.1, 0.9]),
            vec![
                Gaussian::new(v(0.0), DMatrix::identity(1, 1)).unwrap(),
                Gaussian::new(v(10.0), DMatrix::identity(1, 1)).unwrap(),
            ],
        )
        .unwrap()
    }

    fn ramp_sequences() -> Vec<Vec<DVector<f64>>> {
        (0..6)
            .map(|s| {
                (0..12)
                    .map(|t| {
                        let base = if t < 4 { 0.0 } else if t < 8 { 5.0 } else { 10.0 };
                        let wobble = ((s * 12 + t) as f64 * 1.7).sin() * 0.4;
                        v(base + wobble)
                    })
                    .collect()
            })
            .collect()
    }

    // ── recursions ────────────────────────────────────────────────────────
    #[test]
    fn viterbi_follows_emissions() {
        let m = two_state();
        let obs: Vec<_> = [0.1, -0.2, 9.8, 10.3, 10.0].iter().map(|x| v(*x)).collect();
        let (path, _) = m.viterbi(&obs).unwrap();
        assert_eq!(path, vec![0, 0, 1, 1, 1]);
    }

    #[test]
    fn viterbi_never_exceeds_forward() {
        let m = two_state();
        let obs: Vec<_> = [0.0, 3.0, 6.0, 9.0].iter().map(|x| v(*x)).collect();
        let (_, best) = m.viterbi(&obs).unwrap();
        let total = m.log_likelihood(&obs);
        assert!(best <= total + 1e-9);
    }

    #[test]
    fn forward_backward_agree() {
        let m = two_state();
        let obs: Vec<_> = [0.5, 1.0, 8.0, 9.5].iter().map(|x| v(*x)).collect();
        let (alpha, ll) = m.forward(&obs);
        let beta = m.backward(&obs);
        for t in 0..obs.len() {
            let lt = log_sum_exp((0..2).map(|i| alpha[t][i] + beta[t][i]));
            assert!((lt - ll).abs() < 1e-9, "t={t}: {lt} vs {ll}");
        }
    }

    #[test]
    fn empty_sequence_has_no_path() {
        assert!(two_state().viterbi(&[]).is_none());
    }

    // ── seeding / re-estimation ───────────────────────────────────────────
    #[test]
    fn seed_counts_label_paths() {
        let seqs = ramp_sequences();
        let pooled: Vec<_> = seqs.iter().flatten().cloned().collect();
        let c = kmeans(&pooled, 3, 50).unwrap();
        let m = GaussianHmm::seed(&seqs, &c, 1e-2).unwrap();

        assert_eq!(m.num_states(), 3);
        assert!((m.initial().sum() - 1.0).abs() < 1e-12);
        for row in m.transition().row_iter() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        // Every sequence starts in the low cluster.
        let start = c.labels[0];
        assert!(m.initial()[start] > 0.5);
    }

    #[test]
    fn baum_welch_does_not_lower_likelihood() {
        let seqs = ramp_sequences();
        let pooled: Vec<_> = seqs.iter().flatten().cloned().collect();
        let c = kmeans(&pooled, 3, 50).unwrap();
        let mut m = GaussianHmm::seed(&seqs, &c, 1e-6).unwrap();

        let mut prev = f64::NEG_INFINITY;
        for _ in 0..10 {
            let (next, ll) = m.baum_welch_step(&seqs, 1e-6).unwrap();
            assert!(ll >= prev - 1e-6 * prev.abs().max(1.0), "{ll} < {prev}");
            prev = ll;
            m = next;
        }
        assert!(m.first_degenerate_state().is_none());
    }

    #[test]
    fn seeding_fails_on_empty_cluster() {
        let seqs = vec![vec![v(2.0); 6]];
        let c = kmeans(&seqs[0], 3, 50).unwrap();
        assert_eq!(GaussianHmm::seed(&seqs, &c, 1e-2).unwrap_err(), 1);
    }
}
