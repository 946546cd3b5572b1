//! HMM algorithms in log space: Forward-Backward, Viterbi, Baum-Welch

use super::gaussian::GaussianEmission;
use super::params::HmmParameters;
use crate::domain::errors::ModelError;
use ndarray::{Array1, Array2};

/// Posterior mass below which a state is considered empty.
const MIN_POSTERIOR_MASS: f64 = 1e-10;

/// Numerically stable `ln(sum(exp(v)))`.
pub(crate) fn log_sum_exp<I>(values: I) -> f64
where
    I: Iterator<Item = f64> + Clone,
{
    let max = values.clone().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Forward pass.
///
/// # Arguments
/// * `log_b` - Emission log-likelihoods (T x N)
/// * `log_pi` - Log initial state probabilities (N)
/// * `log_a` - Log transition matrix (N x N)
///
/// # Returns
/// Log forward variables (T x N) and log P(observations | model)
pub fn forward(
    log_b: &Array2<f64>,
    log_pi: &Array1<f64>,
    log_a: &Array2<f64>,
) -> (Array2<f64>, f64) {
    let (t_len, n) = log_b.dim();
    let mut log_alpha = Array2::from_elem((t_len, n), f64::NEG_INFINITY);
    if t_len == 0 {
        return (log_alpha, 0.0);
    }

    for j in 0..n {
        log_alpha[[0, j]] = log_pi[j] + log_b[[0, j]];
    }

    for t in 1..t_len {
        for j in 0..n {
            let incoming = log_sum_exp((0..n).map(|i| log_alpha[[t - 1, i]] + log_a[[i, j]]));
            log_alpha[[t, j]] = incoming + log_b[[t, j]];
        }
    }

    let log_likelihood = log_sum_exp((0..n).map(|j| log_alpha[[t_len - 1, j]]));
    (log_alpha, log_likelihood)
}

/// Backward pass, returning log backward variables (T x N).
pub fn backward(log_b: &Array2<f64>, log_a: &Array2<f64>) -> Array2<f64> {
    let (t_len, n) = log_b.dim();
    // ln(1) on the last row
    let mut log_beta = Array2::zeros((t_len, n));

    for t in (0..t_len.saturating_sub(1)).rev() {
        for i in 0..n {
            log_beta[[t, i]] = log_sum_exp(
                (0..n).map(|j| log_a[[i, j]] + log_b[[t + 1, j]] + log_beta[[t + 1, j]]),
            );
        }
    }

    log_beta
}

/// Posterior state probabilities P(z_t = k | observations) (T x N).
pub fn posteriors(log_alpha: &Array2<f64>, log_beta: &Array2<f64>, log_likelihood: f64) -> Array2<f64> {
    let mut gamma = (log_alpha + log_beta).mapv(|v| (v - log_likelihood).exp());
    for mut row in gamma.rows_mut() {
        let sum = row.sum();
        if sum > 0.0 {
            row /= sum;
        }
    }
    gamma
}

/// Viterbi algorithm - finds the single most likely state sequence.
///
/// Max-product accumulation with back-pointers, terminal arg-max, then
/// backtracking. Ties resolve to the lowest state index.
///
/// # Returns
/// Most likely state path and its joint log probability
pub fn viterbi(
    log_b: &Array2<f64>,
    log_pi: &Array1<f64>,
    log_a: &Array2<f64>,
) -> (Vec<usize>, f64) {
    let (t_len, n) = log_b.dim();
    if t_len == 0 {
        return (vec![], 0.0);
    }

    // Delta: best path log probability ending in state j at time t
    let mut delta = Array2::from_elem((t_len, n), f64::NEG_INFINITY);
    // Psi: back-pointers
    let mut psi = Array2::<usize>::zeros((t_len, n));

    for j in 0..n {
        delta[[0, j]] = log_pi[j] + log_b[[0, j]];
    }

    for t in 1..t_len {
        for j in 0..n {
            let mut best_val = f64::NEG_INFINITY;
            let mut best_state = 0;
            for i in 0..n {
                let val = delta[[t - 1, i]] + log_a[[i, j]];
                if val > best_val {
                    best_val = val;
                    best_state = i;
                }
            }
            delta[[t, j]] = best_val + log_b[[t, j]];
            psi[[t, j]] = best_state;
        }
    }

    let mut best_final_state = 0;
    let mut best_final = f64::NEG_INFINITY;
    for j in 0..n {
        if delta[[t_len - 1, j]] > best_final {
            best_final = delta[[t_len - 1, j]];
            best_final_state = j;
        }
    }

    let mut path = vec![0; t_len];
    path[t_len - 1] = best_final_state;
    for t in (0..t_len - 1).rev() {
        path[t] = psi[[t + 1, path[t + 1]]];
    }

    (path, best_final)
}

/// Result of one EM iteration.
#[derive(Debug, Clone)]
pub struct EmUpdate {
    /// Re-estimated parameters
    pub parameters: HmmParameters,
    /// Log-likelihood of the observations under the *input* parameters
    pub log_likelihood: f64,
}

/// Single Baum-Welch (EM) step over scalar observations.
///
/// Fails with `DegenerateFit` when a state ends up with no posterior mass or a
/// variance below `variance_floor`.
pub fn baum_welch_step(
    observations: &[f64],
    params: &HmmParameters,
    variance_floor: f64,
) -> Result<EmUpdate, ModelError> {
    let t_len = observations.len();
    let n = params.n_states();
    if t_len < 2 {
        return Err(ModelError::EmptyObservations);
    }

    // E-step
    let log_b = params.emission_log_likelihoods(observations);
    let log_pi = params.log_initial();
    let log_a = params.log_transition();
    let (log_alpha, log_likelihood) = forward(&log_b, &log_pi, &log_a);
    if !log_likelihood.is_finite() {
        return Err(ModelError::Numerical {
            reason: format!("log-likelihood is {}", log_likelihood),
        });
    }
    let log_beta = backward(&log_b, &log_a);
    let gamma = posteriors(&log_alpha, &log_beta, log_likelihood);

    // Expected transition counts: sum_t P(z_t = i, z_{t+1} = j | observations)
    let mut xi_sum = Array2::<f64>::zeros((n, n));
    for t in 0..t_len - 1 {
        for i in 0..n {
            for j in 0..n {
                xi_sum[[i, j]] += (log_alpha[[t, i]]
                    + log_a[[i, j]]
                    + log_b[[t + 1, j]]
                    + log_beta[[t + 1, j]]
                    - log_likelihood)
                    .exp();
            }
        }
    }

    // M-step
    let mut initial_probs = gamma.row(0).to_owned();
    let initial_sum = initial_probs.sum();
    initial_probs /= initial_sum;

    let mut transition_matrix = params.transition_matrix.clone();
    for i in 0..n {
        let row_sum = xi_sum.row(i).sum();
        // Keep the previous row if the state is never left or entered
        if row_sum > MIN_POSTERIOR_MASS {
            for j in 0..n {
                transition_matrix[[i, j]] = xi_sum[[i, j]] / row_sum;
            }
        }
    }

    let emissions = (0..n)
        .map(|k| {
            let weights = gamma.column(k);
            let mass = weights.sum();
            if mass < MIN_POSTERIOR_MASS {
                return Err(ModelError::DegenerateFit {
                    scope: format!("state {} has no posterior mass", k),
                    variance: 0.0,
                    floor: variance_floor,
                });
            }
            let mean = weights
                .iter()
                .zip(observations)
                .map(|(w, x)| w * x)
                .sum::<f64>()
                / mass;
            let variance = weights
                .iter()
                .zip(observations)
                .map(|(w, x)| w * (x - mean).powi(2))
                .sum::<f64>()
                / mass;
            // NaN fails this comparison too
            if !(variance >= variance_floor) {
                return Err(ModelError::DegenerateFit {
                    scope: format!("state {}", k),
                    variance,
                    floor: variance_floor,
                });
            }
            GaussianEmission::new(mean, variance)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(EmUpdate {
        parameters: HmmParameters {
            initial_probs,
            transition_matrix,
            emissions,
        },
        log_likelihood,
    })
}

/// Total log-likelihood of `observations` under `params`.
pub fn log_likelihood(observations: &[f64], params: &HmmParameters) -> f64 {
    let log_b = params.emission_log_likelihoods(observations);
    forward(&log_b, &params.log_initial(), &params.log_transition()).1
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_test_hmm() -> HmmParameters {
        HmmParameters {
            initial_probs: array![0.6, 0.4],
            transition_matrix: array![[0.7, 0.3], [0.4, 0.6]],
            emissions: vec![
                GaussianEmission::new(0.0, 1.0).unwrap(),
                GaussianEmission::new(3.0, 1.0).unwrap(),
            ],
        }
    }

    /// Enumerate every path: (log-sum over paths, best path, best log prob).
    fn brute_force(observations: &[f64], params: &HmmParameters) -> (f64, Vec<usize>, f64) {
        let n = params.n_states();
        let t_len = observations.len();
        let log_b = params.emission_log_likelihoods(observations);
        let log_pi = params.log_initial();
        let log_a = params.log_transition();

        let mut all = Vec::new();
        let mut best = (vec![], f64::NEG_INFINITY);
        for code in 0..n.pow(t_len as u32) {
            let path: Vec<usize> = (0..t_len).map(|t| (code / n.pow(t as u32)) % n).collect();
            let mut lp = log_pi[path[0]] + log_b[[0, path[0]]];
            for t in 1..t_len {
                lp += log_a[[path[t - 1], path[t]]] + log_b[[t, path[t]]];
            }
            all.push(lp);
            if lp > best.1 {
                best = (path, lp);
            }
        }
        (log_sum_exp(all.iter().copied()), best.0, best.1)
    }

    #[test]
    fn test_forward_matches_enumeration() {
        let params = create_test_hmm();
        let obs = [0.1, 2.9, 3.2, -0.4];
        let (expected_ll, _, _) = brute_force(&obs, &params);
        assert!((log_likelihood(&obs, &params) - expected_ll).abs() < 1e-9);
    }

    #[test]
    fn test_viterbi_matches_enumeration() {
        let params = create_test_hmm();
        let obs = [0.1, 1.6, 3.2, 1.4, -0.2];
        let (_, expected_path, expected_lp) = brute_force(&obs, &params);

        let log_b = params.emission_log_likelihoods(&obs);
        let (path, lp) = viterbi(&log_b, &params.log_initial(), &params.log_transition());
        assert_eq!(path, expected_path);
        assert!((lp - expected_lp).abs() < 1e-9);
    }

    #[test]
    fn test_viterbi_empty() {
        let params = create_test_hmm();
        let log_b = params.emission_log_likelihoods(&[]);
        let (path, _) = viterbi(&log_b, &params.log_initial(), &params.log_transition());
        assert!(path.is_empty());
    }

    #[test]
    fn test_posteriors_sum_to_one() {
        let params = create_test_hmm();
        let obs = [0.3, 2.5, 2.8, 0.1];
        let log_b = params.emission_log_likelihoods(&obs);
        let log_a = params.log_transition();
        let (alpha, ll) = forward(&log_b, &params.log_initial(), &log_a);
        let beta = backward(&log_b, &log_a);
        let gamma = posteriors(&alpha, &beta, ll);
        for row in gamma.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        // Observation near 3.0 should favour state 1
        assert!(gamma[[1, 1]] > 0.9);
    }

    #[test]
    fn test_baum_welch_step_improves_likelihood() {
        let params = create_test_hmm();
        let obs = [0.2, -0.5, 0.4, 3.1, 2.7, 3.4, 0.1, -0.2, 2.9, 3.3, 0.0, 0.5];
        let before = log_likelihood(&obs, &params);

        let update = baum_welch_step(&obs, &params, 1e-10).unwrap();
        assert!((update.log_likelihood - before).abs() < 1e-9);

        let after = log_likelihood(&obs, &update.parameters);
        assert!(after >= before - 1e-9);

        for row in update.parameters.transition_matrix.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        assert!((update.parameters.initial_probs.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_baum_welch_step_reports_collapsed_state() {
        // State 1 sits far away from every observation and loses all its mass
        let params = HmmParameters {
            initial_probs: array![0.5, 0.5],
            transition_matrix: array![[0.5, 0.5], [0.5, 0.5]],
            emissions: vec![
                GaussianEmission::new(0.0, 1.0).unwrap(),
                GaussianEmission::new(1e6, 1.0).unwrap(),
            ],
        };
        let obs = [0.1, -0.1, 0.2, 0.0];
        let err = baum_welch_step(&obs, &params, 1e-10).unwrap_err();
        assert!(matches!(err, ModelError::DegenerateFit { .. }));
    }
}
