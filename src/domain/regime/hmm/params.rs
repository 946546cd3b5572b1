use super::gaussian::GaussianEmission;
use ndarray::{Array1, Array2};

/// Parameters of a Gaussian HMM over scalar observations.
#[derive(Debug, Clone)]
pub struct HmmParameters {
    /// Initial state distribution (K)
    pub initial_probs: Array1<f64>,
    /// Row-stochastic state transition matrix (K x K)
    pub transition_matrix: Array2<f64>,
    /// One emission density per state
    pub emissions: Vec<GaussianEmission>,
}

impl HmmParameters {
    pub fn n_states(&self) -> usize {
        self.initial_probs.len()
    }

    pub fn means(&self) -> Vec<f64> {
        self.emissions.iter().map(|e| e.mean()).collect()
    }

    pub fn variances(&self) -> Vec<f64> {
        self.emissions.iter().map(|e| e.variance()).collect()
    }

    pub(crate) fn log_initial(&self) -> Array1<f64> {
        self.initial_probs.mapv(safe_ln)
    }

    pub(crate) fn log_transition(&self) -> Array2<f64> {
        self.transition_matrix.mapv(safe_ln)
    }

    /// Per-observation emission log-likelihoods (T x K).
    pub(crate) fn emission_log_likelihoods(&self, observations: &[f64]) -> Array2<f64> {
        Array2::from_shape_fn((observations.len(), self.n_states()), |(t, k)| {
            self.emissions[k].log_pdf(observations[t])
        })
    }
}

/// `ln(p)` with exact zeros mapped to `-inf` rather than NaN-producing noise.
fn safe_ln(p: f64) -> f64 {
    if p > 0.0 { p.ln() } else { f64::NEG_INFINITY }
}
