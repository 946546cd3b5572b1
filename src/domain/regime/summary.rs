use super::model::{CovarianceMode, RegimeModel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Per-state Gaussian parameters plus shape statistics of synthetic draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSummary {
    pub state: usize,
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
    /// Skewness of samples drawn from the state's Gaussian
    pub sample_skewness: f64,
    /// Excess kurtosis of samples drawn from the state's Gaussian
    pub sample_kurtosis: f64,
}

/// Exported description of a fitted regime model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub n_states: usize,
    pub covariance_mode: CovarianceMode,
    pub states: Vec<StateSummary>,
    pub transition_matrix: Vec<Vec<f64>>,
    pub initial_probs: Vec<f64>,
    pub train_log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    pub free_parameters: usize,
    pub iterations: usize,
    pub converged: bool,
}

impl RegimeModel {
    /// Summarize the model, drawing `samples` synthetic observations per state.
    pub fn summary(&self, samples: usize, seed: u64) -> ModelSummary {
        let fitted = self.fitted();
        let mut rng = StdRng::seed_from_u64(seed);

        let states = fitted
            .parameters
            .emissions
            .iter()
            .enumerate()
            .map(|(state, emission)| {
                let draws: Vec<f64> = (0..samples)
                    .map(|_| {
                        let u: f64 = rng.random_range(f64::EPSILON..1.0);
                        emission.quantile(u)
                    })
                    .collect();
                let (sample_skewness, sample_kurtosis) = shape_statistics(&draws);
                StateSummary {
                    state,
                    mean: emission.mean(),
                    variance: emission.variance(),
                    std_dev: emission.std_dev(),
                    sample_skewness,
                    sample_kurtosis,
                }
            })
            .collect();

        ModelSummary {
            n_states: fitted.n_states(),
            covariance_mode: fitted.covariance_mode,
            states,
            transition_matrix: fitted
                .transition_matrix()
                .rows()
                .into_iter()
                .map(|row| row.to_vec())
                .collect(),
            initial_probs: fitted.parameters.initial_probs.to_vec(),
            train_log_likelihood: fitted.log_likelihood,
            aic: fitted.criteria.aic,
            bic: fitted.criteria.bic,
            free_parameters: fitted.criteria.free_parameters,
            iterations: fitted.iterations,
            converged: fitted.converged,
        }
    }
}

/// Population skewness and excess kurtosis; zeros for fewer than 2 points
/// or zero spread.
pub fn shape_statistics(values: &[f64]) -> (f64, f64) {
    if values.len() < 2 {
        return (0.0, 0.0);
    }
    let mean = values.mean();
    let m2 = values.iter().map(|x| (x - mean).powi(2)).mean();
    if m2 <= 0.0 {
        return (0.0, 0.0);
    }
    let m3 = values.iter().map(|x| (x - mean).powi(3)).mean();
    let m4 = values.iter().map(|x| (x - mean).powi(4)).mean();
    (m3 / m2.powf(1.5), m4 / (m2 * m2) - 3.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::regime::model::FitOptions;

    #[test]
    fn test_shape_statistics_symmetric() {
        let (skew, kurt) = shape_statistics(&[-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert!(skew.abs() < 1e-12);
        // Uniform-like sample is platykurtic
        assert!(kurt < 0.0);
        assert_eq!(shape_statistics(&[1.0, 1.0, 1.0]), (0.0, 0.0));
    }

    #[test]
    fn test_shape_statistics_right_skew() {
        let (skew, _) = shape_statistics(&[0.0, 0.0, 0.0, 0.0, 10.0]);
        assert!(skew > 1.0);
    }

    #[test]
    fn test_model_summary_gaussian_shapes() {
        let obs: Vec<f64> = (0..200)
            .map(|i| {
                let wobble = ((i * 37) % 11) as f64 * 1e-4;
                if (i / 20) % 2 == 0 { -0.01 + wobble } else { 0.01 + wobble }
            })
            .collect();
        let model = RegimeModel::fit(&obs, 2, CovarianceMode::Full, &FitOptions::default()).unwrap();
        let summary = model.summary(20_000, 1);

        assert_eq!(summary.n_states, 2);
        assert_eq!(summary.states.len(), 2);
        assert_eq!(summary.transition_matrix.len(), 2);
        for state in &summary.states {
            assert!(state.sample_skewness.abs() < 0.1);
            assert!(state.sample_kurtosis.abs() < 0.2);
            assert!((state.std_dev.powi(2) - state.variance).abs() < 1e-15);
        }
        assert_eq!(summary, model.summary(20_000, 1));
    }
}
