use super::hmm::algorithms::{baum_welch_step, forward, viterbi};
use super::hmm::init::initial_parameters;
use super::hmm::HmmParameters;
use crate::domain::errors::ModelError;
use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Observation dimension for return data.
const N_FEATURES: usize = 1;

/// Covariance parameterization of the emission densities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CovarianceMode {
    #[default]
    Full,
    #[serde(alias = "diag")]
    Diagonal,
}

impl CovarianceMode {
    /// Free covariance parameters across `n_states` states of dimension `d`.
    pub fn covariance_parameters(&self, n_states: usize, d: usize) -> usize {
        match self {
            CovarianceMode::Full => n_states * d * (d + 1) / 2,
            CovarianceMode::Diagonal => n_states * d,
        }
    }

    /// Total free parameters: transitions, initial distribution, means, covariances.
    pub fn free_parameters(&self, n_states: usize, d: usize) -> usize {
        n_states * (n_states - 1)
            + (n_states - 1)
            + n_states * d
            + self.covariance_parameters(n_states, d)
    }
}

impl fmt::Display for CovarianceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CovarianceMode::Full => write!(f, "full"),
            CovarianceMode::Diagonal => write!(f, "diag"),
        }
    }
}

impl FromStr for CovarianceMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(CovarianceMode::Full),
            "diag" | "diagonal" | "spherical" => Ok(CovarianceMode::Diagonal),
            _ => anyhow::bail!("Invalid covariance mode: {}. Must be 'full' or 'diag'", s),
        }
    }
}

/// EM settings. The seed only drives initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub variance_floor: f64,
    pub seed: u64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-4,
            variance_floor: 1e-10,
            seed: 42,
        }
    }
}

/// Penalized-likelihood model selection scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InformationCriteria {
    pub aic: f64,
    pub bic: f64,
    pub free_parameters: usize,
}

impl InformationCriteria {
    pub fn compute(log_likelihood: f64, free_parameters: usize, n_observations: usize) -> Self {
        let p = free_parameters as f64;
        Self {
            aic: 2.0 * p - 2.0 * log_likelihood,
            bic: (n_observations as f64).ln() * p - 2.0 * log_likelihood,
            free_parameters,
        }
    }
}

/// Parameters and fit diagnostics of a trained model. Immutable after fit.
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub parameters: HmmParameters,
    pub covariance_mode: CovarianceMode,
    /// Log-likelihood of the training observations
    pub log_likelihood: f64,
    pub n_observations: usize,
    pub iterations: usize,
    /// False when EM hit the iteration cap before the tolerance was met
    pub converged: bool,
    pub criteria: InformationCriteria,
}

impl FittedModel {
    pub fn n_states(&self) -> usize {
        self.parameters.n_states()
    }

    pub fn means(&self) -> Vec<f64> {
        self.parameters.means()
    }

    pub fn variances(&self) -> Vec<f64> {
        self.parameters.variances()
    }

    pub fn transition_matrix(&self) -> &Array2<f64> {
        &self.parameters.transition_matrix
    }
}

/// Gaussian HMM regime model trained on the training slice of a return series.
#[derive(Debug, Clone)]
pub struct RegimeModel {
    fitted: FittedModel,
}

impl RegimeModel {
    /// Fit a `n_states` Gaussian HMM with Baum-Welch.
    ///
    /// Runs until successive log-likelihoods differ by less than
    /// `options.tolerance` or `options.max_iterations` is reached. Hitting the
    /// cap is not an error: the best parameters found are kept and
    /// `FittedModel::converged` is false.
    pub fn fit(
        train: &[f64],
        n_states: usize,
        covariance_mode: CovarianceMode,
        options: &FitOptions,
    ) -> Result<Self, ModelError> {
        if n_states < 2 {
            return Err(ModelError::InvalidStateCount(n_states));
        }
        if train.is_empty() {
            return Err(ModelError::EmptyObservations);
        }
        let free_parameters = covariance_mode.free_parameters(n_states, N_FEATURES);
        if train.len() < free_parameters {
            return Err(ModelError::InsufficientData {
                observations: train.len(),
                parameters: free_parameters,
            });
        }
        if let Some(bad) = train.iter().find(|x| !x.is_finite()) {
            return Err(ModelError::Numerical {
                reason: format!("non-finite observation {}", bad),
            });
        }

        let pooled_variance = train.population_variance();
        if !(pooled_variance >= options.variance_floor) {
            return Err(ModelError::DegenerateFit {
                scope: "training sample".to_string(),
                variance: pooled_variance,
                floor: options.variance_floor,
            });
        }

        let mut rng = StdRng::seed_from_u64(options.seed);
        let mut params = initial_parameters(train, n_states, pooled_variance, &mut rng)?;

        let mut best: Option<(f64, HmmParameters)> = None;
        let mut prev_ll = f64::NEG_INFINITY;
        let mut converged = false;
        let mut iterations = 0;

        for iter in 0..options.max_iterations {
            let update = baum_welch_step(train, &params, options.variance_floor)?;
            iterations = iter + 1;

            if best.as_ref().is_none_or(|(ll, _)| update.log_likelihood > *ll) {
                best = Some((update.log_likelihood, params.clone()));
            }

            let improvement = update.log_likelihood - prev_ll;
            params = update.parameters;

            if improvement.abs() < options.tolerance {
                converged = true;
                debug!("EM converged after {} iterations", iterations);
                break;
            }
            prev_ll = update.log_likelihood;

            if iterations % 50 == 0 {
                debug!(
                    "EM iteration {}: log-likelihood = {:.4}",
                    iterations, update.log_likelihood
                );
            }
        }

        // Keep the final M-step unless it scored worse than an earlier iterate
        let mut log_likelihood = score_parameters(train, &params);
        if let Some((best_ll, best_params)) = best {
            if !(log_likelihood >= best_ll) {
                params = best_params;
                log_likelihood = best_ll;
            }
        }

        if !converged {
            warn!(
                "EM did not converge within {} iterations (tolerance {:e}); keeping best parameters",
                options.max_iterations, options.tolerance
            );
        }

        let criteria = InformationCriteria::compute(log_likelihood, free_parameters, train.len());
        info!(
            "Fitted {}-state HMM on {} observations: logL={:.2} AIC={:.2} BIC={:.2}",
            n_states,
            train.len(),
            log_likelihood,
            criteria.aic,
            criteria.bic
        );

        Ok(Self {
            fitted: FittedModel {
                parameters: params,
                covariance_mode,
                log_likelihood,
                n_observations: train.len(),
                iterations,
                converged,
                criteria,
            },
        })
    }

    pub fn fitted(&self) -> &FittedModel {
        &self.fitted
    }

    /// Total log-likelihood of `returns` under the fitted model.
    pub fn score(&self, returns: &[f64]) -> Result<f64, ModelError> {
        if returns.is_empty() {
            return Err(ModelError::EmptyObservations);
        }
        Ok(score_parameters(returns, &self.fitted.parameters))
    }

    /// Most likely hidden-state path for `returns` (Viterbi).
    pub fn decode(&self, returns: &[f64]) -> Result<Vec<usize>, ModelError> {
        if returns.is_empty() {
            return Err(ModelError::EmptyObservations);
        }
        let params = &self.fitted.parameters;
        let log_b = params.emission_log_likelihoods(returns);
        let (path, log_prob) = viterbi(&log_b, &params.log_initial(), &params.log_transition());
        if !log_prob.is_finite() {
            return Err(ModelError::Numerical {
                reason: format!("Viterbi path log probability is {}", log_prob),
            });
        }
        Ok(path)
    }

    /// AIC/BIC of the training fit.
    pub fn information_criteria(&self) -> InformationCriteria {
        self.fitted.criteria
    }
}

fn score_parameters(observations: &[f64], params: &HmmParameters) -> f64 {
    let log_b = params.emission_log_likelihoods(observations);
    forward(&log_b, &params.log_initial(), &params.log_transition()).1
}
