//! Univariate Gaussian emission density

use crate::domain::errors::ModelError;
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

/// Emission distribution of a single hidden state.
#[derive(Debug, Clone, Copy)]
pub struct GaussianEmission {
    mean: f64,
    variance: f64,
    density: Normal,
}

impl GaussianEmission {
    pub fn new(mean: f64, variance: f64) -> Result<Self, ModelError> {
        let density = Normal::new(mean, variance.sqrt()).map_err(|e| ModelError::Numerical {
            reason: format!("invalid Gaussian N({}, {}): {}", mean, variance, e),
        })?;
        Ok(Self {
            mean,
            variance,
            density,
        })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }

    pub fn log_pdf(&self, x: f64) -> f64 {
        self.density.ln_pdf(x)
    }

    /// Quantile function, used to draw samples from a uniform variate.
    pub fn quantile(&self, p: f64) -> f64 {
        self.density.inverse_cdf(p)
    }
}
