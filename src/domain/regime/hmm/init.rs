//! Deterministic parameter initialization for EM

use super::gaussian::GaussianEmission;
use super::params::HmmParameters;
use crate::domain::errors::ModelError;
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::rngs::StdRng;

const KMEANS_ITERATIONS: usize = 10;

/// Build starting parameters from the observations.
///
/// Means come from a 1-D k-means seeded at evenly spaced quantiles (with a
/// small seeded jitter), every state starts from the pooled variance, the
/// initial distribution is uniform and the transition matrix is
/// diagonal-dominant.
pub fn initial_parameters(
    observations: &[f64],
    n_states: usize,
    pooled_variance: f64,
    rng: &mut StdRng,
) -> Result<HmmParameters, ModelError> {
    let centers = kmeans_centers(observations, n_states, pooled_variance.sqrt(), rng);

    let emissions = centers
        .iter()
        .map(|&mean| GaussianEmission::new(mean, pooled_variance))
        .collect::<Result<Vec<_>, _>>()?;

    let mut transition_matrix = Array2::zeros((n_states, n_states));
    for i in 0..n_states {
        for j in 0..n_states {
            transition_matrix[[i, j]] = if i == j {
                0.8 + rng.random::<f64>() * 0.15
            } else {
                0.01 + rng.random::<f64>() * 0.1
            };
        }
        let row_sum: f64 = transition_matrix.row(i).sum();
        for j in 0..n_states {
            transition_matrix[[i, j]] /= row_sum;
        }
    }

    Ok(HmmParameters {
        initial_probs: Array1::from_elem(n_states, 1.0 / n_states as f64),
        transition_matrix,
        emissions,
    })
}

/// Lloyd's algorithm on scalars, returning centers in ascending order.
fn kmeans_centers(observations: &[f64], k: usize, spread: f64, rng: &mut StdRng) -> Vec<f64> {
    let mut sorted = observations.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();

    let mut centers: Vec<f64> = (0..k)
        .map(|j| {
            let q = (j as f64 + 0.5) / k as f64;
            let idx = ((q * n as f64) as usize).min(n - 1);
            sorted[idx] + (rng.random::<f64>() - 0.5) * 0.01 * spread
        })
        .collect();

    for _ in 0..KMEANS_ITERATIONS {
        let mut sums = vec![0.0; k];
        let mut counts = vec![0usize; k];
        for &x in &sorted {
            let nearest = nearest_center(&centers, x);
            sums[nearest] += x;
            counts[nearest] += 1;
        }
        for j in 0..k {
            // Empty clusters keep their previous center
            if counts[j] > 0 {
                centers[j] = sums[j] / counts[j] as f64;
            }
        }
    }

    centers.sort_by(|a, b| a.total_cmp(b));
    centers
}

fn nearest_center(centers: &[f64], x: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::MAX;
    for (j, c) in centers.iter().enumerate() {
        let dist = (x - c).abs();
        if dist < best_dist {
            best_dist = dist;
            best = j;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_initial_parameters_are_valid_and_seeded() {
        let obs: Vec<f64> = (0..90)
            .map(|i| match i % 3 {
                0 => -0.02 + (i as f64) * 1e-5,
                1 => 0.0 + (i as f64) * 1e-5,
                _ => 0.02 + (i as f64) * 1e-5,
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(7);
        let params = initial_parameters(&obs, 3, 2.7e-4, &mut rng).unwrap();
        assert_eq!(params.n_states(), 3);
        for row in params.transition_matrix.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        let means = params.means();
        assert!(means[0] < -0.015 && means[2] > 0.015);
        assert!(means[1].abs() < 0.005);

        let mut rng_again = StdRng::seed_from_u64(7);
        let again = initial_parameters(&obs, 3, 2.7e-4, &mut rng_again).unwrap();
        assert_eq!(params.transition_matrix, again.transition_matrix);
        assert_eq!(params.means(), again.means());
    }
}
