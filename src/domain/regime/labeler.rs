use super::model::FittedModel;
use crate::domain::errors::LabelingError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Number of states the labeling scheme is defined for.
pub const SUPPORTED_STATES: usize = 3;

/// Semantic regime label, ordered by mean return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticLabel {
    Bearish,
    Neutral,
    Bullish,
}

impl SemanticLabel {
    pub const ALL: [SemanticLabel; 3] = [
        SemanticLabel::Bearish,
        SemanticLabel::Neutral,
        SemanticLabel::Bullish,
    ];
}

impl fmt::Display for SemanticLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticLabel::Bearish => write!(f, "bearish"),
            SemanticLabel::Neutral => write!(f, "neutral"),
            SemanticLabel::Bullish => write!(f, "bullish"),
        }
    }
}

/// Test-period return row with its Viterbi state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecodedRow {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub log_return: f64,
    pub state: usize,
}

/// Decoded row with its semantic label, as exported for charting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledRow {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub log_return: f64,
    pub state: usize,
    pub label: SemanticLabel,
}

/// Total mapping from the three state indices to semantic labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMapping {
    labels: [SemanticLabel; SUPPORTED_STATES],
}

impl LabelMapping {
    /// Build from an ascending ranking of state indices.
    fn from_ranking([low, mid, high]: [usize; SUPPORTED_STATES]) -> Self {
        let mut labels = [SemanticLabel::Neutral; SUPPORTED_STATES];
        labels[low] = SemanticLabel::Bearish;
        labels[mid] = SemanticLabel::Neutral;
        labels[high] = SemanticLabel::Bullish;
        Self { labels }
    }

    pub fn label_for(&self, state: usize) -> Option<SemanticLabel> {
        self.labels.get(state).copied()
    }

    pub fn state_for(&self, label: SemanticLabel) -> Option<usize> {
        self.labels.iter().position(|l| *l == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, SemanticLabel)> + '_ {
        self.labels.iter().copied().enumerate()
    }
}

impl fmt::Display for LabelMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(state, label)| format!("{}={}", state, label))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Realized mean log-return per label; `None` when no row carries the label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelMeans {
    pub bearish: Option<f64>,
    pub neutral: Option<f64>,
    pub bullish: Option<f64>,
}

impl fmt::Display for LabelMeans {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |m: Option<f64>| m.map_or_else(|| "n/a".to_string(), |v| format!("{:.6}", v));
        write!(
            f,
            "bearish={} neutral={} bullish={}",
            show(self.bearish),
            show(self.neutral),
            show(self.bullish)
        )
    }
}

/// Assigns semantic labels to decoded states by realized mean return.
#[derive(Debug, Clone, Copy)]
pub struct RegimeLabeler {
    _private: (),
}

impl RegimeLabeler {
    /// Only 3-state models can be labeled.
    pub fn new(n_states: usize) -> Result<Self, LabelingError> {
        if n_states != SUPPORTED_STATES {
            return Err(LabelingError::UnsupportedStateCount { n_states });
        }
        Ok(Self { _private: () })
    }

    /// Rank states by the mean realized log-return of the rows decoded into
    /// them: lowest is bearish, highest bullish, the remaining one neutral.
    ///
    /// A state that no row was decoded into falls back to its fitted mean.
    /// Exactly equal means are ordered by state index, so the mapping stays
    /// a bijection; `verify` then rejects it because the two tied labels are
    /// not strictly ordered.
    pub fn assign(
        &self,
        rows: &[DecodedRow],
        model: &FittedModel,
    ) -> Result<LabelMapping, LabelingError> {
        if model.n_states() != SUPPORTED_STATES {
            return Err(LabelingError::UnsupportedStateCount {
                n_states: model.n_states(),
            });
        }
        if rows.is_empty() {
            return Err(LabelingError::EmptyDecoding);
        }

        let mut sums = [0.0; SUPPORTED_STATES];
        let mut counts = [0usize; SUPPORTED_STATES];
        for row in rows {
            if row.state >= SUPPORTED_STATES {
                return Err(LabelingError::StateOutOfRange {
                    state: row.state,
                    n_states: SUPPORTED_STATES,
                });
            }
            sums[row.state] += row.log_return;
            counts[row.state] += 1;
        }

        let fitted_means = model.means();
        let realized: [f64; SUPPORTED_STATES] = std::array::from_fn(|k| {
            if counts[k] > 0 {
                sums[k] / counts[k] as f64
            } else {
                debug!(
                    "State {} never decoded; ranking by fitted mean {:.6}",
                    k, fitted_means[k]
                );
                fitted_means[k]
            }
        });

        let mut ranking = [0, 1, 2];
        ranking.sort_by(|&a, &b| realized[a].total_cmp(&realized[b]).then(a.cmp(&b)));

        Ok(LabelMapping::from_ranking(ranking))
    }

    /// Label every decoded row.
    pub fn apply(
        &self,
        rows: &[DecodedRow],
        mapping: &LabelMapping,
    ) -> Result<Vec<LabeledRow>, LabelingError> {
        rows.iter()
            .map(|row| {
                let label = mapping
                    .label_for(row.state)
                    .ok_or(LabelingError::StateOutOfRange {
                        state: row.state,
                        n_states: SUPPORTED_STATES,
                    })?;
                Ok(LabeledRow {
                    date: row.date,
                    open: row.open,
                    close: row.close,
                    log_return: row.log_return,
                    state: row.state,
                    label,
                })
            })
            .collect()
    }

    /// Recompute realized means grouped by label and require
    /// bearish < neutral < bullish among the labels that occur.
    pub fn verify(
        &self,
        rows: &[DecodedRow],
        mapping: &LabelMapping,
    ) -> Result<LabelMeans, LabelingError> {
        let labeled = self.apply(rows, mapping)?;
        let mean_of = |label: SemanticLabel| {
            let values: Vec<f64> = labeled
                .iter()
                .filter(|r| r.label == label)
                .map(|r| r.log_return)
                .collect();
            (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
        };

        let means = LabelMeans {
            bearish: mean_of(SemanticLabel::Bearish),
            neutral: mean_of(SemanticLabel::Neutral),
            bullish: mean_of(SemanticLabel::Bullish),
        };

        let present: Vec<f64> = [means.bearish, means.neutral, means.bullish]
            .into_iter()
            .flatten()
            .collect();
        if present.windows(2).any(|pair| !(pair[0] < pair[1])) {
            return Err(LabelingError::Inconsistency {
                details: means.to_string(),
            });
        }

        Ok(means)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::regime::hmm::{GaussianEmission, HmmParameters};
    use crate::domain::regime::model::{CovarianceMode, InformationCriteria};
    use ndarray::{Array1, Array2};

    fn fitted(means: [f64; 3]) -> FittedModel {
        FittedModel {
            parameters: HmmParameters {
                initial_probs: Array1::from_elem(3, 1.0 / 3.0),
                transition_matrix: Array2::from_elem((3, 3), 1.0 / 3.0),
                emissions: means
                    .iter()
                    .map(|&m| GaussianEmission::new(m, 1e-4).unwrap())
                    .collect(),
            },
            covariance_mode: CovarianceMode::Full,
            log_likelihood: 0.0,
            n_observations: 100,
            iterations: 1,
            converged: true,
            criteria: InformationCriteria::compute(0.0, 14, 100),
        }
    }

    fn rows(data: &[(usize, f64)]) -> Vec<DecodedRow> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        data.iter()
            .enumerate()
            .map(|(i, &(state, r))| DecodedRow {
                date: start + chrono::Days::new(i as u64),
                open: 100.0,
                close: 100.0,
                log_return: r,
                state,
            })
            .collect()
    }

    #[test]
    fn test_assign_ranks_by_realized_mean() {
        // Fitted means disagree with realized ones on purpose
        let model = fitted([0.05, -0.05, 0.0]);
        let decoded = rows(&[(0, -0.02), (0, -0.01), (1, 0.03), (1, 0.01), (2, 0.001)]);

        let labeler = RegimeLabeler::new(3).unwrap();
        let mapping = labeler.assign(&decoded, &model).unwrap();

        assert_eq!(mapping.label_for(0), Some(SemanticLabel::Bearish));
        assert_eq!(mapping.label_for(1), Some(SemanticLabel::Bullish));
        assert_eq!(mapping.label_for(2), Some(SemanticLabel::Neutral));
        assert_eq!(mapping.label_for(3), None);
        assert_eq!(mapping.state_for(SemanticLabel::Bullish), Some(1));
        assert_eq!(mapping.state_for(SemanticLabel::Bearish), Some(0));
    }

    #[test]
    fn test_assign_is_bijection_and_self_consistent() {
        let model = fitted([0.0, 0.0, 0.0]);
        let decoded = rows(&[(2, 0.004), (1, -0.03), (0, 0.02), (2, 0.0), (1, -0.01), (0, 0.01)]);

        let labeler = RegimeLabeler::new(3).unwrap();
        let mapping = labeler.assign(&decoded, &model).unwrap();

        let mut labels: Vec<SemanticLabel> = mapping.iter().map(|(_, l)| l).collect();
        labels.sort();
        assert_eq!(labels, SemanticLabel::ALL.to_vec());

        let means = labeler.verify(&decoded, &mapping).unwrap();
        assert!(means.bearish.unwrap() < means.neutral.unwrap());
        assert!(means.neutral.unwrap() < means.bullish.unwrap());
    }

    #[test]
    fn test_unvisited_state_uses_fitted_mean() {
        let model = fitted([0.02, -0.02, 0.0]);
        let decoded = rows(&[(1, -0.01), (2, 0.001), (1, -0.015)]);

        let labeler = RegimeLabeler::new(3).unwrap();
        let mapping = labeler.assign(&decoded, &model).unwrap();
        assert_eq!(mapping.label_for(0), Some(SemanticLabel::Bullish));
        assert!(labeler.verify(&decoded, &mapping).is_ok());
    }

    #[test]
    fn test_verify_reports_inconsistent_mapping() {
        let model = fitted([0.0, 0.0, 0.0]);
        let decoded = rows(&[(0, -0.02), (1, 0.0), (2, 0.02)]);
        let labeler = RegimeLabeler::new(3).unwrap();

        let good = labeler.assign(&decoded, &model).unwrap();
        assert!(labeler.verify(&decoded, &good).is_ok());

        // Swap the extremes
        let swapped = LabelMapping::from_ranking([2, 1, 0]);
        let err = labeler.verify(&decoded, &swapped).unwrap_err();
        assert!(matches!(err, LabelingError::Inconsistency { .. }));
        assert!(err.to_string().contains("bearish=0.020000"));
    }

    #[test]
    fn test_only_three_states_supported() {
        assert!(matches!(
            RegimeLabeler::new(4),
            Err(LabelingError::UnsupportedStateCount { n_states: 4 })
        ));
        let labeler = RegimeLabeler::new(3).unwrap();
        assert!(matches!(
            labeler.assign(&[], &fitted([0.0, 0.1, 0.2])),
            Err(LabelingError::EmptyDecoding)
        ));
        let bad = rows(&[(5, 0.0)]);
        assert!(matches!(
            labeler.assign(&bad, &fitted([0.0, 0.1, 0.2])),
            Err(LabelingError::StateOutOfRange { state: 5, .. })
        ));
    }

    #[test]
    fn test_tied_realized_means_fail_verification() {
        let model = fitted([0.0, 0.0, 0.0]);
        let decoded = rows(&[(0, 0.0), (1, 0.0), (2, 0.01)]);
        let labeler = RegimeLabeler::new(3).unwrap();

        let mapping = labeler.assign(&decoded, &model).unwrap();
        assert_eq!(mapping.label_for(0), Some(SemanticLabel::Bearish));
        assert_eq!(mapping.label_for(1), Some(SemanticLabel::Neutral));
        assert_eq!(mapping.label_for(2), Some(SemanticLabel::Bullish));

        let err = labeler.verify(&decoded, &mapping).unwrap_err();
        assert!(matches!(err, LabelingError::Inconsistency { .. }));
        assert!(err.to_string().contains("neutral=0.000000"));
    }
}
