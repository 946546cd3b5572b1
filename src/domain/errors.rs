use chrono::NaiveDate;
use thiserror::Error;

/// Errors related to price data acquisition and integrity
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Insufficient data: need at least {required} {what}, got {actual}")]
    InsufficientData {
        what: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("Data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("Invalid price data for {symbol} on {date}: {reason}")]
    InvalidData {
        symbol: String,
        date: NaiveDate,
        reason: String,
    },

    #[error("Invalid train/test split: {reason}")]
    InvalidSplit { reason: String },
}

/// Errors raised while fitting or evaluating the regime model
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(
        "Insufficient training data: {observations} observations for {parameters} free parameters"
    )]
    InsufficientData {
        observations: usize,
        parameters: usize,
    },

    #[error("Degenerate fit ({scope}): variance {variance:.3e} below floor {floor:.3e}")]
    DegenerateFit {
        scope: String,
        variance: f64,
        floor: f64,
    },

    #[error("Invalid state count: {0} (need at least 2)")]
    InvalidStateCount(usize),

    #[error("Observation sequence is empty")]
    EmptyObservations,

    #[error("Numerical failure: {reason}")]
    Numerical { reason: String },
}

/// Errors raised while mapping states to semantic labels
#[derive(Debug, Error)]
pub enum LabelingError {
    #[error("Labeling supports exactly 3 states, model has {n_states}")]
    UnsupportedStateCount { n_states: usize },

    #[error("Decoded sequence is empty")]
    EmptyDecoding,

    #[error("State {state} out of range for {n_states}-state model")]
    StateOutOfRange { state: usize, n_states: usize },

    #[error("Label ordering violated: {details}")]
    Inconsistency { details: String },
}

/// Errors raised by the regime transition policy
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("State {state} on {date} has no semantic label")]
    UnmappedState { state: usize, date: NaiveDate },
}

/// Errors related to run configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Failure of a single symbol's pipeline run
#[derive(Debug, Error)]
pub enum RegimeError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Labeling(#[from] LabelingError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RegimeError {
    /// Short category name used in per-symbol failure reports.
    pub fn kind(&self) -> &'static str {
        match self {
            RegimeError::Data(DataError::DataUnavailable { .. }) => "data unavailable",
            RegimeError::Data(DataError::InsufficientData { .. })
            | RegimeError::Model(ModelError::InsufficientData { .. }) => "insufficient data",
            RegimeError::Data(_) => "invalid data",
            RegimeError::Model(ModelError::DegenerateFit { .. }) => "degenerate fit",
            RegimeError::Model(_) => "model failure",
            RegimeError::Labeling(LabelingError::Inconsistency { .. }) => "labeling inconsistency",
            RegimeError::Labeling(_) => "labeling failure",
            RegimeError::Policy(_) => "policy failure",
            RegimeError::Config(_) => "configuration",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_fit_formatting() {
        let error = ModelError::DegenerateFit {
            scope: "state 2".to_string(),
            variance: 1e-14,
            floor: 1e-10,
        };

        let msg = error.to_string();
        assert!(msg.contains("state 2"));
        assert!(msg.contains("1.000e-14"));
        assert!(msg.contains("1.000e-10"));
    }

    #[test]
    fn test_regime_error_kind() {
        let error: RegimeError = DataError::DataUnavailable {
            symbol: "^GSPC".to_string(),
            reason: "empty result".to_string(),
        }
        .into();
        assert_eq!(error.kind(), "data unavailable");
        assert!(error.to_string().contains("^GSPC"));

        let error: RegimeError = ModelError::InsufficientData {
            observations: 5,
            parameters: 14,
        }
        .into();
        assert_eq!(error.kind(), "insufficient data");
    }
}
