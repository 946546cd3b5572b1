//! Regime detection: Gaussian HMM fitting, decoding and semantic labeling

pub mod hmm;
pub mod labeler;
pub mod model;
pub mod summary;

pub use labeler::{DecodedRow, LabelMapping, LabelMeans, LabeledRow, RegimeLabeler, SemanticLabel};
pub use model::{CovarianceMode, FitOptions, FittedModel, InformationCriteria, RegimeModel};
pub use summary::{ModelSummary, StateSummary};
