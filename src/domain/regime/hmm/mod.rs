//! Gaussian Hidden Markov Model primitives

pub mod algorithms;
pub mod gaussian;
pub mod init;
pub mod params;

pub use gaussian::GaussianEmission;
pub use params::HmmParameters;
