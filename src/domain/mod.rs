// Price data and return series
pub mod market;

// Regime model, decoding and labeling
pub mod regime;

// Regime-driven trading policy
pub mod trading;

// Performance accounting
pub mod performance;

// Price series validation
pub mod validation;

// Port interfaces
pub mod ports;

// Domain-specific error types
pub mod errors;
