// Performance accounting for regime-driven backtests
pub mod accountant;
pub mod metrics;
pub mod stats;

pub use accountant::{PerformanceAccountant, PerformanceRecord};
pub use metrics::PerformanceSummary;
