// Per-symbol regime pipeline, batch runner and reports
pub mod parallel_runner;
pub mod pipeline;
pub mod reporting;

pub use parallel_runner::{ParallelRegimeRunner, SymbolRunResult};
pub use pipeline::{RegimePipeline, RegimeRunReport};
pub use reporting::RegimeReporter;
