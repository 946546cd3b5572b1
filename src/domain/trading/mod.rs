// Regime-driven trading policy
pub mod policy;
pub mod types;

pub use policy::PolicyEngine;
pub use types::{Action, Decision, TradeLogEntry};
