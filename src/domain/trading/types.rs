use crate::domain::regime::SemanticLabel;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position-sizing action emitted by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Hold,
    BuyFull,
    BuyHalf,
    SellHalf,
    SellAll,
}

impl Action {
    pub fn is_trade(&self) -> bool {
        !matches!(self, Action::Hold)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Hold => write!(f, "Hold"),
            Action::BuyFull => write!(f, "Buy 100%"),
            Action::BuyHalf => write!(f, "Buy Half"),
            Action::SellHalf => write!(f, "Sell Half"),
            Action::SellAll => write!(f, "Sell All"),
        }
    }
}

/// Outcome of one policy step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    /// Target fraction of capital held, one of 0.0, 0.5, 1.0
    pub exposure: f64,
}

impl Decision {
    pub const fn new(action: Action, exposure: f64) -> Self {
        Self { action, exposure }
    }
}

/// One executable decision, taken at the day's open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeLogEntry {
    pub date: NaiveDate,
    pub action: Action,
    pub target_exposure: f64,
    pub open_price: f64,
    /// Regime decoded for the execution day
    pub regime: SemanticLabel,
}
