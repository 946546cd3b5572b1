use super::types::{Action, Decision, TradeLogEntry};
use crate::domain::errors::PolicyError;
use crate::domain::regime::{DecodedRow, LabelMapping, SemanticLabel};
use tracing::debug;

/// Memoryless regime-transition trading policy.
///
/// The decision for day `i + 1` uses the label decoded for day `i` as the
/// current regime and the label of day `i + 1` as the next one; it executes at
/// day `i + 1`'s open.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEngine;

impl PolicyEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn step(&self, current: SemanticLabel, next: SemanticLabel) -> Decision {
        use SemanticLabel::*;
        match (current, next) {
            (Bullish, Bullish) => Decision::new(Action::Hold, 1.0),
            (Bullish, Neutral) => Decision::new(Action::SellHalf, 0.5),
            (Bullish, Bearish) => Decision::new(Action::SellAll, 0.0),
            (Neutral, Bullish) => Decision::new(Action::BuyFull, 1.0),
            (Neutral, Neutral) => Decision::new(Action::Hold, 0.5),
            (Neutral, Bearish) => Decision::new(Action::SellAll, 0.0),
            (Bearish, Bullish) => Decision::new(Action::BuyFull, 1.0),
            (Bearish, Neutral) => Decision::new(Action::BuyHalf, 0.5),
            (Bearish, Bearish) => Decision::new(Action::Hold, 0.0),
        }
    }

    /// Build the trade log for a decoded test period.
    ///
    /// The first row only seeds the current regime, so the log has one entry
    /// fewer than `rows`. A state without a label is an error.
    pub fn run(
        &self,
        rows: &[DecodedRow],
        mapping: &LabelMapping,
    ) -> Result<Vec<TradeLogEntry>, PolicyError> {
        let label_of = |row: &DecodedRow| {
            mapping
                .label_for(row.state)
                .ok_or(PolicyError::UnmappedState {
                    state: row.state,
                    date: row.date,
                })
        };

        let log = rows
            .windows(2)
            .map(|pair| {
                let current = label_of(&pair[0])?;
                let next = label_of(&pair[1])?;
                let decision = self.step(current, next);
                Ok(TradeLogEntry {
                    date: pair[1].date,
                    action: decision.action,
                    target_exposure: decision.exposure,
                    open_price: pair[1].open,
                    regime: next,
                })
            })
            .collect::<Result<Vec<_>, PolicyError>>()?;

        debug!(
            "Policy produced {} entries ({} trades)",
            log.len(),
            log.iter().filter(|e| e.action.is_trade()).count()
        );
        Ok(log)
    }
}
