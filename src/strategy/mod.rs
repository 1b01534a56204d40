// Trading strategy module
pub mod sma_crossover;

pub use sma_crossover::{evaluate, SmaCrossover};

use crate::models::{Action, Candle, PositionState};

/// Base trait for all trading strategies
///
/// Strategies own no state: the position is passed in and the returned
/// action is applied by the broker.
pub trait Strategy: Send + Sync {
    /// Decide what to do at the last candle of `candles`
    fn generate_signal(&self, candles: &[Candle], position: PositionState) -> Action;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum candles required before the strategy can act
    fn min_candles_required(&self) -> usize;
}
