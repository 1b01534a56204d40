use super::Strategy;
use crate::indicators::calculate_sma;
use crate::models::{Action, Candle, PositionState};

pub const DEFAULT_SMA_PERIOD: usize = 20;

/// Long-only price/SMA crossover rule.
///
/// - Flat and close above the SMA: enter long
/// - Long and close below the SMA: exit
/// - Anything else holds, including `close == sma`, a missing SMA and
///   non-finite inputs
pub fn evaluate(close: f64, sma: Option<f64>, position: PositionState) -> Action {
    let Some(sma) = sma else {
        return Action::Hold;
    };

    match position {
        PositionState::Flat if close > sma => Action::EnterLong,
        PositionState::Long if close < sma => Action::ExitLong,
        _ => Action::Hold,
    }
}

/// Simple moving average crossover strategy
#[derive(Debug, Clone)]
pub struct SmaCrossover {
    period: usize,
}

impl SmaCrossover {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Default for SmaCrossover {
    fn default() -> Self {
        Self::new(DEFAULT_SMA_PERIOD)
    }
}

impl Strategy for SmaCrossover {
    fn generate_signal(&self, candles: &[Candle], position: PositionState) -> Action {
        let Some(current) = candles.last() else {
            return Action::Hold;
        };

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let sma = calculate_sma(&closes, self.period);

        let action = evaluate(current.close, sma, position);
        if action != Action::Hold {
            tracing::debug!(
                close = current.close,
                sma = ?sma,
                ?position,
                ?action,
                "SMA crossover signal"
            );
        }
        action
    }

    fn name(&self) -> &str {
        "SmaCrossover"
    }

    fn min_candles_required(&self) -> usize {
        self.period
    }
}
