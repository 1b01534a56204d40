use crate::backtest::metrics::BacktestReport;
use crate::error::{BotError, Result};
use crate::execution::{BrokerConfig, SimBroker};
use crate::models::{Action, Candle};
use crate::strategy::Strategy;

/// Backtest runner that replays historical candles through a strategy
pub struct BacktestRunner {
    broker_config: BrokerConfig,
}

impl BacktestRunner {
    /// Create a new backtest runner
    pub fn new(broker_config: BrokerConfig) -> Self {
        Self { broker_config }
    }

    /// Run a backtest with given strategy and candles
    ///
    /// At every candle the strategy sees the window ending at that candle
    /// and the broker's current position. Actions fill at that candle's close.
    /// Candles before the strategy's lookback is full produce `Hold`.
    ///
    /// # Returns
    /// BacktestReport with portfolio values and the per-candle actions
    pub fn run<S: Strategy>(&self, strategy: &S, candles: &[Candle]) -> Result<BacktestReport> {
        let Some(last) = candles.last() else {
            return Err(BotError::DataFetch("no candles to backtest".to_string()));
        };

        let lookback = strategy.min_candles_required().max(1);
        if candles.len() < lookback {
            tracing::warn!(
                "Only {} candles for a strategy that needs {}, every bar will hold",
                candles.len(),
                lookback
            );
        }

        tracing::info!(
            "Starting backtest: {} candles, {} needs {}",
            candles.len(),
            strategy.name(),
            lookback
        );

        let mut broker = SimBroker::new(self.broker_config.clone());
        let starting_value = broker.cash();
        let mut actions = Vec::with_capacity(candles.len());

        for (i, candle) in candles.iter().enumerate() {
            let window = &candles[(i + 1).saturating_sub(lookback)..=i];
            let action = strategy.generate_signal(window, broker.position_state());

            if let Some(fill) = broker.apply(action, candle)? {
                tracing::debug!(
                    "{:?} {:.6} @ {:.2} on {}",
                    fill.side,
                    fill.quantity,
                    fill.price,
                    fill.timestamp.format("%Y-%m-%d %H:%M")
                );
            }

            actions.push(action);
        }

        let final_value = broker.portfolio_value(last.close);

        let report = BacktestReport::new(
            strategy.name(),
            starting_value,
            final_value,
            broker.position_state(),
            broker.commission_paid(),
            actions,
            broker.trades().to_vec(),
        );

        tracing::info!(
            "Backtest complete: {} trades, value {:.2} -> {:.2} ({:+.2}%)",
            report.total_trades,
            report.starting_value,
            report.final_value,
            report.total_return_pct
        );

        Ok(report)
    }

    /// Count of actions that changed the position
    pub fn signal_count(actions: &[Action]) -> usize {
        actions.iter().filter(|a| **a != Action::Hold).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::synthetic::{MarketScenario, SyntheticDataGenerator};
    use crate::models::PositionState;
    use crate::strategy::SmaCrossover;
    use chrono::{Duration, TimeZone, Utc};

    fn candles_from(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: start + Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 10.0,
            })
            .collect()
    }

    #[test]
    fn test_backtest_uptrend_enters() {
        tracing_subscriber::fmt()
            .with_env_filter("smabot=debug")
            .try_init()
            .ok();

        let mut gen = SyntheticDataGenerator::new(42);
        let candles = gen.generate(MarketScenario::Uptrend, 200, 1440);

        let runner = BacktestRunner::new(BrokerConfig::default());
        let report = runner.run(&SmaCrossover::default(), &candles).unwrap();

        assert_eq!(report.bars, 200);
        assert!(report.count(Action::EnterLong) >= 1);
        assert!(report.final_value > 0.0);
        // First 19 bars cannot have an SMA(20)
        assert!(report.actions[..19].iter().all(|a| *a == Action::Hold));
    }

    #[test]
    fn test_known_series() {
        // SMA(3): enter at 103 (sma 99.67), exit at 104 (sma 105)
        let candles = candles_from(&[100.0, 102.0, 101.0, 99.0, 97.0, 103.0, 108.0, 104.0]);
        let runner = BacktestRunner::new(BrokerConfig {
            initial_cash: 1000.0,
            commission: 0.0,
            allocation: 1.0,
        });

        let report = runner.run(&SmaCrossover::new(3), &candles).unwrap();

        assert_eq!(
            report.actions,
            vec![
                Action::Hold,
                Action::Hold,
                Action::Hold,
                Action::Hold,
                Action::Hold,
                Action::EnterLong,
                Action::Hold,
                Action::ExitLong,
            ]
        );
        assert_eq!(report.total_trades, 1);
        assert!((report.final_value - 1000.0 * 104.0 / 103.0).abs() < 1e-9);
        assert_eq!(report.final_position, PositionState::Flat);
        assert_eq!(BacktestRunner::signal_count(&report.actions), 2);
    }

    #[test]
    fn test_open_position_marked_to_market() {
        let candles = candles_from(&[100.0, 100.0, 110.0, 120.0]);
        let runner = BacktestRunner::new(BrokerConfig {
            commission: 0.0,
            ..BrokerConfig::default()
        });

        let report = runner.run(&SmaCrossover::new(2), &candles).unwrap();

        assert_eq!(report.final_position, PositionState::Long);
        assert_eq!(report.total_trades, 0);
        assert!((report.final_value - 1000.0 * 120.0 / 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_backtest_insufficient_data_holds() {
        let candles = candles_from(&[100.0, 120.0, 140.0]);
        let runner = BacktestRunner::new(BrokerConfig::default());

        let report = runner.run(&SmaCrossover::default(), &candles).unwrap();
        assert!(report.actions.iter().all(|a| *a == Action::Hold));
        assert_eq!(report.final_value, report.starting_value);
    }

    #[test]
    fn test_backtest_empty_input() {
        let runner = BacktestRunner::new(BrokerConfig::default());
        let result = runner.run(&SmaCrossover::default(), &[]);
        assert!(matches!(result, Err(BotError::DataFetch(_))));
    }

    #[test]
    fn test_replay_is_deterministic() {
        let candles =
            SyntheticDataGenerator::new(9).generate(MarketScenario::Volatile, 300, 1440);
        let runner = BacktestRunner::new(BrokerConfig::default());
        let strategy = SmaCrossover::default();

        let first = runner.run(&strategy, &candles).unwrap();
        let second = runner.run(&strategy, &candles).unwrap();

        assert_eq!(first.actions, second.actions);
        assert_eq!(first.final_value, second.final_value);
        assert!(BacktestRunner::signal_count(&first.actions) > 0);
    }
}
