// Paper trading against the live kline feed
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};

use crate::api::BinanceClient;
use crate::error::Result;
use crate::execution::{BrokerConfig, CandleWindow, SimBroker};
use crate::models::Action;
use crate::strategy::Strategy;

/// Where the live feed comes from and how often to poll it
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub symbol: String,
    pub interval: String,
    pub poll_every: Duration,
    pub max_ticks: u64, // 0 = until Ctrl+C
}

/// Outcome of a live session
#[derive(Debug, Clone)]
pub struct LiveReport {
    pub starting_value: f64,
    pub final_value: f64,
    pub ticks: u64,
    pub actions: Vec<Action>,
}

/// Polls closed klines, evaluates each new one and applies it to a paper broker
pub struct LiveRunner<'a, S: Strategy> {
    client: &'a BinanceClient,
    strategy: S,
    config: LiveConfig,
    broker: SimBroker,
    window: CandleWindow,
    actions: Vec<Action>,
    last_close: Option<f64>,
}

impl<'a, S: Strategy> LiveRunner<'a, S> {
    pub fn new(
        client: &'a BinanceClient,
        strategy: S,
        broker_config: BrokerConfig,
        config: LiveConfig,
    ) -> Self {
        // One spare slot so the window always covers the full lookback
        let window = CandleWindow::new(strategy.min_candles_required() + 1);

        Self {
            client,
            strategy,
            config,
            broker: SimBroker::new(broker_config),
            window,
            actions: Vec::new(),
            last_close: None,
        }
    }

    /// Run until Ctrl+C or `max_ticks` polls.
    ///
    /// The first poll only fills the window; trading starts with the first
    /// candle that closes after startup.
    pub async fn run(self) -> Result<LiveReport> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` resolves or `max_ticks` polls.
    ///
    /// `shutdown` is created once, so a signal that arrives while a poll is
    /// in flight stops the loop right after that poll.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<LiveReport>
    where
        F: Future<Output = ()>,
    {
        let starting_value = self.broker.cash();
        let mut ticker = interval(self.config.poll_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0;

        tracing::info!(
            symbol = %self.config.symbol,
            interval = %self.config.interval,
            strategy = self.strategy.name(),
            "Live loop started"
        );

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, stopping live loop");
                    break;
                }
                _ = ticker.tick() => {
                    self.poll(ticks == 0).await?;
                    ticks += 1;

                    if self.config.max_ticks > 0 && ticks >= self.config.max_ticks {
                        tracing::info!(ticks, "Reached tick limit, stopping live loop");
                        break;
                    }
                }
            }
        }

        let final_value = match self.last_close {
            Some(close) => self.broker.portfolio_value(close),
            None => self.broker.cash(),
        };

        Ok(LiveReport {
            starting_value,
            final_value,
            ticks,
            actions: self.actions,
        })
    }

    async fn poll(&mut self, warm_up: bool) -> Result<()> {
        let limit = self.window.capacity() as u32;
        let candles = self
            .client
            .get_closed_klines(&self.config.symbol, &self.config.interval, limit, Utc::now())
            .await?;

        let mut fresh = 0;
        for candle in candles {
            if !self.window.push(candle.clone()) {
                continue;
            }
            fresh += 1;
            self.last_close = Some(candle.close);

            if warm_up {
                continue;
            }

            let position = self.broker.position_state();
            let action = self.strategy.generate_signal(self.window.as_slice(), position);
            self.broker.apply(action, &candle)?;
            self.actions.push(action);

            tracing::info!(
                close = candle.close,
                ?action,
                value = self.broker.portfolio_value(candle.close),
                "Evaluated closed candle"
            );
        }

        tracing::debug!(fresh, window = self.window.len(), warm_up, "Polled klines");
        Ok(())
    }
}
