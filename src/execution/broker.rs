use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BotError, Result};
use crate::models::{Action, Candle, PositionState, TradeSide};

/// Broker parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerConfig {
    pub initial_cash: f64,
    pub commission: f64, // Fraction of notional per fill (0.001 = 0.1%)
    pub allocation: f64, // Fraction of cash committed on entry
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            initial_cash: 1000.0,
            commission: 0.001,
            allocation: 1.0,
        }
    }
}

/// A single executed order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fill {
    pub id: Uuid,
    pub side: TradeSide,
    pub price: f64,
    pub quantity: f64,
    pub commission: f64,
    pub timestamp: DateTime<Utc>,
}

/// Completed round trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub commission: f64, // Entry + exit fees
    pub pnl: f64,        // Net of commission
}

#[derive(Debug, Clone)]
struct OpenPosition {
    entry_price: f64,
    quantity: f64,
    entry_time: DateTime<Utc>,
    entry_commission: f64,
}

/// Simulated single-instrument, long-only broker.
///
/// Orders fill at the close of the bar that triggered them.
pub struct SimBroker {
    config: BrokerConfig,
    cash: f64,
    position: Option<OpenPosition>,
    trades: Vec<TradeRecord>,
    commission_paid: f64,
}

impl SimBroker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            cash: config.initial_cash,
            config,
            position: None,
            trades: Vec::new(),
            commission_paid: 0.0,
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position_state(&self) -> PositionState {
        if self.position.is_some() {
            PositionState::Long
        } else {
            PositionState::Flat
        }
    }

    /// Units currently held
    pub fn position_size(&self) -> f64 {
        self.position.as_ref().map(|p| p.quantity).unwrap_or(0.0)
    }

    /// Cash plus the open position marked at `mark_price`
    pub fn portfolio_value(&self, mark_price: f64) -> f64 {
        self.cash + self.position_size() * mark_price
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn commission_paid(&self) -> f64 {
        self.commission_paid
    }

    /// Apply a strategy action at the candle's close
    pub fn apply(&mut self, action: Action, candle: &Candle) -> Result<Option<Fill>> {
        match action {
            Action::EnterLong => self.enter_long(candle.close, candle.timestamp).map(Some),
            Action::ExitLong => self.exit_long(candle.close, candle.timestamp).map(Some),
            Action::Hold => Ok(None),
        }
    }

    /// Buy with the configured share of available cash, net of commission
    pub fn enter_long(&mut self, price: f64, timestamp: DateTime<Utc>) -> Result<Fill> {
        validate_price(price)?;

        if self.position.is_some() {
            return Err(BotError::Execution("already holding a long position".to_string()));
        }

        let budget = self.cash * self.config.allocation;
        let quantity = budget / (price * (1.0 + self.config.commission));
        if quantity.is_nan() || quantity <= 0.0 {
            return Err(BotError::Execution(format!(
                "insufficient cash {:.2} to buy at {:.4}",
                self.cash, price
            )));
        }

        let commission = quantity * price * self.config.commission;
        self.cash -= budget;
        self.commission_paid += commission;
        self.position = Some(OpenPosition {
            entry_price: price,
            quantity,
            entry_time: timestamp,
            entry_commission: commission,
        });

        tracing::info!(
            price = price,
            quantity = quantity,
            commission = commission,
            "BUY filled"
        );

        Ok(Fill {
            id: Uuid::new_v4(),
            side: TradeSide::Buy,
            price,
            quantity,
            commission,
            timestamp,
        })
    }

    /// Sell the whole position
    pub fn exit_long(&mut self, price: f64, timestamp: DateTime<Utc>) -> Result<Fill> {
        validate_price(price)?;

        let position = self
            .position
            .take()
            .ok_or_else(|| BotError::Execution("no open position to close".to_string()))?;

        let proceeds = position.quantity * price;
        let commission = proceeds * self.config.commission;
        self.cash += proceeds - commission;
        self.commission_paid += commission;

        let total_commission = position.entry_commission + commission;
        let pnl = (price - position.entry_price) * position.quantity - total_commission;

        tracing::info!(
            price = price,
            quantity = position.quantity,
            pnl = pnl,
            "SELL filled"
        );

        self.trades.push(TradeRecord {
            entry_time: position.entry_time,
            exit_time: timestamp,
            entry_price: position.entry_price,
            exit_price: price,
            quantity: position.quantity,
            commission: total_commission,
            pnl,
        });

        Ok(Fill {
            id: Uuid::new_v4(),
            side: TradeSide::Sell,
            price,
            quantity: position.quantity,
            commission,
            timestamp,
        })
    }
}

fn validate_price(price: f64) -> Result<()> {
    if price.is_finite() && price > 0.0 {
        Ok(())
    } else {
        Err(BotError::Execution(format!("invalid fill price {}", price)))
    }
}
