use std::collections::HashMap;
use std::path::PathBuf;

use config::{Config, Environment};
use serde::Deserialize;

use crate::api::{BINANCE_API_BASE, MAX_KLINE_LIMIT};
use crate::error::{BotError, Result};
use crate::execution::BrokerConfig;
use crate::secrets::{CredentialVault, MAX_PASSPHRASE_ATTEMPTS};
use crate::strategy::sma_crossover::DEFAULT_SMA_PERIOD;

pub const ENV_PREFIX: &str = "SMABOT";

/// Runtime settings: built-in defaults overridden by `SMABOT_*` variables
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub archive_path: PathBuf,
    pub config_entry: String,
    pub passphrase_attempts: u8,

    pub symbol: String,
    pub interval: String,
    pub kline_limit: u32,
    pub api_base_url: String,

    pub sma_period: usize,
    pub initial_cash: f64,
    pub commission: f64,
    pub allocation: f64,

    pub live_poll_secs: u64,
    pub live_max_ticks: u64, // 0 runs until Ctrl+C
}

impl Settings {
    /// Load settings from the process environment
    pub fn load() -> Result<Self> {
        Self::from_environment(Environment::with_prefix(ENV_PREFIX))
    }

    /// Load settings from an explicit variable map instead of the process environment
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        Self::from_environment(Environment::with_prefix(ENV_PREFIX).source(Some(vars)))
    }

    fn from_environment(environment: Environment) -> Result<Self> {
        let settings: Settings = Config::builder()
            .set_default("archive_path", "protected_config.zip")?
            .set_default("config_entry", "config.ini")?
            .set_default("passphrase_attempts", MAX_PASSPHRASE_ATTEMPTS as i64)?
            .set_default("symbol", "BTCUSDT")?
            .set_default("interval", "1d")?
            .set_default("kline_limit", 500_i64)?
            .set_default("api_base_url", BINANCE_API_BASE)?
            .set_default("sma_period", DEFAULT_SMA_PERIOD as i64)?
            .set_default("initial_cash", 1000.0)?
            .set_default("commission", 0.001)?
            .set_default("allocation", 1.0)?
            .set_default("live_poll_secs", 60_i64)?
            .set_default("live_max_ticks", 0_i64)?
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(BotError::Settings(msg));

        if self.sma_period == 0 {
            return invalid("sma_period must be at least 1".to_string());
        }
        if !(1..=MAX_PASSPHRASE_ATTEMPTS).contains(&self.passphrase_attempts) {
            return invalid(format!(
                "passphrase_attempts must be between 1 and {}",
                MAX_PASSPHRASE_ATTEMPTS
            ));
        }
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return invalid(format!("initial_cash must be positive, got {}", self.initial_cash));
        }
        if !(0.0..1.0).contains(&self.commission) {
            return invalid(format!("commission must be in [0, 1), got {}", self.commission));
        }
        if !(self.allocation > 0.0 && self.allocation <= 1.0) {
            return invalid(format!("allocation must be in (0, 1], got {}", self.allocation));
        }
        if self.symbol.trim().is_empty() || self.interval.trim().is_empty() {
            return invalid("symbol and interval must be set".to_string());
        }
        if self.kline_limit > MAX_KLINE_LIMIT {
            return invalid(format!(
                "kline_limit {} exceeds the exchange maximum of {}",
                self.kline_limit, MAX_KLINE_LIMIT
            ));
        }
        if (self.kline_limit as usize) < self.sma_period {
            return invalid(format!(
                "kline_limit {} cannot cover sma_period {}",
                self.kline_limit, self.sma_period
            ));
        }
        if self.live_poll_secs == 0 {
            return invalid("live_poll_secs must be at least 1".to_string());
        }

        Ok(())
    }

    pub fn vault(&self) -> CredentialVault {
        CredentialVault::new(&self.archive_path, &self.config_entry)
            .with_max_attempts(self.passphrase_attempts)
    }

    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            initial_cash: self.initial_cash,
            commission: self.commission,
            allocation: self.allocation,
        }
    }
}
