//! Startup sequence: provision credentials, choose a mode, build the data
//! client, then run. Each stage returns a typed error and nothing after a
//! failed stage runs.

use std::io::{BufRead, Write};
use std::time::Duration;

use chrono::Utc;

use crate::api::BinanceClient;
use crate::backtest::{BacktestReport, BacktestRunner};
use crate::error::{BotError, Result};
use crate::live::{LiveConfig, LiveReport, LiveRunner};
use crate::models::Mode;
use crate::secrets::{Credentials, PassphraseSource};
use crate::settings::Settings;
use crate::strategy::SmaCrossover;

pub const MODE_PROMPT: &str = "Choose mode (backtest/live): ";

/// Run every stage in order
pub async fn run<R: BufRead, W: Write>(
    settings: &Settings,
    passphrase: &mut dyn PassphraseSource,
    input: &mut R,
    output: &mut W,
) -> Result<()> {
    let credentials = provision_credentials(settings, passphrase)?;
    let mode = choose_mode(input, output)?;
    let client = build_client(settings, credentials)?;

    match mode {
        Mode::Backtest => {
            let report = run_backtest(settings, &client, output).await?;
            report.print_report(output)?;
        }
        Mode::Live => {
            run_live(settings, &client, output).await?;
        }
    }

    Ok(())
}

pub fn provision_credentials(
    settings: &Settings,
    passphrase: &mut dyn PassphraseSource,
) -> Result<Credentials> {
    tracing::info!(stage = "provision_credentials", "Unlocking credential archive");
    Ok(settings.vault().provision(passphrase)?)
}

pub fn choose_mode<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<Mode> {
    write!(output, "{}", MODE_PROMPT)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(BotError::InvalidMode(String::new()));
    }

    let mode: Mode = line.parse()?;
    tracing::info!(stage = "choose_mode", %mode, "Mode selected");
    Ok(mode)
}

/// Hands the credentials to the data client, which keeps the only copy
pub fn build_client(settings: &Settings, credentials: Credentials) -> Result<BinanceClient> {
    tracing::info!(stage = "build_client", base_url = %settings.api_base_url, "Creating market data client");
    BinanceClient::with_base_url(credentials, settings.api_base_url.as_str())
}

pub async fn run_backtest<W: Write>(
    settings: &Settings,
    client: &BinanceClient,
    output: &mut W,
) -> Result<BacktestReport> {
    tracing::info!(stage = "run_backtest", symbol = %settings.symbol, "Fetching history");

    let candles = client
        .get_closed_klines(
            &settings.symbol,
            &settings.interval,
            settings.kline_limit,
            Utc::now(),
        )
        .await?;

    let runner = BacktestRunner::new(settings.broker_config());
    let strategy = SmaCrossover::new(settings.sma_period);

    writeln!(output, "Starting Portfolio Value: {:.2}", settings.initial_cash)?;
    let report = runner.run(&strategy, &candles)?;
    writeln!(output, "Final Portfolio Value: {:.2}", report.final_value)?;

    Ok(report)
}

pub async fn run_live<W: Write>(
    settings: &Settings,
    client: &BinanceClient,
    output: &mut W,
) -> Result<LiveReport> {
    tracing::info!(stage = "run_live", symbol = %settings.symbol, "Verifying credentials");
    client.verify_credentials().await?;

    let runner = LiveRunner::new(
        client,
        SmaCrossover::new(settings.sma_period),
        settings.broker_config(),
        LiveConfig {
            symbol: settings.symbol.clone(),
            interval: settings.interval.clone(),
            poll_every: Duration::from_secs(settings.live_poll_secs),
            max_ticks: settings.live_max_ticks,
        },
    );

    writeln!(output, "Starting Portfolio Value: {:.2}", settings.initial_cash)?;
    output.flush()?;
    let report = runner.run().await?;
    writeln!(output, "Final Portfolio Value: {:.2}", report.final_value)?;

    Ok(report)
}
