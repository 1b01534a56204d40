use anyhow::Context;
use smabot::secrets::TerminalPrompt;
use smabot::settings::Settings;
use smabot::startup;
use std::io;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    setup_logging();

    let settings = Settings::load().context("failed to load settings")?;

    tracing::info!(
        symbol = %settings.symbol,
        interval = %settings.interval,
        sma_period = settings.sma_period,
        archive = %settings.archive_path.display(),
        "smabot starting"
    );

    let mut input = io::stdin().lock();
    let mut output = io::stdout();

    startup::run(&settings, &mut TerminalPrompt, &mut input, &mut output)
        .await
        .context("smabot aborted")?;

    tracing::info!("smabot finished");
    Ok(())
}

// Logs go to stderr so prompts and portfolio lines own stdout
fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("smabot=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
