use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use autotrader::{
    BittrexClient, ConfigOverrides, OrderLifecycleController, StartupResolver, StdinPrompt,
    TraderConfig,
};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "autotrader")]
#[command(version)]
#[command(about = "Alternating BUY/SELL limit order trader for Bittrex", long_about = None)]
struct Cli {
    /// Configuration file (INI with a [config] section, or TOML/YAML/JSON)
    #[arg(long, value_name = "FILE")]
    conf: Option<PathBuf>,

    /// Exchange API key
    #[arg(long)]
    apikey: Option<String>,

    /// Exchange API secret
    #[arg(long)]
    secret: Option<String>,

    /// Market to trade, QUOTE-ASSET (e.g. BTC-LTC)
    #[arg(long)]
    market: Option<String>,

    /// Quantity of every BUY and SELL order
    #[arg(long)]
    units: Option<String>,

    /// Markup/markdown pair, e.g. 10/5 (percent or fraction)
    #[arg(long, value_name = "UP/DOWN")]
    spread: Option<String>,

    /// SELL markup over the reference price
    #[arg(long)]
    markup: Option<String>,

    /// BUY markdown under the reference price
    #[arg(long)]
    markdown: Option<String>,

    /// Reference price: arithmetic, weighted or exponential
    #[arg(long)]
    method: Option<String>,

    /// Seconds between order status polls
    #[arg(long)]
    delay: Option<String>,

    /// Ask for the starting side when no order is open
    #[arg(long, value_name = "BOOL")]
    prompt: Option<bool>,

    /// Minimum price increment of the market
    #[arg(long)]
    tick_size: Option<String>,

    /// Consecutive transient failures tolerated before exiting
    #[arg(long)]
    max_retries: Option<u32>,

    /// Exchange REST base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl From<Cli> for ConfigOverrides {
    fn from(cli: Cli) -> Self {
        Self {
            conf: cli.conf,
            apikey: cli.apikey,
            secret: cli.secret,
            market: cli.market,
            units: cli.units,
            spread: cli.spread,
            markup: cli.markup,
            markdown: cli.markdown,
            method: cli.method,
            delay: cli.delay,
            prompt: cli.prompt,
            tick_size: cli.tick_size,
            max_retries: cli.max_retries,
            api_url: cli.api_url,
        }
    }
}

/// How the trader stopped without a fatal error
enum Shutdown {
    Aborted,
    Interrupted,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli.into()).await {
        Ok(Shutdown::Aborted) => {
            tracing::info!("👋 Aborted, no order placed");
            ExitCode::SUCCESS
        }
        Ok(Shutdown::Interrupted) => {
            tracing::info!("👋 Stopped; any open order stays on the book");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("❌ {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(overrides: ConfigOverrides) -> anyhow::Result<Shutdown> {
    let config = TraderConfig::load(&overrides).context("Invalid configuration")?;
    tracing::debug!("Loaded configuration: {:?}", config);

    let client = BittrexClient::new(config.credentials.clone())?.with_base_url(&config.api_url);
    let client = Arc::new(client);

    let resolver = StartupResolver::new(&config, client.clone());
    let mut prompt = StdinPrompt;
    let state = match resolver
        .resolve_until(&mut prompt, interrupted())
        .await
        .context("Startup failed")?
    {
        Some(state) => state,
        None => return Ok(Shutdown::Aborted),
    };

    let mut controller = OrderLifecycleController::new(&config, client.clone(), client, state);

    tracing::info!("Press Ctrl+C to stop...");

    tokio::select! {
        _ = interrupted() => {
            tracing::info!("⚠️  Received Ctrl+C, shutting down...");
            Ok(Shutdown::Interrupted)
        }
        result = controller.run() => {
            result.context("Trading stopped")?;
            Ok(Shutdown::Interrupted)
        }
    }
}

/// Completes on Ctrl+C; never completes if the signal can't be watched
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn setup_logging(verbose: bool) {
    let default_filter = if verbose {
        "autotrader=debug"
    } else {
        "autotrader=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
