use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use assetbook::clock::SystemClock;
use assetbook::config::Config;
use assetbook::market_data::{cache_store_for, ExchangeRateSet, PricingPipeline};
use assetbook::models::{normalize_currency_code, AssetClass, Trade};
use assetbook::portfolio::{Holding, HoldingsAggregator};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "assetbook")]
#[command(about = "Holdings, valuation and price lookups for an investment ledger")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "assetbook.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Value the holdings derived from a JSON trade ledger
    Holdings {
        /// JSON file holding an array of trades
        #[arg(long)]
        trades: PathBuf,

        /// Display currency (defaults to the configured one)
        #[arg(long)]
        currency: Option<String>,

        /// JSON exchange-rate set whose base is the display currency
        #[arg(long)]
        rates: Option<PathBuf>,
    },
    /// Fetch one current price through the pricing pipeline
    Quote {
        /// stock or crypto
        asset_class: AssetClass,
        symbol: String,
    },
    /// Show current configuration
    Config,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)?;
    config.apply_env_overrides();
    let config_dir = cli
        .config
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    match cli.command {
        Command::Config => {
            println!("Config file: {}", cli.config.display());
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Command::Quote {
            asset_class,
            symbol,
        } => {
            let store = cache_store_for(&config, &config_dir);
            let pipeline = PricingPipeline::build(&config, store, Arc::new(SystemClock));
            let result = pipeline.source().price(asset_class, &symbol).await;
            pipeline.shutdown().await;

            let quote = result?;
            println!("{}", serde_json::to_string_pretty(&quote)?);
        }
        Command::Holdings {
            trades,
            currency,
            rates,
        } => {
            let trades: Vec<Trade> = read_json(&trades)?;
            let currency = normalize_currency_code(
                currency.as_deref().unwrap_or(&config.display_currency),
            );
            // codes in the file are normalized while deserializing
            let rates = match rates {
                Some(path) => read_json::<ExchangeRateSet>(&path)?,
                None => ExchangeRateSet::new(&currency),
            };
            if rates.base != currency {
                anyhow::bail!(
                    "Exchange rates are based on {} but the display currency is {}",
                    rates.base,
                    currency
                );
            }

            let store = cache_store_for(&config, &config_dir);
            let pipeline = PricingPipeline::build(&config, store, Arc::new(SystemClock));
            let aggregator = HoldingsAggregator::new(pipeline.source());
            let result = aggregator.aggregate(&trades, &currency, &rates).await;
            pipeline.shutdown().await;

            let mut holdings: Vec<Holding> = result?.into_values().collect();
            holdings.sort_by_key(Holding::key);
            println!("{}", serde_json::to_string_pretty(&holdings)?);
        }
    }

    Ok(())
}
