//! # TaxCloud CLI
//!
//! Runs the integration's remote calls from JSON files, using the same
//! configuration the checkout loads.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          taxcloud (binary)                              │
//! │                                                                         │
//! │  args ──► TaxCloudConfig::load ──► telemetry::init                     │
//! │                    │                                                    │
//! │                    ▼                                                    │
//! │   HttpTransport + CacheStore ──► TaxCloudApi ──► stdout (JSON)         │
//! │                                      │                                  │
//! │                                      ├── TaxTotalsCollector (--apply)  │
//! │                                      └── OrderLifecycleObserver        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use taxcloud_client::{
    telemetry, CacheStore, HttpTransport, ObserverAction, OrderLifecycleObserver, TaxCloudApi, TaxCloudConfig,
    TaxTotalsCollector,
};
use taxcloud_core::postal;
use taxcloud_core::types::{Address, CreditMemo, Order, OrderEvent, Quote, QuoteTotals, ShippingAssignment};
use taxcloud_core::wire::WireAddress;
use taxcloud_core::{TaxLookupResult, TicSource};

type Api = TaxCloudApi<HttpTransport, CacheStore>;

// =============================================================================
// Arguments
// =============================================================================

#[derive(Debug, Parser)]
#[command(name = "taxcloud", version, about = "TaxCloud checkout integration")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON object mapping product ids to TIC overrides
    #[arg(long, global = true)]
    tics: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Look up tax for a cart (`{"quote": ..., "assignment": ...}`)
    Lookup {
        input: PathBuf,
        /// Run the totals collector and print the updated lines and totals
        #[arg(long)]
        apply: bool,
    },
    /// Verify a destination address
    VerifyAddress { input: PathBuf },
    /// Authorize and capture an order
    Capture {
        input: PathBuf,
        /// Lifecycle event to report instead of capturing directly
        #[arg(long, value_enum)]
        event: Option<EventArg>,
    },
    /// Report a refund (credit memo)
    Return { input: PathBuf },
    /// Show or write configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Write a default configuration file
    Init,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EventArg {
    Placed,
    Paid,
    Shipped,
}

impl From<EventArg> for OrderEvent {
    fn from(arg: EventArg) -> Self {
        match arg {
            EventArg::Placed => OrderEvent::Placed,
            EventArg::Paid => OrderEvent::InvoicePaid,
            EventArg::Shipped => OrderEvent::Shipped,
        }
    }
}

// =============================================================================
// Inputs & Outputs
// =============================================================================

#[derive(Debug, Deserialize)]
struct CartInput {
    quote: Quote,
    assignment: ShippingAssignment,
    #[serde(default)]
    totals: QuoteTotals,
}

#[derive(Debug, Serialize)]
struct AppliedOutput<'a> {
    assignment: &'a ShippingAssignment,
    totals: &'a QuoteTotals,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_catalog(path: Option<&Path>) -> Result<Arc<dyn TicSource + Send + Sync>> {
    let map: HashMap<String, String> = match path {
        Some(path) => read_json(path)?,
        None => HashMap::new(),
    };
    Ok(Arc::new(map))
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Config { action: ConfigAction::Init } = &cli.command {
        let config = TaxCloudConfig::default();
        config.save(cli.config.clone()).context("writing default config")?;
        return Ok(());
    }

    let config = TaxCloudConfig::load(cli.config.clone()).context("loading TaxCloud config")?;
    telemetry::init(&config.logging);
    info!(target: "taxcloud", enabled = config.is_enabled(), "Configuration loaded");

    if let Command::Config { action: ConfigAction::Show } = &cli.command {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let transport = HttpTransport::new(&config.service)?;
    let cache = CacheStore::from_settings(&config.cache).await?;
    let catalog = load_catalog(cli.tics.as_deref())?;
    let api = Arc::new(TaxCloudApi::new(&config, transport, cache, catalog));

    match cli.command {
        Command::Lookup { input, apply } => lookup(&config, api, &input, apply).await,
        Command::VerifyAddress { input } => verify_address(&api, &input).await,
        Command::Capture { input, event } => capture(&config, api, &input, event).await,
        Command::Return { input } => {
            let memo: CreditMemo = read_json(&input)?;
            let observer = OrderLifecycleObserver::new(&config, api);
            report(observer.on_refund(&memo).await)
        }
        Command::Config { .. } => Ok(()),
    }
}

async fn lookup(config: &TaxCloudConfig, api: Arc<Api>, input: &Path, apply: bool) -> Result<()> {
    let mut cart: CartInput = read_json(input)?;

    if !apply {
        let result: TaxLookupResult = api.lookup_taxes(&cart.quote, &cart.assignment).await;
        return print_json(&result);
    }

    let collector = TaxTotalsCollector::new(config, api);
    collector.collect(&cart.quote, &mut cart.assignment, &mut cart.totals).await;
    print_json(&AppliedOutput {
        assignment: &cart.assignment,
        totals: &cart.totals,
    })
}

async fn verify_address(api: &Api, input: &Path) -> Result<()> {
    let address: Address = read_json(input)?;
    let parsed = postal::parse(address.postcode.as_deref());
    let wire = WireAddress::from_address(&address, &parsed);

    match api.verify_address(&wire).await? {
        Some(verified) => print_json(&verified),
        None => anyhow::bail!("address could not be verified"),
    }
}

async fn capture(config: &TaxCloudConfig, api: Arc<Api>, input: &Path, event: Option<EventArg>) -> Result<()> {
    let order: Order = read_json(input)?;

    match event {
        Some(event) => {
            let observer = OrderLifecycleObserver::new(config, api);
            report(observer.on_event(event.into(), &order).await)
        }
        None => {
            let outcome = api.authorize_capture(&order).await?;
            println!("{outcome:?}");
            Ok(())
        }
    }
}

fn report(action: ObserverAction) -> Result<()> {
    println!("{action:?}");
    match action {
        ObserverAction::Failed => anyhow::bail!("remote call failed, see log"),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_capture_with_event() {
        let cli = Cli::try_parse_from(["taxcloud", "capture", "order.json", "--event", "shipped"]).unwrap();
        match cli.command {
            Command::Capture { input, event } => {
                assert_eq!(input, PathBuf::from("order.json"));
                assert!(matches!(event.map(OrderEvent::from), Some(OrderEvent::Shipped)));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["taxcloud", "lookup", "cart.json", "--apply", "--config", "tc.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("tc.toml")));
        assert!(matches!(cli.command, Command::Lookup { apply: true, .. }));
    }

    #[test]
    fn test_cart_input_defaults_totals() {
        let cart: CartInput = serde_json::from_value(serde_json::json!({
            "quote": {"id": "42"},
            "assignment": {"address": null, "shipping": null}
        }))
        .unwrap();
        assert_eq!(cart.quote.id, "42");
        assert!(cart.assignment.items.is_empty());
        assert!(cart.totals.tax_amount.is_zero());
    }
}
