//! # Checkout Summary
//!
//! Prices a persisted cart from the command line.
//!
//! ## Usage
//! ```bash
//! # Price a saved `cart_items` payload with the configured tax rate
//! cargo run -p storefront-state --bin checkout -- ./cart_items.json
//!
//! # Apply discounts and use an explicit config file
//! cargo run -p storefront-state --bin checkout -- ./cart_items.json \
//!     --discounts ./discounts.json --config ./storefront.toml
//! ```
//!
//! The cart file is read through a [`RetryPolicy`] built from the
//! `[retry]` config section, so a file that's briefly locked by the
//! writer is retried instead of failing outright.

use std::env;
use std::path::PathBuf;

use storefront_core::{Cart, Discount};
use storefront_state::{AsyncOptions, RetryHooks, RetryPolicy, StorefrontConfig};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// ## Log Levels
/// - `RUST_LOG=debug` - Show state transitions
/// - Default: `info,storefront=debug`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,storefront=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .with_writer(std::io::stderr)
        .init();
}

fn print_help() {
    println!("Storefront Checkout Summary");
    println!();
    println!("Usage: checkout <CART_FILE> [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -d, --discounts <PATH>  JSON array of discounts to apply");
    println!("  -c, --config <PATH>     Config file (default: platform config dir)");
    println!("  -h, --help              Show this help message");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut cart_path: Option<PathBuf> = None;
    let mut discounts_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--discounts" | "-d" => {
                if i + 1 < args.len() {
                    discounts_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => cart_path = Some(PathBuf::from(other)),
        }
        i += 1;
    }

    let Some(cart_path) = cart_path else {
        print_help();
        return Err("missing cart file".into());
    };

    let config = StorefrontConfig::load(config_path)?;
    info!(
        tax_rate_bps = config.pricing.tax_rate_bps,
        currency = %config.pricing.currency,
        "Configuration loaded"
    );

    let hooks = RetryHooks::new()
        .on_retry(|attempt, err| warn!(attempt, error = %err, "Cart file unreadable, retrying"));
    let reader = RetryPolicy::new(config.retry_config(), AsyncOptions::new()).with_hooks(hooks);

    let payload = reader
        .execute(|| {
            let path = cart_path.clone();
            async move { std::fs::read_to_string(path) }
        })
        .await?;
    let cart = Cart::from_json(&payload)?;

    if let Some(currency) = cart.currency() {
        if currency != config.pricing.currency {
            warn!(
                cart = currency,
                configured = %config.pricing.currency,
                "Cart currency differs from configured currency"
            );
        }
    }

    let discounts: Vec<Discount> = match discounts_path {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => Vec::new(),
    };

    let summary = config.pricing.aggregator().compute(cart.items(), &discounts)?;
    info!(
        items = summary.item_count,
        total = %summary.total,
        "Cart priced"
    );

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
