//! Single-transaction inspector: fetch a transaction by hash, normalize
//! it and print every transfer.
//!
//! Usage: check_hash <hash> [<hash> ...]

use std::env;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tronrecon::services::hash;
use tronrecon::services::normalizer::TransactionNormalizer;
use tronrecon::services::price::{CoinGeckoService, PriceOracle};
use tronrecon::services::tronscan::TronScanService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let hashes: Vec<String> = env::args().skip(1).collect();
    if hashes.is_empty() {
        eprintln!("Usage: check_hash <transaction_hash> [<hash2> <hash3> ...]");
        std::process::exit(1);
    }

    let tronscan_base_url = env::var("TRONSCAN_API_BASE_URL")
        .unwrap_or_else(|_| "https://apilist.tronscan.org/api".to_string());
    let tronscan_api_key = env::var("TRONSCAN_API_KEY").ok().filter(|k| !k.is_empty());
    let coingecko_base_url = env::var("COINGECKO_BASE_URL")
        .unwrap_or_else(|_| "https://api.coingecko.com/api/v3".to_string());
    let coingecko_api_key = env::var("COINGECKO_API_KEY").ok().filter(|k| !k.is_empty());

    let tronscan = TronScanService::new(tronscan_base_url, tronscan_api_key);
    let oracle = Arc::new(PriceOracle::new(Arc::new(CoinGeckoService::new(
        coingecko_base_url,
        coingecko_api_key,
    ))));
    let normalizer = TransactionNormalizer::new(oracle);

    let mut total_usd = Decimal::ZERO;

    for raw_hash in &hashes {
        let tx_hash = hash::extract(raw_hash);
        println!("Checking transaction: {}", tx_hash);

        let tx = match tronscan.fetch_transaction(&tx_hash).await? {
            Some(tx) => tx,
            None => {
                println!("  Transaction not found");
                continue;
            }
        };

        let transfers = normalizer.normalize(&tx, None).await;
        println!(
            "  {} | block {} | {} transfer(s)",
            transfers
                .first()
                .map(|t| t.date_formatted.as_str())
                .unwrap_or("unknown date"),
            tx.block.map(|b| b.to_string()).unwrap_or_default(),
            transfers.len()
        );

        for transfer in &transfers {
            println!(
                "  {} {} ({}): {} -> {} | ${}",
                transfer.formatted_amount,
                transfer.token_symbol,
                transfer.status,
                transfer.from_address,
                transfer.to_address,
                transfer.value_usd
            );
            total_usd += transfer.value_usd;
        }
    }

    println!("Total value: ${}", total_usd);
    Ok(())
}
