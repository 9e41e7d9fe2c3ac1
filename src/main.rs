use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{FixedOffset, Utc};
use rust_decimal::Decimal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tronrecon::services::export::{CsvSink, RecordSink};
use tronrecon::services::ledger::{self, LedgerColumns, LedgerStore};
use tronrecon::services::normalizer::{DEFAULT_REPORT_OFFSET_HOURS, TransactionNormalizer};
use tronrecon::services::price::{CoinGeckoService, PriceOracle};
use tronrecon::services::reconciliation::{self, DEFAULT_TOLERANCE, ReconciliationEngine};
use tronrecon::services::tronscan::TronScanService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tronrecon=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let tronscan_base_url = env::var("TRONSCAN_API_BASE_URL")
        .unwrap_or_else(|_| "https://apilist.tronscan.org/api".to_string());
    let tronscan_api_key = env::var("TRONSCAN_API_KEY").ok().filter(|k| !k.is_empty());
    let coingecko_base_url = env::var("COINGECKO_BASE_URL")
        .unwrap_or_else(|_| "https://api.coingecko.com/api/v3".to_string());
    let coingecko_api_key = env::var("COINGECKO_API_KEY").ok().filter(|k| !k.is_empty());

    let wallets_csv = PathBuf::from(env::var("WALLETS_CSV").expect("WALLETS_CSV must be set"));
    let ledger_csv = PathBuf::from(env::var("LEDGER_CSV").expect("LEDGER_CSV must be set"));
    let date_from = env::var("DATE_FROM").expect("DATE_FROM must be set (YYYY-MM-DD)");
    let date_to = env::var("DATE_TO").expect("DATE_TO must be set (YYYY-MM-DD)");
    let output_dir = PathBuf::from(env::var("OUTPUT_DIR").unwrap_or_else(|_| "processed".to_string()));
    let token_filter = env::var("TOKEN_FILTER").ok().filter(|t| !t.is_empty());

    let tolerance: Decimal = match env::var("TOLERANCE") {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid TOLERANCE '{}', using default", raw);
            DEFAULT_TOLERANCE
        }),
        Err(_) => DEFAULT_TOLERANCE,
    };
    let report_offset_hours: i32 = env::var("REPORT_UTC_OFFSET_HOURS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_REPORT_OFFSET_HOURS);

    let ledger_columns = LedgerColumns {
        hash: env::var("LEDGER_HASH_COLUMN").unwrap_or_else(|_| "txn_hash".to_string()),
        amount: env::var("LEDGER_AMOUNT_COLUMN").unwrap_or_else(|_| "amount".to_string()),
        category: Some(env::var("LEDGER_CATEGORY_COLUMN").unwrap_or_else(|_| "category".to_string())),
    };

    tracing::info!("Starting reconciliation run ({} to {})", date_from, date_to);

    // Wallet registry
    let wallets = ledger::load_wallets_from_path(&wallets_csv)?;
    if wallets.is_empty() {
        return Err("no valid wallet addresses found in the registry".into());
    }

    // Chain side: fetch and normalize wallet transfers
    let tronscan = TronScanService::new(tronscan_base_url, tronscan_api_key);
    let oracle = Arc::new(PriceOracle::new(Arc::new(CoinGeckoService::new(
        coingecko_base_url,
        coingecko_api_key,
    ))));
    let normalizer = TransactionNormalizer::with_report_offset(oracle, report_offset_hours);

    let addresses: Vec<String> = wallets.iter().map(|w| w.address.clone()).collect();
    let transfers = tronscan
        .wallet_transfers_for_addresses(
            &normalizer,
            &addresses,
            &date_from,
            &date_to,
            token_filter.as_deref(),
        )
        .await?;

    // Batch stamp in the report timezone, like the original per-run files.
    let report_offset = FixedOffset::east_opt(report_offset_hours * 3600)
        .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
    let batch_id = Utc::now()
        .with_timezone(&report_offset)
        .format("%Y%m%d%H%M%S")
        .to_string();
    let sink = CsvSink::new(&output_dir, &batch_id)?;

    sink.write_transfers(&transfers)?;

    // Ledger side
    let store = LedgerStore::new(ledger_columns);
    let ledger_entries = store.load_entries_from_path(&ledger_csv, "ledger")?;

    // Reconcile
    let chain_entries = reconciliation::chain_amount_map(&transfers);
    let engine = ReconciliationEngine::new(tolerance);
    let records = engine.reconcile(&ledger_entries, &chain_entries);
    let summary = engine.summarize(&records);

    sink.write_reconciliation(&records, &summary)?;

    tracing::info!("Reconciliation completed");
    tracing::info!("  Ledger records: {}", ledger_entries.len());
    tracing::info!("  Chain records: {}", chain_entries.len());
    tracing::info!("  Matched: {}", summary.matched);
    tracing::info!("  Amount different: {}", summary.amount_different);
    tracing::info!("  Only in ledger: {}", summary.only_in_ledger);
    tracing::info!("  Only in chain: {}", summary.only_in_chain);
    tracing::info!("  Total difference: {}", summary.total_difference);
    tracing::info!("  Match rate: {:.1}%", summary.match_rate);
    tracing::info!("  Batch: {}", batch_id);

    Ok(())
}
