//! Expansion of raw chain transactions into canonical transfer records.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;

use crate::models::explorer::RawTransaction;
use crate::models::transfer::{CanonicalTransfer, Direction, TransferKind};
use crate::services::amount;
use crate::services::hash;
use crate::services::price::PriceOracle;

pub const NATIVE_SYMBOL: &str = "TRX";
pub const NATIVE_DECIMALS: u32 = 6;

/// Default report timezone offset, in hours east of UTC (the accounting
/// team works in GMT+7).
pub const DEFAULT_REPORT_OFFSET_HOURS: i32 = 7;

pub struct TransactionNormalizer {
    oracle: Arc<PriceOracle>,
    report_offset: FixedOffset,
}

impl TransactionNormalizer {
    pub fn new(oracle: Arc<PriceOracle>) -> Self {
        Self::with_report_offset(oracle, DEFAULT_REPORT_OFFSET_HOURS)
    }

    pub fn with_report_offset(oracle: Arc<PriceOracle>, offset_hours: i32) -> Self {
        let report_offset = FixedOffset::east_opt(offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());

        Self {
            oracle,
            report_offset,
        }
    }

    /// Expand one raw transaction into canonical transfer records.
    ///
    /// A transaction with N structured token transfers yields exactly N
    /// records; one without any yields exactly one synthetic native (TRX)
    /// transfer built from the top-level value. Zero-amount transfers are
    /// retained here; wallet-scoped listings filter them downstream.
    pub async fn normalize(
        &self,
        tx: &RawTransaction,
        reference_wallet: Option<&str>,
    ) -> Vec<CanonicalTransfer> {
        let canonical_hash = hash::extract(&tx.hash);
        let status = if tx.confirmed { "SUCCESS" } else { "FAILED" };
        let kind =
            TransferKind::from_contract_type(tx.contract_type, !tx.trc20_transfer_info.is_empty());
        let date_formatted = self.format_date(tx.timestamp);

        let mut transfers = Vec::new();

        if tx.trc20_transfer_info.is_empty() {
            // Synthesize a single native transfer from the top-level value.
            let raw_amount = tx.top_level_value();
            let formatted_amount = self.convert_or_zero(&raw_amount, NATIVE_DECIMALS, &canonical_hash);
            let unit_price_usd = self.oracle.price_usd(NATIVE_SYMBOL, tx.timestamp).await;

            transfers.push(CanonicalTransfer {
                hash: canonical_hash.clone(),
                block_number: tx.block,
                block_timestamp: tx.timestamp,
                token_symbol: NATIVE_SYMBOL.to_string(),
                token_name: NATIVE_SYMBOL.to_string(),
                contract_address: String::new(),
                transfer_kind: kind,
                raw_amount,
                formatted_amount,
                unit_price_usd,
                value_usd: formatted_amount * unit_price_usd,
                from_address: tx.owner_address.clone(),
                to_address: tx.to_address.clone(),
                status: status.to_string(),
                date_formatted: date_formatted.clone(),
                direction: None,
                signed_amount: None,
            });
        } else {
            // Each structured transfer is a distinct ledger line; they are
            // never merged.
            for transfer in &tx.trc20_transfer_info {
                let token_symbol = transfer.symbol.trim().to_uppercase();
                let decimals = transfer
                    .decimals
                    .unwrap_or_else(|| default_decimals(&token_symbol));
                let formatted_amount =
                    self.convert_or_zero(&transfer.amount_str, decimals, &canonical_hash);
                let unit_price_usd = self.oracle.price_usd(&token_symbol, tx.timestamp).await;

                transfers.push(CanonicalTransfer {
                    hash: canonical_hash.clone(),
                    block_number: tx.block,
                    block_timestamp: tx.timestamp,
                    token_symbol,
                    token_name: transfer.name.clone(),
                    contract_address: transfer.contract_address.clone(),
                    transfer_kind: kind,
                    raw_amount: transfer.amount_str.clone(),
                    formatted_amount,
                    unit_price_usd,
                    value_usd: formatted_amount * unit_price_usd,
                    from_address: transfer.from_address.clone(),
                    to_address: transfer.to_address.clone(),
                    status: status.to_string(),
                    date_formatted: date_formatted.clone(),
                    direction: None,
                    signed_amount: None,
                });
            }
        }

        if let Some(wallet) = reference_wallet {
            for transfer in &mut transfers {
                apply_direction(transfer, wallet);
            }
        }

        transfers
    }

    fn convert_or_zero(&self, raw_amount: &str, decimals: u32, tx_hash: &str) -> Decimal {
        match amount::convert(raw_amount, decimals) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("{} in transaction {}, treating as 0", e, tx_hash);
                Decimal::ZERO
            }
        }
    }

    fn format_date(&self, timestamp_ms: i64) -> String {
        DateTime::from_timestamp_millis(timestamp_ms)
            .map(|dt| {
                dt.with_timezone(&self.report_offset)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_default()
    }
}

// Upstream feeds are not guaranteed consistent: a transfer can match
// neither side of the reference wallet, in which case the caller decides
// whether to keep the record.
fn apply_direction(transfer: &mut CanonicalTransfer, wallet: &str) {
    let wallet_lower = wallet.to_lowercase();

    if transfer.from_address.to_lowercase() == wallet_lower {
        transfer.direction = Some(Direction::Out);
        transfer.signed_amount = Some(-transfer.formatted_amount);
    } else if transfer.to_address.to_lowercase() == wallet_lower {
        transfer.direction = Some(Direction::In);
        transfer.signed_amount = Some(transfer.formatted_amount);
    } else {
        transfer.direction = Some(Direction::Unknown);
        transfer.signed_amount = None;
    }
}

// Declared decimals on the transfer take precedence; these are only the
// per-symbol defaults for payloads that omit them.
fn default_decimals(symbol: &str) -> u32 {
    match symbol {
        "BTT" | "JST" | "SUN" => 18,
        _ => 6,
    }
}
