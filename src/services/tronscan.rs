//! TronScan API client: paginated transaction feed and wallet-scoped
//! transfer listings.

use std::fmt;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use reqwest::Client;
use rust_decimal::Decimal;

use crate::models::explorer::{RawTransaction, TransactionPage};
use crate::models::transfer::{CanonicalTransfer, Direction};
use crate::services::normalizer::TransactionNormalizer;

pub const PAGE_SIZE: usize = 200;
/// Hard pagination cap (~250 requests per address); a misbehaving or
/// looping paginator must not poll unbounded.
pub const MAX_PAGE_OFFSET: usize = 50_000;

#[derive(Debug)]
pub enum FeedError {
    Api(String),
    InvalidDateRange(String),
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::Api(msg) => write!(f, "TronScan API error: {}", msg),
            FeedError::InvalidDateRange(msg) => write!(f, "invalid date range: {}", msg),
        }
    }
}

impl std::error::Error for FeedError {}

#[derive(Clone)]
pub struct TronScanService {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl TronScanService {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    async fn fetch_page(
        &self,
        address: &str,
        start_timestamp: i64,
        end_timestamp: i64,
        start: usize,
    ) -> Result<TransactionPage, FeedError> {
        let url = format!("{}/transaction", self.base_url);

        let mut request = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(30))
            .query(&[
                ("address", address.to_string()),
                ("start_timestamp", start_timestamp.to_string()),
                ("end_timestamp", end_timestamp.to_string()),
                ("start", start.to_string()),
                ("limit", PAGE_SIZE.to_string()),
                ("sort", "-timestamp".to_string()),
            ]);

        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| FeedError::Api(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(FeedError::Api(format!(
                "TronScan API error {}: {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| FeedError::Api(e.to_string()))
    }

    /// Fetch all transactions for an address within `[start, end)`
    /// millisecond bounds.
    ///
    /// Pagination is sequential; a fetch error or the hard offset cap
    /// stops the loop with a warning and whatever was collected so far is
    /// returned. Partial results beat a failed run.
    pub async fn fetch_transactions(
        &self,
        address: &str,
        start_timestamp: i64,
        end_timestamp: i64,
    ) -> Vec<RawTransaction> {
        let mut all_transactions = Vec::new();
        let mut start = 0usize;

        loop {
            let page = match self
                .fetch_page(address, start_timestamp, end_timestamp, start)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!("Error fetching transactions for {}: {}", address, e);
                    break;
                }
            };

            if page.data.is_empty() {
                break;
            }

            let count = page.data.len();
            all_transactions.extend(page.data);
            tracing::info!(
                "Processed {} transactions for {} (total {})",
                count,
                address,
                all_transactions.len()
            );

            if count < PAGE_SIZE {
                break;
            }

            start += PAGE_SIZE;
            if start > MAX_PAGE_OFFSET {
                tracing::warn!(
                    "Reached pagination cap for address {}, returning partial results",
                    address
                );
                break;
            }
        }

        all_transactions
    }

    /// Fetch a single transaction by hash. `Ok(None)` when the explorer
    /// does not know the hash.
    pub async fn fetch_transaction(
        &self,
        tx_hash: &str,
    ) -> Result<Option<RawTransaction>, FeedError> {
        let url = format!("{}/transaction-info", self.base_url);

        let mut request = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(15))
            .query(&[("hash", tx_hash)]);

        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| FeedError::Api(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(FeedError::Api(format!(
                "TronScan API error {}: {}",
                status, error_text
            )));
        }

        let tx: RawTransaction = response
            .json()
            .await
            .map_err(|e| FeedError::Api(e.to_string()))?;

        if tx.hash.is_empty() {
            return Ok(None);
        }
        Ok(Some(tx))
    }

    /// Wallet-scoped transfer listing: normalized against the wallet,
    /// keeping only directional transfers with a nonzero amount
    /// (zero-value transfers carry no reconciliation signal), optionally
    /// restricted to a single token symbol.
    pub async fn wallet_transfers(
        &self,
        normalizer: &TransactionNormalizer,
        address: &str,
        start_timestamp: i64,
        end_timestamp: i64,
        token_filter: Option<&str>,
    ) -> Vec<CanonicalTransfer> {
        let raw_transactions = self
            .fetch_transactions(address, start_timestamp, end_timestamp)
            .await;

        let wanted_symbol = token_filter.map(|t| t.trim().to_uppercase());
        let mut transfers = Vec::new();

        for tx in &raw_transactions {
            for transfer in normalizer.normalize(tx, Some(address)).await {
                if transfer.formatted_amount.is_zero() {
                    continue;
                }
                if !matches!(transfer.direction, Some(Direction::In) | Some(Direction::Out)) {
                    continue;
                }
                if let Some(symbol) = &wanted_symbol {
                    if &transfer.token_symbol != symbol {
                        continue;
                    }
                }
                transfers.push(transfer);
            }
        }

        transfers
    }

    /// Run the wallet listing for every address in a date range. A failing
    /// address is logged and skipped; the others still contribute.
    pub async fn wallet_transfers_for_addresses(
        &self,
        normalizer: &TransactionNormalizer,
        addresses: &[String],
        date_from: &str,
        date_to: &str,
        token_filter: Option<&str>,
    ) -> Result<Vec<CanonicalTransfer>, FeedError> {
        let (start_timestamp, end_timestamp) = date_range_bounds(date_from, date_to)?;

        let mut all_transfers = Vec::new();

        for (index, address) in addresses.iter().enumerate() {
            tracing::info!(
                "Processing address {}/{}: {}",
                index + 1,
                addresses.len(),
                address
            );

            let transfers = self
                .wallet_transfers(normalizer, address, start_timestamp, end_timestamp, token_filter)
                .await;

            let net: Decimal = transfers.iter().filter_map(|t| t.signed_amount).sum();
            tracing::info!(
                "Address {}: {} transfers, net {}",
                address,
                transfers.len(),
                net
            );

            all_transfers.extend(transfers);
        }

        tracing::info!("Total transfers found: {}", all_transfers.len());
        Ok(all_transfers)
    }
}

/// Convert an inclusive `YYYY-MM-DD` date range into `[start, end)`
/// millisecond bounds (the end date gets the whole day).
pub fn date_range_bounds(date_from: &str, date_to: &str) -> Result<(i64, i64), FeedError> {
    let from = parse_date(date_from)?;
    let to = parse_date(date_to)?;

    if from > to {
        return Err(FeedError::InvalidDateRange(format!(
            "{} is after {}",
            date_from, date_to
        )));
    }

    let end = to
        .checked_add_days(Days::new(1))
        .ok_or_else(|| FeedError::InvalidDateRange(date_to.to_string()))?;

    Ok((
        from.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp_millis(),
        end.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp_millis(),
    ))
}

fn parse_date(date: &str) -> Result<NaiveDate, FeedError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| FeedError::InvalidDateRange(format!("'{}' is not YYYY-MM-DD", date)))
}
