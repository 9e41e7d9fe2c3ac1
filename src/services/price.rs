//! Historical USD pricing with a per-(symbol, date) cache and static
//! fallback values.
//!
//! Price lookup failure must never abort normalization: unmapped symbols,
//! network errors and malformed responses all resolve to the fallback
//! table. Historical prices are immutable once published, so cached
//! entries never expire.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use moka::future::Cache;
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

#[derive(Debug)]
pub enum PriceError {
    Api(String),
    MissingField(String),
}

impl fmt::Display for PriceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceError::Api(msg) => write!(f, "price API error: {}", msg),
            PriceError::MissingField(field) => write!(f, "missing field in price response: {}", field),
        }
    }
}

impl std::error::Error for PriceError {}

/// External price service collaborator. Failure is a fallback trigger for
/// the oracle, not a propagated error.
#[async_trait]
pub trait HistoricalPriceProvider: Send + Sync {
    async fn historical_price(&self, coin_id: &str, date: NaiveDate) -> Result<Decimal, PriceError>;
}

#[derive(Clone)]
pub struct CoinGeckoService {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    market_data: Option<MarketData>,
}

#[derive(Debug, Deserialize)]
struct MarketData {
    current_price: Option<HashMap<String, f64>>,
}

impl CoinGeckoService {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl HistoricalPriceProvider for CoinGeckoService {
    async fn historical_price(&self, coin_id: &str, date: NaiveDate) -> Result<Decimal, PriceError> {
        let url = format!("{}/coins/{}/history", self.base_url, coin_id);
        // CoinGecko wants DD-MM-YYYY.
        let formatted_date = date.format("%d-%m-%Y").to_string();

        let mut request = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .timeout(Duration::from_secs(15))
            .query(&[("date", formatted_date.as_str()), ("localization", "false")]);

        if let Some(key) = &self.api_key {
            request = request.header("x-cg-pro-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PriceError::Api(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PriceError::Api(format!(
                "CoinGecko API error {}: {}",
                status, error_text
            )));
        }

        let data: HistoryResponse = response
            .json()
            .await
            .map_err(|e| PriceError::Api(e.to_string()))?;

        let usd = data
            .market_data
            .and_then(|m| m.current_price)
            .and_then(|prices| prices.get("usd").copied())
            .ok_or_else(|| PriceError::MissingField("market_data.current_price.usd".to_string()))?;

        Decimal::from_f64_retain(usd)
            .ok_or_else(|| PriceError::Api(format!("unrepresentable price {}", usd)))
    }
}

/// Resolves a token's historical USD unit price for the date of a
/// timestamp, caching successful fetches for the process lifetime.
pub struct PriceOracle {
    provider: Arc<dyn HistoricalPriceProvider>,
    cache: Arc<Cache<(String, NaiveDate), Decimal>>,
    coin_ids: HashMap<&'static str, &'static str>,
    fallbacks: HashMap<&'static str, Decimal>,
}

impl PriceOracle {
    pub fn new(provider: Arc<dyn HistoricalPriceProvider>) -> Self {
        let cache = Cache::builder().max_capacity(10_000).build();

        Self {
            provider,
            cache: Arc::new(cache),
            coin_ids: coin_id_mapping(),
            fallbacks: fallback_prices(),
        }
    }

    /// Historical USD unit price for `token_symbol` on the UTC calendar
    /// date of `timestamp_ms`. Falls back to the static table on any
    /// lookup failure; wholly unknown symbols price at zero.
    pub async fn price_usd(&self, token_symbol: &str, timestamp_ms: i64) -> Decimal {
        let symbol = token_symbol.trim().to_uppercase();

        let Some(date) = DateTime::from_timestamp_millis(timestamp_ms).map(|dt| dt.date_naive())
        else {
            tracing::warn!("Invalid timestamp {} for {} price lookup", timestamp_ms, symbol);
            return self.fallback_price(&symbol);
        };

        let cache_key = (symbol.clone(), date);
        if let Some(price) = self.cache.get(&cache_key).await {
            tracing::debug!("Price cache hit for {} on {}", symbol, date);
            return price;
        }

        // Tokens without an external id go straight to the fallback table.
        let Some(coin_id) = self.coin_ids.get(symbol.as_str()) else {
            return self.fallback_price(&symbol);
        };

        match self.provider.historical_price(coin_id, date).await {
            Ok(price) => {
                tracing::debug!("Historical price for {} on {}: {}", symbol, date, price);
                self.cache.insert(cache_key, price).await;
                price
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to fetch historical price for {} on {}: {}",
                    symbol,
                    date,
                    e
                );
                self.fallback_price(&symbol)
            }
        }
    }

    pub fn fallback_price(&self, symbol: &str) -> Decimal {
        self.fallbacks
            .get(symbol)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }
}

// Tron-ecosystem tokens with a CoinGecko listing.
fn coin_id_mapping() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("TRX", "tron"),
        ("USDT", "tether"),
        ("USDC", "usd-coin"),
        ("BTT", "bittorrent"),
        ("JST", "just"),
        ("SUN", "sun-token"),
        ("WIN", "wink"),
        ("JUST", "just"),
        ("NFT", "apenft"),
        ("USDJ", "just-stablecoin"),
        ("TUSD", "true-usd"),
        ("LIVE", "live-coin"),
    ])
}

fn fallback_prices() -> HashMap<&'static str, Decimal> {
    HashMap::from([
        ("TRX", dec!(0.12)),
        ("USDT", dec!(1.0)),
        ("USDC", dec!(1.0)),
        ("BTT", dec!(0.0000008)),
        ("JST", dec!(0.025)),
        ("SUN", dec!(0.006)),
        ("WIN", dec!(0.00008)),
        ("JUST", dec!(0.025)),
        ("NFT", dec!(0.0000005)),
        ("USDJ", dec!(1.0)),
        ("TUSD", dec!(1.0)),
        ("LIVE", dec!(0.001)),
    ])
}
