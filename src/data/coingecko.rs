//! CoinGecko API client
//!
//! This module fetches current and historical Bitcoin prices from the CoinGecko
//! v3 API and reshapes the responses into the types served by the proxy.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use super::{Currency, HistoricalPrice, LivePrices, LiveQuote};
use crate::error::PriceError;

/// Base URL for the public CoinGecko API
pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Header carrying the demo-tier API key
const API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// Message for dates the upstream has no market data for
pub const NO_DATA_MESSAGE: &str = "No data available for this date";

/// Body of `/simple/price`: `{bitcoin: {usd: .., usd_24h_change: .., usd_market_cap: ..}}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimplePriceResponse {
    #[serde(default)]
    pub bitcoin: Option<HashMap<String, Option<f64>>>,
}

/// Body of `/coins/bitcoin/history`; only the price section is read
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub market_data: Option<MarketData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketData {
    #[serde(default)]
    pub current_price: HashMap<String, f64>,
}

/// Upstream price API as seen by the caches
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Current price, 24h change and market cap for each currency
    async fn simple_price(
        &self,
        currencies: &[Currency],
    ) -> Result<SimplePriceResponse, PriceError>;

    /// Full market snapshot for a `dd-mm-yyyy` date
    async fn history(&self, date: &str) -> Result<HistoryResponse, PriceError>;
}

/// Client for the CoinGecko REST API
#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoClient {
    /// Creates a client whose requests are bounded by `timeout`
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PriceError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http_client, base_url, api_key))
    }

    /// Creates a client around an existing HTTP client
    pub fn with_client(
        http_client: Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn simple_price_url(&self, currencies: &[Currency]) -> String {
        let codes: Vec<&str> = currencies.iter().map(|c| c.code()).collect();
        format!(
            "{}/simple/price?ids=bitcoin&vs_currencies={}\
             &include_24hr_change=true&include_market_cap=true",
            self.base_url,
            codes.join(",")
        )
    }

    fn history_url(&self, date: &str) -> String {
        format!(
            "{}/coins/bitcoin/history?date={}&localization=false",
            self.base_url, date
        )
    }

    /// Sends a GET and decodes the JSON body, failing on any non-2xx status
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, PriceError> {
        let mut request = self
            .http_client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PriceError::Upstream(format!("{} returned {}", url, status)));
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn simple_price(
        &self,
        currencies: &[Currency],
    ) -> Result<SimplePriceResponse, PriceError> {
        self.get_json(&self.simple_price_url(currencies)).await
    }

    async fn history(&self, date: &str) -> Result<HistoryResponse, PriceError> {
        self.get_json(&self.history_url(date)).await
    }
}

/// Reshapes a `/simple/price` body into per-currency quotes
///
/// Every currency in `currencies` must carry its price, 24h change and market
/// cap; a missing or null field is a [`PriceError::DataShape`].
pub fn reshape_simple_price(
    response: &SimplePriceResponse,
    currencies: &[Currency],
) -> Result<LivePrices, PriceError> {
    let bitcoin = response
        .bitcoin
        .as_ref()
        .ok_or_else(|| PriceError::DataShape("missing 'bitcoin' object".to_string()))?;

    let field = |name: String| -> Result<f64, PriceError> {
        bitcoin
            .get(&name)
            .copied()
            .flatten()
            .ok_or_else(|| PriceError::DataShape(format!("missing field '{}'", name)))
    };

    let mut prices = LivePrices::new();
    for currency in currencies {
        let code = currency.code();
        let quote = LiveQuote {
            price: field(code.to_string())?,
            percent_change_24h: field(format!("{}_24h_change", code))?,
            market_cap: field(format!("{}_market_cap", code))?,
        };
        prices.insert(currency.ticker().to_string(), quote);
    }
    Ok(prices)
}

/// Narrows a historical snapshot to the requested currencies
///
/// Currencies absent upstream are skipped. No market data at all, or nothing
/// left after filtering, is a [`PriceError::NoData`].
pub fn filter_history(
    date: &str,
    response: &HistoryResponse,
    currencies: &[Currency],
) -> Result<HistoricalPrice, PriceError> {
    let market_data = response
        .market_data
        .as_ref()
        .ok_or_else(|| PriceError::NoData(NO_DATA_MESSAGE.to_string()))?;

    let prices: BTreeMap<String, f64> = currencies
        .iter()
        .filter_map(|c| {
            market_data
                .current_price
                .get(c.code())
                .map(|price| (c.code().to_string(), *price))
        })
        .collect();

    if prices.is_empty() {
        return Err(PriceError::NoData(NO_DATA_MESSAGE.to_string()));
    }

    Ok(HistoricalPrice {
        date: date.to_string(),
        prices,
    })
}
