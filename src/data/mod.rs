//! Core data models for the Bitcoin price proxy
//!
//! This module contains the currency list and the response types served to
//! callers, plus the upstream client in [`coingecko`].

pub mod coingecko;

pub use coingecko::{CoinGeckoClient, HistoryResponse, PriceSource, SimplePriceResponse};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fiat currencies the service quotes Bitcoin in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Currency {
    Usd,
    Aud,
    Gbp,
    Eur,
    Cad,
}

/// Currencies fetched for every live-price refresh, in request order
pub const LIVE_CURRENCIES: [Currency; 5] = [
    Currency::Usd,
    Currency::Aud,
    Currency::Gbp,
    Currency::Eur,
    Currency::Cad,
];

/// Currencies a historical lookup may select, in cache-key order
pub const HISTORY_CURRENCIES: [Currency; 5] = [
    Currency::Usd,
    Currency::Aud,
    Currency::Cad,
    Currency::Eur,
    Currency::Gbp,
];

impl Currency {
    /// Lower-case code as used by the upstream API (`usd`)
    pub fn code(self) -> &'static str {
        match self {
            Currency::Usd => "usd",
            Currency::Aud => "aud",
            Currency::Gbp => "gbp",
            Currency::Eur => "eur",
            Currency::Cad => "cad",
        }
    }

    /// Upper-case ticker as returned by `/btc-data` (`USD`)
    pub fn ticker(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Aud => "AUD",
            Currency::Gbp => "GBP",
            Currency::Eur => "EUR",
            Currency::Cad => "CAD",
        }
    }

    /// Parses a currency code, ignoring case and surrounding whitespace
    pub fn from_code(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "usd" => Some(Currency::Usd),
            "aud" => Some(Currency::Aud),
            "gbp" => Some(Currency::Gbp),
            "eur" => Some(Currency::Eur),
            "cad" => Some(Currency::Cad),
            _ => None,
        }
    }
}

/// Current Bitcoin quote in one currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveQuote {
    pub price: f64,
    pub percent_change_24h: f64,
    pub market_cap: f64,
}

/// Current quotes keyed by upper-case ticker
pub type LivePrices = BTreeMap<String, LiveQuote>;

/// Bitcoin price on a past date for the selected currencies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPrice {
    /// Date as requested, `dd-mm-yyyy`
    pub date: String,
    /// Prices keyed by lower-case currency code
    pub prices: BTreeMap<String, f64>,
}
