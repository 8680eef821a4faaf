//! Price lookups combining the upstream client with both cache layers

use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{HistoricalStore, LivePriceCache};
use crate::clock::Clock;
use crate::data::coingecko::{filter_history, reshape_simple_price};
use crate::data::{
    Currency, HistoricalPrice, LivePrices, PriceSource, HISTORY_CURRENCIES, LIVE_CURRENCIES,
};
use crate::error::{PriceError, INVALID_DATE_MESSAGE};

/// How long live quotes are served from memory
pub const LIVE_PRICE_TTL_MINUTES: i64 = 5;

/// How long historical lookups are kept on disk
pub const HISTORY_RETENTION_HOURS: i64 = 24;

pub fn live_price_ttl() -> Duration {
    Duration::minutes(LIVE_PRICE_TTL_MINUTES)
}

pub fn history_retention() -> Duration {
    Duration::hours(HISTORY_RETENTION_HOURS)
}

/// Checks that `date` is exactly `dd-mm-yyyy` with ASCII digits
///
/// Only the shape is checked; calendar validity is left to the upstream API.
pub fn validate_date(date: &str) -> Result<(), PriceError> {
    let bytes = date.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            2 | 5 => *b == b'-',
            _ => b.is_ascii_digit(),
        });

    if well_formed {
        Ok(())
    } else {
        Err(PriceError::Validation(INVALID_DATE_MESSAGE.to_string()))
    }
}

/// Currencies a historical lookup covers for the given `currency` parameter
///
/// A single recognised code selects just that currency. Anything else,
/// including no parameter or an unknown code, falls back to every supported
/// currency.
pub fn resolve_currencies(param: Option<&str>) -> Vec<Currency> {
    match param.and_then(Currency::from_code) {
        Some(currency) => vec![currency],
        None => HISTORY_CURRENCIES.to_vec(),
    }
}

/// Key of a historical entry: `<date>-<code>,<code>,...`
///
/// Currency order is kept as given, so `usd,eur` and `eur,usd` are different
/// keys.
pub fn history_cache_key(date: &str, currencies: &[Currency]) -> String {
    let codes: Vec<&str> = currencies.iter().map(|c| c.code()).collect();
    format!("{}-{}", date, codes.join(","))
}

/// Serves current and historical prices, hitting upstream only on cache misses
pub struct PriceService {
    source: Arc<dyn PriceSource>,
    live: LivePriceCache,
    store: HistoricalStore,
    clock: Arc<dyn Clock>,
}

impl PriceService {
    pub fn new(
        source: Arc<dyn PriceSource>,
        store: HistoricalStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            live: LivePriceCache::new(live_price_ttl(), clock.clone()),
            store,
            clock,
        }
    }

    pub fn store(&self) -> &HistoricalStore {
        &self.store
    }

    /// Current quotes for USD, AUD, GBP, EUR and CAD
    pub async fn current_prices(&self) -> Result<LivePrices, PriceError> {
        self.live
            .get_or_refresh(|| async {
                let response = self.source.simple_price(&LIVE_CURRENCIES).await.map_err(|e| {
                    warn!(error = %e, "live price fetch failed");
                    e
                })?;
                let prices = reshape_simple_price(&response, &LIVE_CURRENCIES)?;
                info!(currencies = prices.len(), "refreshed live prices");
                Ok::<_, PriceError>(prices)
            })
            .await
    }

    /// Price on `date` (`dd-mm-yyyy`) for the currency selected by `currency`
    pub async fn historical_price(
        &self,
        date: &str,
        currency: Option<&str>,
    ) -> Result<HistoricalPrice, PriceError> {
        validate_date(date)?;

        let currencies = resolve_currencies(currency);
        let key = history_cache_key(date, &currencies);
        let now = self.clock.now();

        if let Some(cached) = self.store.read::<HistoricalPrice>(&key, now).await? {
            if !cached.is_expired {
                debug!(key = %key, "historical cache hit");
                return Ok(cached.data);
            }
            debug!(key = %key, cached_at = %cached.cached_at, "historical cache entry expired");
        } else {
            debug!(key = %key, "historical cache miss");
        }

        let response = self.source.history(date).await.map_err(|e| {
            warn!(date, error = %e, "historical price fetch failed");
            e
        })?;
        let history = filter_history(date, &response, &currencies)?;

        if let Err(e) = self.store.write(&key, &history, now).await {
            warn!(key = %key, error = %e, "failed to persist historical price");
        }

        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachedData;
    use crate::clock::ManualClock;
    use crate::data::{HistoryResponse, SimplePriceResponse};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Upstream stand-in that counts calls and replays canned bodies
    struct FakeSource {
        simple_calls: AtomicUsize,
        history_calls: AtomicUsize,
        history_body: &'static str,
    }

    impl FakeSource {
        fn new(history_body: &'static str) -> Self {
            Self {
                simple_calls: AtomicUsize::new(0),
                history_calls: AtomicUsize::new(0),
                history_body,
            }
        }
    }

    #[async_trait]
    impl PriceSource for FakeSource {
        async fn simple_price(
            &self,
            currencies: &[Currency],
        ) -> Result<SimplePriceResponse, PriceError> {
            let n = self.simple_calls.fetch_add(1, Ordering::SeqCst) as f64;
            let mut bitcoin = std::collections::HashMap::new();
            for c in currencies {
                bitcoin.insert(c.code().to_string(), Some(60000.0 + n));
                bitcoin.insert(format!("{}_24h_change", c.code()), Some(1.0));
                bitcoin.insert(format!("{}_market_cap", c.code()), Some(1.0e12));
            }
            Ok(SimplePriceResponse {
                bitcoin: Some(bitcoin),
            })
        }

        async fn history(&self, _date: &str) -> Result<HistoryResponse, PriceError> {
            self.history_calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_str(self.history_body).unwrap())
        }
    }

    const HISTORY_BODY: &str =
        r#"{"market_data": {"current_price": {"usd": 65000, "eur": 60000}}}"#;

    async fn setup(
        history_body: &'static str,
    ) -> (PriceService, Arc<FakeSource>, Arc<ManualClock>) {
        let source = Arc::new(FakeSource::new(history_body));
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 5, 20, 8, 0, 0).unwrap(),
        ));
        let store = HistoricalStore::in_memory(history_retention()).await.unwrap();
        let service = PriceService::new(source.clone(), store, clock.clone());
        (service, source, clock)
    }

    #[test]
    fn test_validate_date_accepts_dd_mm_yyyy() {
        assert!(validate_date("19-05-2025").is_ok());
        assert!(validate_date("00-00-0000").is_ok());
    }

    #[test]
    fn test_validate_date_rejects_other_shapes() {
        let shapes = [
            "bad-date",
            "2025-05-19",
            "19/05/2025",
            "1-05-2025",
            "19-05-25",
            "19-05-20255",
            "",
            "١٩-05-2025",
        ];
        for bad in shapes {
            let err = validate_date(bad).unwrap_err();
            assert!(matches!(err, PriceError::Validation(_)), "{bad} should be rejected");
            assert_eq!(err.to_string(), INVALID_DATE_MESSAGE);
        }
    }

    #[test]
    fn test_resolve_currencies_single_code() {
        assert_eq!(resolve_currencies(Some("usd")), vec![Currency::Usd]);
        assert_eq!(resolve_currencies(Some("GBP")), vec![Currency::Gbp]);
    }

    #[test]
    fn test_resolve_currencies_falls_back_to_all() {
        let all = HISTORY_CURRENCIES.to_vec();
        assert_eq!(resolve_currencies(None), all);
        assert_eq!(resolve_currencies(Some("jpy")), all);
        assert_eq!(resolve_currencies(Some("usd,eur")), all);
        assert_eq!(resolve_currencies(Some("")), all);
    }

    #[test]
    fn test_history_cache_key_preserves_order() {
        assert_eq!(history_cache_key("19-05-2025", &[Currency::Usd]), "19-05-2025-usd");
        assert_eq!(
            history_cache_key("19-05-2025", &HISTORY_CURRENCIES),
            "19-05-2025-usd,aud,cad,eur,gbp"
        );
        assert_ne!(
            history_cache_key("19-05-2025", &[Currency::Usd, Currency::Eur]),
            history_cache_key("19-05-2025", &[Currency::Eur, Currency::Usd])
        );
    }

    #[tokio::test]
    async fn test_invalid_date_performs_no_io() {
        let (service, source, _clock) = setup(HISTORY_BODY).await;

        let err = service.historical_price("bad-date", Some("usd")).await.unwrap_err();

        assert!(matches!(err, PriceError::Validation(_)));
        assert_eq!(source.history_calls.load(Ordering::SeqCst), 0);
        assert!(service.store().is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_historical_lookup_is_cached_within_retention() {
        let (service, source, clock) = setup(HISTORY_BODY).await;

        let first = service.historical_price("19-05-2025", Some("usd")).await.unwrap();
        clock.advance(Duration::hours(23));
        let second = service.historical_price("19-05-2025", Some("usd")).await.unwrap();

        assert_eq!(first.date, "19-05-2025");
        assert_eq!(first.prices.len(), 1);
        assert_eq!(first.prices["usd"], 65000.0);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
        assert_eq!(source.history_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_historical_lookup_refetches_after_retention() {
        let (service, source, clock) = setup(HISTORY_BODY).await;

        service.historical_price("19-05-2025", Some("usd")).await.unwrap();
        clock.advance(Duration::hours(24) + Duration::minutes(1));
        service.historical_price("19-05-2025", Some("usd")).await.unwrap();

        assert_eq!(source.history_calls.load(Ordering::SeqCst), 2);

        let entry: CachedData<HistoricalPrice> = service
            .store()
            .read("19-05-2025-usd", clock.now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.cached_at, clock.now(), "Refetch rewrites the timestamp");
    }

    #[tokio::test]
    async fn test_distinct_currencies_produce_distinct_entries() {
        let (service, source, _clock) = setup(HISTORY_BODY).await;

        let usd = service.historical_price("19-05-2025", Some("usd")).await.unwrap();
        let eur = service.historical_price("19-05-2025", Some("eur")).await.unwrap();

        assert_eq!(usd.prices.keys().collect::<Vec<_>>(), vec!["usd"]);
        assert_eq!(eur.prices.keys().collect::<Vec<_>>(), vec!["eur"]);
        assert_eq!(service.store().len().await.unwrap(), 2);
        assert_eq!(source.history_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_default_currency_set_keeps_available_prices() {
        let (service, _source, clock) = setup(HISTORY_BODY).await;

        let all = service.historical_price("19-05-2025", None).await.unwrap();

        assert_eq!(all.prices.len(), 2);
        let stored: Option<CachedData<HistoricalPrice>> = service
            .store()
            .read("19-05-2025-usd,aud,cad,eur,gbp", clock.now())
            .await
            .unwrap();
        assert_eq!(stored.unwrap().data, all);
    }

    #[tokio::test]
    async fn test_missing_market_data_is_no_data_and_not_cached() {
        let (service, _source, _clock) = setup(r#"{"id": "bitcoin"}"#).await;

        let err = service.historical_price("01-01-2009", Some("usd")).await.unwrap_err();

        assert!(matches!(err, PriceError::NoData(_)));
        assert!(service.store().is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_requested_currency_absent_is_no_data() {
        let (service, _source, _clock) = setup(HISTORY_BODY).await;

        let err = service.historical_price("19-05-2025", Some("cad")).await.unwrap_err();

        assert!(matches!(err, PriceError::NoData(_)));
    }

    #[tokio::test]
    async fn test_current_prices_cached_for_five_minutes() {
        let (service, source, clock) = setup(HISTORY_BODY).await;

        let first = service.current_prices().await.unwrap();
        clock.advance(Duration::minutes(4));
        let second = service.current_prices().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
        assert_eq!(source.simple_calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::minutes(2));
        let third = service.current_prices().await.unwrap();

        assert_ne!(first, third);
        assert_eq!(source.simple_calls.load(Ordering::SeqCst), 2);
    }
}
