//! In-process cache for the current price quotes
//!
//! Holds at most one result of the last successful upstream fetch. The slot
//! stays locked for the whole read-check-refresh sequence, so concurrent
//! callers that find it expired share a single upstream call.

use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::clock::Clock;
use crate::data::LivePrices;
use crate::error::PriceError;

/// Last successful live-price fetch
#[derive(Debug, Clone)]
struct CachedLivePrice {
    payload: LivePrices,
    fetched_at: DateTime<Utc>,
}

/// Single-slot, time-boxed cache of [`LivePrices`]
pub struct LivePriceCache {
    slot: Mutex<Option<CachedLivePrice>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl LivePriceCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: Mutex::new(None),
            ttl,
            clock,
        }
    }

    /// Returns the cached prices if younger than the TTL, otherwise runs
    /// `refresh` and stores its result
    ///
    /// A failed refresh leaves the cache untouched and is returned as is; an
    /// expired payload is never handed out in its place.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<LivePrices, PriceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<LivePrices, PriceError>>,
    {
        let mut slot = self.slot.lock().await;
        let now = self.clock.now();

        if let Some(cached) = slot.as_ref() {
            let age = now - cached.fetched_at;
            if age < self.ttl {
                debug!(age_secs = age.num_seconds(), "live price cache hit");
                return Ok(cached.payload.clone());
            }
        }

        debug!("live price cache miss, refreshing");
        let payload = refresh().await?;
        // Age is counted from when the upstream answered
        *slot = Some(CachedLivePrice {
            payload: payload.clone(),
            fetched_at: self.clock.now(),
        });
        Ok(payload)
    }
}
