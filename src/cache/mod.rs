//! Cache layers in front of the upstream price API
//!
//! [`LivePriceCache`] memoizes the current quotes in memory for a few minutes.
//! [`HistoricalStore`] persists historical lookups in SQLite and is swept
//! periodically by [`crate::prune`].

mod live;
mod store;

pub use live::LivePriceCache;
pub use store::{CachedData, HistoricalStore, StoreError};
