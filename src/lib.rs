//! Bitcoin price proxy library
//!
//! Caches current prices in memory and historical prices in SQLite in front of
//! the CoinGecko API. Exposed as a library for the binary and integration tests.

pub mod api;
pub mod app;
pub mod cache;
pub mod cli;
pub mod clock;
pub mod data;
pub mod error;
pub mod logging;
pub mod prune;
pub mod service;
