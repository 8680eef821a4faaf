//! HTTP routes

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::HeaderValue,
    routing::get,
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::data::{HistoricalPrice, LivePrices};
use crate::error::{PriceError, INVALID_DATE_MESSAGE};
use crate::service::PriceService;

/// Shared state handed to every handler
pub struct AppState {
    pub prices: PriceService,
}

/// The `currency` parameter, if it appears exactly once
///
/// A repeated parameter counts as no selection, so the lookup falls back to
/// every currency instead of rejecting the request.
fn single_currency(pairs: &[(String, String)]) -> Option<&str> {
    let mut values = pairs
        .iter()
        .filter(|(name, _)| name == "currency")
        .map(|(_, value)| value.as_str());
    match (values.next(), values.next()) {
        (Some(value), None) => Some(value),
        _ => None,
    }
}

/// Current BTC quotes in USD, AUD, GBP, EUR and CAD
async fn btc_data(State(state): State<Arc<AppState>>) -> Result<Json<LivePrices>, PriceError> {
    let prices = state.prices.current_prices().await?;
    Ok(Json(prices))
}

/// BTC price on a past `dd-mm-yyyy` date
async fn btc_price_history(
    State(state): State<Arc<AppState>>,
    date: Result<Path<String>, PathRejection>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<HistoricalPrice>, PriceError> {
    // A date that cannot be decoded is as malformed as one with the wrong shape
    let Path(date) =
        date.map_err(|_| PriceError::Validation(INVALID_DATE_MESSAGE.to_string()))?;
    let pairs = query.map(|Query(pairs)| pairs).unwrap_or_default();

    let history = state
        .prices
        .historical_price(&date, single_currency(&pairs))
        .await?;
    Ok(Json(history))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(e)) => {
            warn!(error = %e, "ignoring invalid CORS origin, allowing any");
            layer.allow_origin(Any)
        }
        None => layer.allow_origin(Any),
    }
}

/// Builds the application router
pub fn app_router(state: Arc<AppState>, cors_origin: Option<&str>) -> Router {
    Router::new()
        .route("/btc-data", get(btc_data))
        .route("/btc-price-history/{date}", get(btc_price_history))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origin))
        .with_state(state)
}
