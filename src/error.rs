//! Error types shared by the caches, the upstream client and the HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::cache::StoreError;

/// Message returned when a historical date is not `dd-mm-yyyy`
pub const INVALID_DATE_MESSAGE: &str = "Invalid date format. Use dd-mm-yyyy.";

/// Errors surfaced by price lookups
#[derive(Debug, Error)]
pub enum PriceError {
    /// Caller supplied malformed input; no I/O was performed
    #[error("{0}")]
    Validation(String),

    /// Transport failure, timeout or non-success status from the upstream API
    #[error("Upstream request failed: {0}")]
    Upstream(String),

    /// Upstream answered but had nothing usable for the request
    #[error("{0}")]
    NoData(String),

    /// Upstream payload is missing a field we rely on
    #[error("Unexpected upstream response: {0}")]
    DataShape(String),

    /// The historical store could not be read
    #[error("Cache storage error: {0}")]
    Storage(#[from] StoreError),
}

impl From<reqwest::Error> for PriceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PriceError::Upstream(format!("request timed out: {err}"))
        } else {
            PriceError::Upstream(err.to_string())
        }
    }
}

impl PriceError {
    /// HTTP status the error maps to at the API boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            PriceError::Validation(_) | PriceError::NoData(_) => StatusCode::BAD_REQUEST,
            PriceError::Upstream(_) | PriceError::DataShape(_) | PriceError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for PriceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err = PriceError::Validation(INVALID_DATE_MESSAGE.to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), INVALID_DATE_MESSAGE);
    }

    #[test]
    fn test_no_data_maps_to_bad_request() {
        let err = PriceError::NoData("No data available for this date".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_upstream_and_shape_map_to_server_error() {
        assert_eq!(
            PriceError::Upstream("503".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            PriceError::DataShape("usd_market_cap".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upstream_message_mentions_cause() {
        let err = PriceError::Upstream("status 429".to_string());
        assert!(err.to_string().contains("status 429"));
    }
}
