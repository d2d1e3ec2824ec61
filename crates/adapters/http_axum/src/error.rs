//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use aggregator_domain::error::{AggregatorError, ConfigurationError};

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps errors to an HTTP response with an appropriate status code.
#[derive(Debug)]
pub enum ApiError {
    Domain(AggregatorError),
    /// A path or query parameter could not be parsed.
    BadRequest(String),
}

impl From<AggregatorError> for ApiError {
    fn from(err: AggregatorError) -> Self {
        Self::Domain(err)
    }
}

impl ApiError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Domain(AggregatorError::Configuration(err)) => {
                let status = match err {
                    ConfigurationError::DuplicateEndpoint { .. }
                    | ConfigurationError::DuplicateRule { .. } => StatusCode::CONFLICT,
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, err.to_string())
            }
            Self::Domain(AggregatorError::NotFound(err)) => (StatusCode::NOT_FOUND, err.to_string()),
            Self::Domain(err @ AggregatorError::StorageUnavailable(_)) => {
                tracing::error!(error = ?err, "storage unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "storage unavailable".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
