//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mcp_gateway_core::Error;
use serde::Serialize;

/// Structured error body returned by every failing endpoint
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable error kind (e.g. "invalid_argument", "not_found")
    pub error: String,
    /// Human-readable message
    pub message: String,
}

/// Wrapper turning gateway errors into HTTP responses
pub struct ApiError(pub Error);

impl ApiError {
    /// 503 for surfaces whose backing component is not configured
    pub fn unavailable(what: &str) -> Self {
        Self(Error::Unavailable(format!("{what} is not configured")))
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self.0 {
            Error::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "invalid_argument"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::AlreadyExists(_) => (StatusCode::CONFLICT, "already_exists"),
            Error::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        let body = ErrorBody {
            error: kind.to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error: Error) -> StatusCode {
        ApiError(error).into_response().status()
    }

    #[test]
    fn errors_map_to_their_status_codes() {
        assert_eq!(
            status_of(Error::invalid_argument("data is empty")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(Error::NotFound("t1".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(Error::AlreadyExists("t1".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(Error::Unavailable("engine".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(Error::internal("boom")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
