//! API error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::types::WatchError;

#[derive(Debug)]
pub struct ApiError(pub WatchError);

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            WatchError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "invalid_argument"),
            WatchError::Auth(_) => (StatusCode::FORBIDDEN, "auth"),
            WatchError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            WatchError::Transient(_) => (StatusCode::BAD_GATEWAY, "transient"),
            WatchError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            WatchError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage"),
            WatchError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
        }
    }
}

impl From<WatchError> for ApiError {
    fn from(err: WatchError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let body = ErrorBody {
            error: kind,
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (WatchError::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
            (WatchError::Auth("x".into()), StatusCode::FORBIDDEN),
            (WatchError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (WatchError::Transient("x".into()), StatusCode::BAD_GATEWAY),
            (WatchError::Unavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).into_response().status(), status);
        }
    }
}
