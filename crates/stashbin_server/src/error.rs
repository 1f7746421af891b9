//! HTTP error mapping for handlers.

use crate::AppError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// HTTP-facing wrapper that maps [`AppError`] values to status codes.
#[derive(Debug)]
pub struct HttpError(pub AppError);

impl From<AppError> for HttpError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

impl HttpError {
    /// Status code and client-facing message for the wrapped error.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match &self.0 {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Spam { .. } => (StatusCode::BAD_REQUEST, self.0.to_string()),
            AppError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, self.0.to_string()),
            AppError::AllocationExhausted { .. } | AppError::StorageConflict { .. } => {
                tracing::error!("Paste creation failed: {}", self.0);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Could not store the paste, try again later".to_string(),
                )
            }
            AppError::Database(_) | AppError::StorageMessage(_) | AppError::Serialization(_) => {
                tracing::error!("Storage error: {}", self.0);
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
            }
            AppError::Config(_) | AppError::Internal => {
                tracing::error!("Internal error: {:?}", self.0);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        let body = Json(json!({
            "state": "error",
            "code": status.as_u16(),
            "message": message,
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stashbin_core::Area;

    #[test]
    fn domain_errors_map_to_client_statuses() {
        let cases = [
            (AppError::NotFound, StatusCode::NOT_FOUND),
            (
                AppError::Validation("invalid lexer".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::Spam { score: 90, limit: 50 }, StatusCode::BAD_REQUEST),
            (
                AppError::RateLimited { area: Area::Create },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                AppError::AllocationExhausted { attempts: 10 },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AppError::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let (status, _) = HttpError(err).status_and_message();
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn storage_details_are_not_leaked() {
        let (_, message) =
            HttpError(AppError::StorageMessage("/var/lib/secret path".to_string()))
                .status_and_message();
        assert_eq!(message, "Storage error");
    }
}
