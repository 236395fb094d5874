//! Maps `IcelakeError` onto the HTTP status codes the error-handling design
//! calls for: user input is a 4xx the caller can fix, transient and
//! permanent failures are both a 5xx since neither is the caller's fault,
//! paired with the request-id logged for the matching structured log line.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use icelake_core::IcelakeError;
use serde_json::json;

pub fn error_response(err: IcelakeError, request_id: &str) -> Response {
    match err {
        IcelakeError::UserInput(message) => {
            tracing::warn!(request_id, %message, "rejected request");
            (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
        }
        IcelakeError::Transient(message) | IcelakeError::Permanent(message) => {
            tracing::error!(request_id, %message, "request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error", "request_id": request_id })),
            )
                .into_response()
        }
    }
}
