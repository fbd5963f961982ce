//! Error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lambdagate_common::LambdaError;
use serde_json::json;

/// A [`LambdaError`] rendered as `500 {"error": <kind>, "message": <description>}`.
#[derive(Debug)]
pub struct ApiError(pub LambdaError);

impl From<LambdaError> for ApiError {
    fn from(err: LambdaError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!("Request failed: {}", self.0);
        let body = json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
        });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
