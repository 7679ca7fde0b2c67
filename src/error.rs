//! Crate-wide error type.
//!
//! Library code returns [`Result`]; the binaries wrap it in `anyhow`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::gemini::GeminiError;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid user input, rejected before any network call.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Gemini(#[from] GeminiError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Mock token or missing widget/credentials where real payments are required.
    #[error("Payment configuration error: {0}")]
    PaymentConfig(String),

    #[error("Payment is required before this poster can be downloaded")]
    PaymentRequired,
}

pub type Result<T> = std::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Validation(message) => {
                tracing::info!("Rejected request: {}", message);
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            other => {
                tracing::error!("❌ Transaction failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Failed to create transaction" })),
                )
                    .into_response()
            }
        }
    }
}
