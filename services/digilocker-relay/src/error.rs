//! HTTP-facing error types
//!
//! Handlers return `Result<Response, ApiError>`; the `IntoResponse` impl is
//! the single place where failures become status codes and JSON bodies.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("no access token or authorization parameters")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Provider answered with a non-2xx status; passed through as-is
    #[error("provider returned {status}")]
    Upstream { status: StatusCode, body: String },

    #[error("bad gateway: {0}")]
    BadGateway(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("rate limit exceeded")]
    TooManyRequests,

    #[error("no route")]
    NotFound,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream { status, .. } => *status,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "Unauthorized",
            ApiError::BadRequest(_) => "Bad Request",
            ApiError::Upstream { .. } => "Upstream provider error",
            ApiError::BadGateway(_) => "Bad Gateway",
            ApiError::Internal(_) => "Something went wrong",
            ApiError::TooManyRequests => "Too many requests",
            ApiError::NotFound => "Resource not found",
        }
    }
}

impl From<digilocker_auth::Error> for ApiError {
    fn from(err: digilocker_auth::Error) -> Self {
        use digilocker_auth::Error as E;
        match err {
            E::Upstream { status, body } => ApiError::Upstream {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                body,
            },
            E::InvalidFileName(name) => ApiError::BadRequest(format!("invalid fileId {name:?}")),
            e @ (E::Http(_) | E::TokenExchange(_) | E::Decode(_)) => {
                ApiError::BadGateway(e.to_string())
            }
            e @ (E::InvalidVerifierLength(_) | E::InvalidUrl(_) | E::Io(_)) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = serde_json::json!({
            "status": status.as_u16(),
            "message": self.message(),
        });

        match &self {
            ApiError::Upstream { body: details, .. } => {
                warn!(status = status.as_u16(), "provider error passed through");
                body["details"] = serde_json::Value::String(details.clone());
            }
            ApiError::BadGateway(detail) | ApiError::Internal(detail) => {
                error!(status = status.as_u16(), error = %detail, "request failed");
            }
            ApiError::BadRequest(detail) => {
                warn!(error = %detail, "rejected request");
            }
            ApiError::Unauthorized | ApiError::TooManyRequests | ApiError::NotFound => {}
        }

        (status, Json(body)).into_response()
    }
}
