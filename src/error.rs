use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Crate-wide error taxonomy. Variants map 1:1 onto the surface codes in
/// the error-handling design: callers match on `kind()`, HTTP handlers
/// translate straight to a status code, nothing else leaks a Rust type name
/// across a service boundary.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("unauthorized: {0}")]
    Auth(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("bridge unreachable: {0}")]
    BridgeUnreachable(String),

    #[error("bridge session already connected")]
    AlreadyConnected,

    #[error("bridge session not connected")]
    NotConnected,

    #[error("llm auth error: {0}")]
    ProviderAuth(String),

    #[error("llm rate limited: {0}")]
    ProviderRateLimited(String),

    #[error("llm unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("llm request invalid: {0}")]
    ProviderInvalidRequest(String),

    #[error("llm call timed out")]
    ProviderTimeout,

    #[error("crypto error")]
    Crypto,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::NotFound => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::RateLimited(_) => "rate_limited",
            AppError::Auth(_) => "auth",
            AppError::StorageUnavailable(_) => "storage_unavailable",
            AppError::BridgeUnreachable(_) => "bridge_unreachable",
            AppError::AlreadyConnected => "already_connected",
            AppError::NotConnected => "not_connected",
            AppError::ProviderAuth(_) => "provider_auth",
            AppError::ProviderRateLimited(_) => "provider_rate_limited",
            AppError::ProviderUnavailable(_) => "provider_unavailable",
            AppError::ProviderInvalidRequest(_) => "provider_invalid_request",
            AppError::ProviderTimeout => "provider_timeout",
            AppError::Crypto => "crypto_error",
            AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::BridgeUnreachable(_) => StatusCode::BAD_GATEWAY,
            AppError::AlreadyConnected => StatusCode::CONFLICT,
            AppError::NotConnected => StatusCode::CONFLICT,
            AppError::ProviderAuth(_) => StatusCode::BAD_GATEWAY,
            AppError::ProviderRateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::ProviderInvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ProviderTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Crypto => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => AppError::NotFound,
            diesel::result::Error::DatabaseError(diesel::result::DatabaseErrorKind::UniqueViolation, info) => {
                AppError::Conflict(info.message().to_string())
            }
            other => AppError::StorageUnavailable(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for AppError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        AppError::StorageUnavailable(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // validation errors are routine client mistakes, never logged as an error
        match &self {
            AppError::Auth(msg) => tracing::warn!(kind = self.kind(), %msg, "auth failure"),
            AppError::Validation(_) => {}
            _ => tracing::error!(kind = self.kind(), "{}", self),
        }

        let production = std::env::var("ENVIRONMENT").as_deref() == Ok("production");
        let body = if matches!(self, AppError::Internal(_)) && production {
            json!({ "error": "internal_error" })
        } else {
            json!({ "error": self.kind(), "message": self.to_string() })
        };

        (self.status(), Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
