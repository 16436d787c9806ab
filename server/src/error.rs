use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use llm_core::LlmError;
use tts_core::{ConvertError, SynthesisError};

/// Closed error taxonomy surfaced by the API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("{0}")]
    Authentication(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("External API error from {service}: {message}")]
    ExternalApi { service: String, message: String },

    #[error("Audio conversion failed: {0}")]
    Conversion(#[from] ConvertError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with_details(
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ExternalApi { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Conversion(_)
            | ApiError::Database(_)
            | ApiError::Io(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::Authentication(_) => "AUTHENTICATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::RateLimited(_) => "RATE_LIMIT_ERROR",
            ApiError::ExternalApi { .. } => "EXTERNAL_API_ERROR",
            ApiError::Conversion(_) => "AUDIO_CONVERSION_ERROR",
            ApiError::Database(_) | ApiError::Io(_) | ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Structured error body returned to clients.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

fn is_production() -> bool {
    std::env::var("APP_ENV")
        .map(|v| v == "production")
        .unwrap_or(false)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let production = is_production();

        // 4xx are the caller's fault, 5xx are ours.
        if status.is_client_error() {
            tracing::warn!(code, status = status.as_u16(), "{self}");
        } else {
            tracing::error!(code, status = status.as_u16(), "{self}");
        }

        let message = if status.is_server_error() && production {
            "An unexpected error occurred".to_string()
        } else {
            self.to_string()
        };

        let details = match self {
            ApiError::Validation { details, .. } if !production => details,
            _ => None,
        };

        let body = Json(ErrorBody {
            error: message,
            code,
            status_code: status.as_u16(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<SynthesisError> for ApiError {
    fn from(err: SynthesisError) -> Self {
        match err {
            SynthesisError::RateLimited => {
                ApiError::RateLimited("OpenAI rate limit exceeded. Please try again later.".into())
            }
            other => ApiError::ExternalApi {
                service: "OpenAI".to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::RateLimited => {
                ApiError::RateLimited("OpenAI rate limit exceeded. Please try again later.".into())
            }
            other => ApiError::ExternalApi {
                service: "OpenAI".to_string(),
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_statuses_and_codes() {
        let cases: Vec<(ApiError, StatusCode, &str)> = vec![
            (
                ApiError::validation("bad input"),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                ApiError::Authentication("no session".into()),
                StatusCode::UNAUTHORIZED,
                "AUTHENTICATION_ERROR",
            ),
            (
                ApiError::NotFound("Generation".into()),
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
            ),
            (
                ApiError::RateLimited("slow down".into()),
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMIT_ERROR",
            ),
            (
                ApiError::ExternalApi {
                    service: "OpenAI".into(),
                    message: "quota".into(),
                },
                StatusCode::BAD_GATEWAY,
                "EXTERNAL_API_ERROR",
            ),
            (
                ApiError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status(), status);
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn upstream_rate_limit_keeps_429_kind() {
        let err: ApiError = SynthesisError::RateLimited.into();
        assert!(matches!(err, ApiError::RateLimited(_)));
        let err: ApiError = SynthesisError::QuotaExceeded.into();
        assert!(matches!(err, ApiError::ExternalApi { .. }));
    }
}
