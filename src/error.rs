use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::models::{ErrorResponse, SignalKind};
use crate::services::StoreError;

/// What a client should do after a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAdvice {
    /// Fix the request before sending it again
    FixInput,
    /// Transient; retry with backoff
    RetryLater,
    /// Route the user to profile completion
    CompleteProfile,
    /// Retrying will not help
    None,
}

impl RetryAdvice {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryAdvice::FixInput => "fix_input",
            RetryAdvice::RetryLater => "retry_later",
            RetryAdvice::CompleteProfile => "complete_profile",
            RetryAdvice::None => "none",
        }
    }
}

/// Service-level error taxonomy
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("A user cannot signal themselves")]
    InvalidSelfAction,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflicting signal: a {existing} already exists for this user")]
    ConflictingSignal { existing: SignalKind },

    #[error("Profile is {percentage}% complete, {required}% required")]
    ProfileIncomplete { percentage: u8, required: u8 },

    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Dependency timed out: {0}")]
    DependencyTimeout(String),
}

impl AppError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::InvalidSelfAction => "invalid_self_action",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::ConflictingSignal { .. } => "conflicting_signal",
            AppError::ProfileIncomplete { .. } => "profile_incomplete",
            AppError::DependencyUnavailable(_) => "dependency_unavailable",
            AppError::DependencyTimeout(_) => "dependency_timeout",
        }
    }

    pub fn retry_advice(&self) -> RetryAdvice {
        match self {
            AppError::Validation(_) | AppError::InvalidSelfAction => RetryAdvice::FixInput,
            AppError::ProfileIncomplete { .. } => RetryAdvice::CompleteProfile,
            AppError::DependencyTimeout(_) | AppError::DependencyUnavailable(_) => {
                RetryAdvice::RetryLater
            }
            AppError::Unauthorized(_)
            | AppError::Forbidden(_)
            | AppError::NotFound(_)
            | AppError::ConflictingSignal { .. } => RetryAdvice::None,
        }
    }

    /// Whether the failure is transient and the request may be replayed unchanged
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::DependencyUnavailable(_) | AppError::DependencyTimeout(_)
        )
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::ProfileIncomplete { percentage, required } => Some(json!({
                "percentage": percentage,
                "required": required,
            })),
            AppError::ConflictingSignal { existing } => Some(json!({ "existing": existing })),
            _ => None,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout { operation, after_ms } => {
                AppError::DependencyTimeout(format!("{} after {}ms", operation, after_ms))
            }
            other => AppError::DependencyUnavailable(other.to_string()),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidSelfAction => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ConflictingSignal { .. } => StatusCode::CONFLICT,
            AppError::ProfileIncomplete { .. } => StatusCode::PRECONDITION_FAILED,
            AppError::DependencyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DependencyTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
            status_code: status.as_u16(),
            retry: self.retry_advice().as_str().to_string(),
            details: self.details(),
        })
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::InvalidSelfAction.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::ConflictingSignal { existing: SignalKind::Pass }.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::ProfileIncomplete { percentage: 40, required: 60 }.status_code(),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            AppError::DependencyTimeout("x".into()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_retry_advice_distinguishes_classes() {
        assert_eq!(AppError::Validation("x".into()).retry_advice(), RetryAdvice::FixInput);
        assert_eq!(
            AppError::DependencyUnavailable("db".into()).retry_advice(),
            RetryAdvice::RetryLater
        );
        assert_eq!(
            AppError::DependencyTimeout("db".into()).retry_advice(),
            RetryAdvice::RetryLater
        );
        assert_eq!(
            AppError::DependencyTimeout("db".into()).error_response().status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert!(AppError::DependencyTimeout("db".into()).is_transient());
        assert!(!AppError::NotFound("c".into()).is_transient());
    }

    #[test]
    fn test_store_timeout_maps_to_dependency_timeout() {
        let err: AppError = StoreError::Timeout { operation: "get_profile", after_ms: 3000 }.into();
        assert!(matches!(err, AppError::DependencyTimeout(_)));

        let err: AppError = StoreError::Unavailable("connection refused".into()).into();
        assert!(matches!(err, AppError::DependencyUnavailable(_)));
    }

    #[test]
    fn test_profile_incomplete_details() {
        let err = AppError::ProfileIncomplete { percentage: 40, required: 60 };
        let details = err.details().unwrap();
        assert_eq!(details["percentage"], 40);
        assert_eq!(details["required"], 60);
    }
}
