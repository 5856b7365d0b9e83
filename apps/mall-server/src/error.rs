//! # Service and API Errors
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Service method                                                        │
//! │  ServiceResult<T>                                                       │
//! │        │                                                                │
//! │        ├── CoreError      (business rule)  ──┐                          │
//! │        ├── ProviderError  (signing)        ──┼──► ServiceError          │
//! │        └── DbError        (storage)        ──┘        │                 │
//! │                                                        ▼                │
//! │  HTTP handler ─────────────────────────────────► ApiError ──► JSON      │
//! │                                                  { code, message }      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Storage and signing failures are logged here and reported to clients
//! with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use mall_core::{CoreError, ProviderError, ValidationError};
use mall_db::DbError;

// =============================================================================
// Service Error
// =============================================================================

/// Everything a service operation can fail with.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Core(err.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// API Error
// =============================================================================

/// What HTTP clients receive when a request fails.
///
/// ```json
/// {
///   "code": "INSUFFICIENT_STOCK",
///   "message": "Insufficient stock for line 2 (Echo Buds, product:12): available 0, requested 1"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// 404
    NotFound,
    /// 403
    AccessDenied,
    /// 401, missing or malformed `X-User-Id`
    Unauthenticated,
    /// 400
    ValidationError,
    /// 409
    InsufficientStock,
    /// 409
    InvalidState,
    /// 409
    PaymentConflict,
    /// 400
    UnsupportedMethod,
    /// 502
    ProviderError,
    /// 500
    DatabaseError,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::AccessDenied => StatusCode::FORBIDDEN,
            ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorCode::ValidationError | ErrorCode::UnsupportedMethod => StatusCode::BAD_REQUEST,
            ErrorCode::InsufficientStock | ErrorCode::InvalidState | ErrorCode::PaymentConflict => {
                StatusCode::CONFLICT
            }
            ErrorCode::ProviderError => StatusCode::BAD_GATEWAY,
            ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unauthenticated, message)
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::UserNotFound(_)
            | CoreError::ProductNotFound(_)
            | CoreError::SkuNotFound(_)
            | CoreError::OrderNotFound(_)
            | CoreError::PaymentNotFound(_) => ErrorCode::NotFound,

            CoreError::AccessDenied { .. } => ErrorCode::AccessDenied,

            CoreError::UserInactive(_)
            | CoreError::ProductUnavailable { .. }
            | CoreError::SkuMismatch { .. }
            | CoreError::SkuUnavailable { .. }
            | CoreError::Validation(_) => ErrorCode::ValidationError,

            CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,

            CoreError::InvalidOrderStatus { .. }
            | CoreError::OrderNotPending { .. }
            | CoreError::NothingToPay { .. }
            | CoreError::InvalidPaymentStatus { .. } => ErrorCode::InvalidState,

            CoreError::AlreadyPaid { .. } | CoreError::PaymentInProgress { .. } => {
                ErrorCode::PaymentConflict
            }

            CoreError::UnsupportedMethod(_) => ErrorCode::UnsupportedMethod,
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        tracing::error!(error = %err, "Payment provider failure");
        ApiError::new(ErrorCode::ProviderError, "Payment provider request failed")
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => {
                ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", entity, id))
            }
            other => {
                // Log the actual error but return a generic message
                tracing::error!(error = %other, "Database operation failed");
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Core(e) => e.into(),
            ServiceError::Provider(e) => e.into(),
            ServiceError::Db(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

// =============================================================================
// Tests
// =============================================================================
