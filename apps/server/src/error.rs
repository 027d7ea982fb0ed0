//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Shopkeep                               │
//! │                                                                         │
//! │  Handler → Result<Json<T>, ApiError>                                   │
//! │                                                                         │
//! │  ValidationError ──┐                                                   │
//! │  CoreError ────────┼──► ApiError { code, message } ──► HTTP status     │
//! │  DbError ──────────┤                                   + JSON body     │
//! │  MediaError ───────┤                                                   │
//! │  MailError ────────┘                                                   │
//! │                                                                         │
//! │  Internal details are logged, never returned to the client.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use shopkeep_core::{CoreError, ValidationError};
use shopkeep_db::DbError;
use tracing::{error, warn};

use crate::mailer::MailError;
use crate::media::MediaError;

/// Error body returned by every failing endpoint.
///
/// ```json
/// {
///   "code": "INSUFFICIENT_STOCK",
///   "message": "Insufficient stock for CAFE: available 2, requested 3"
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
    /// 400
    ValidationError,
    /// 422
    InsufficientStock,
    /// 422
    BusinessLogic,
    /// 409
    Conflict,
    /// 413
    PayloadTooLarge,
    /// 415
    UnsupportedMediaType,
    /// 500
    DatabaseError,
    /// 500
    Internal,
    /// 502
    UpstreamError,
    /// 503
    Unavailable,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::InsufficientStock | ErrorCode::BusinessLogic => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,
            ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
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

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => {
                ApiError::new(ErrorCode::Conflict, format!("{} '{}' already exists", field, value))
            }
            DbError::ForeignKeyViolation { message } => {
                warn!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::Conflict, "Invalid or still referenced record")
            }
            DbError::CheckViolation { message } => {
                warn!("Check constraint violated: {}", message);
                ApiError::validation("Value violates a data constraint")
            }
            DbError::Business(core) => core.into(),
            DbError::PoolExhausted => ApiError::new(ErrorCode::Unavailable, "Database is busy"),
            DbError::ConnectionFailed(e) | DbError::MigrationFailed(e) | DbError::QueryFailed(e) | DbError::Internal(e) => {
                error!("Database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => ApiError::not_found("Product", &id),
            err @ CoreError::InsufficientStock { .. } => {
                ApiError::new(ErrorCode::InsufficientStock, err.to_string())
            }
            CoreError::Validation(e) => e.into(),
            err @ (CoreError::InvalidDateRange(_)
            | CoreError::EmptyCart
            | CoreError::CartTooLarge { .. }
            | CoreError::QuantityTooLarge { .. }) => ApiError::validation(err.to_string()),
            err @ (CoreError::InvalidBasket(_) | CoreError::InvalidStatus { .. }) => {
                ApiError::new(ErrorCode::BusinessLogic, err.to_string())
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::TooLarge { .. } => ApiError::new(ErrorCode::PayloadTooLarge, err.to_string()),
            MediaError::UnsupportedType(_) => ApiError::new(ErrorCode::UnsupportedMediaType, err.to_string()),
            MediaError::NotFound(path) => ApiError::not_found("Media", &path),
            MediaError::InvalidPath(_) => ApiError::validation(err.to_string()),
            MediaError::Io(e) => {
                error!("Media storage error: {}", e);
                ApiError::internal("Media storage failed")
            }
        }
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        match err {
            MailError::NotConfigured | MailError::NoRecipients => {
                ApiError::new(ErrorCode::BusinessLogic, err.to_string())
            }
            MailError::Request(_) | MailError::Rejected { .. } => {
                error!("Email delivery failed: {}", err);
                ApiError::new(ErrorCode::UpstreamError, "Email provider request failed")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}
