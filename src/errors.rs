use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::Serialize;
use tracing::{error, warn};

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// A fixed code/message pair surfaced to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorCode {
    pub code: i32,
    pub msg: &'static str,
}

/// Returned for every business or collaborator failure of the order module.
pub const SYSTEM_ERROR: ErrorCode = ErrorCode {
    code: 508001,
    msg: "system error",
};

/// Returned when no buyer session is attached to the request.
pub const UNAUTHORIZED: ErrorCode = ErrorCode {
    code: 401001,
    msg: "unauthorized",
};

/// Coarse classification used for logging only; clients never see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFoundOrConflict,
    System,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Purchase limit exceeded: {0}")]
    PurchaseLimitExceeded(String),

    #[error("Price mismatch: {0}")]
    PriceMismatch(String),

    #[error("Invalid payment channel: {0}")]
    InvalidPaymentChannel(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Duplicate request: {0}")]
    DuplicateRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

impl From<crate::cache::CacheError> for ServiceError {
    fn from(err: crate::cache::CacheError) -> Self {
        ServiceError::CacheError(err.to_string())
    }
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_)
            | Self::InsufficientStock(_)
            | Self::PurchaseLimitExceeded(_)
            | Self::PriceMismatch(_)
            | Self::InvalidPaymentChannel(_)
            | Self::Unauthorized(_) => ErrorKind::Validation,
            Self::NotFound(_) | Self::Conflict(_) | Self::DuplicateRequest(_) => {
                ErrorKind::NotFoundOrConflict
            }
            Self::DatabaseError(_)
            | Self::ExternalServiceError(_)
            | Self::Timeout(_)
            | Self::CacheError(_)
            | Self::InternalError(_) => ErrorKind::System,
        }
    }

    /// HTTP status for this error. Business errors are deliberately not
    /// mapped onto 4xx; only a missing session is.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Unauthorized(_) => UNAUTHORIZED,
            _ => SYSTEM_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    code: i32,
    msg: &'static str,
    data: Option<()>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let request_id = current_request_id().unwrap_or_default();
        match self.kind() {
            ErrorKind::System => {
                error!(error = %self, request_id = %request_id, "order request failed")
            }
            kind => {
                warn!(error = %self, ?kind, request_id = %request_id, "order request rejected")
            }
        }

        let code = self.error_code();
        let body = ErrorEnvelope {
            code: code.code,
            msg: code.msg,
            data: None,
        };
        (self.status_code(), Json(body)).into_response()
    }
}
