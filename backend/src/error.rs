use axum::{http::StatusCode, Json};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("{0}")]
    Validation(String),

    #[error("Child not found: {0}")]
    ChildNotFound(String),

    #[error("Credential not found: {0}")]
    CredentialNotFound(Uuid),

    #[error("Credential {0} has no attachment")]
    AttachmentNotFound(Uuid),

    #[error("Transaction not found on ledger: {0}")]
    TransactionNotFound(String),

    #[error("Ledger network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Anchor transaction was not confirmed: {0}")]
    SubmissionFailed(String),

    #[error("No issuing account is configured for anchoring")]
    IssuerNotConfigured,

    #[error("Invalid or expired view token")]
    InvalidToken,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

impl From<sqlx::Error> for RegistryError {
    fn from(e: sqlx::Error) -> Self {
        RegistryError::Storage(e.to_string())
    }
}

impl RegistryError {
    pub fn status(&self) -> StatusCode {
        match self {
            RegistryError::Validation(_) => StatusCode::BAD_REQUEST,
            RegistryError::ChildNotFound(_)
            | RegistryError::CredentialNotFound(_)
            | RegistryError::AttachmentNotFound(_)
            | RegistryError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::NetworkUnavailable(_) | RegistryError::SubmissionFailed(_) => {
                StatusCode::BAD_GATEWAY
            }
            RegistryError::IssuerNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            RegistryError::InvalidToken => StatusCode::UNAUTHORIZED,
            RegistryError::Storage(_) | RegistryError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Handler-side rendering: `{ "error": "<message>" }` with the mapped status.
pub fn error_response(e: RegistryError) -> (StatusCode, Json<Value>) {
    if e.status() == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("request failed: {e}");
    }
    (e.status(), Json(json!({ "error": e.to_string() })))
}
