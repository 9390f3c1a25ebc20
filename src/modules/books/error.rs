use libris_http::error::AppError;
use serde_json::json;
use thiserror::Error;

use super::store::StoreError;

/// Error taxonomy for catalog operations.
///
/// `Validation` and `DuplicateIsbn` are kept distinct so callers can tell
/// "bad input shape" apart from "input collides with existing data".
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    NotFound(String),

    #[error("invalid value for field '{field}': {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("isbn already in use: {isbn}")]
    DuplicateIsbn { isbn: String },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl CatalogError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateIsbn { isbn } => Self::DuplicateIsbn { isbn },
            other => Self::Store(anyhow::Error::new(other)),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(message) => AppError::not_found(message),
            CatalogError::Validation { field, reason } => AppError::validation(
                vec![json!({"field": field, "error": reason})],
                "request contained an invalid field value",
            ),
            CatalogError::DuplicateIsbn { isbn } => AppError::conflict(
                vec![json!({"field": "isbn", "value": isbn})],
                format!("isbn already in use: {isbn}"),
            ),
            CatalogError::Store(e) => AppError::Internal(e),
        }
    }
}
