//! Store-level error type.

use thiserror::Error;

/// Everything that can go wrong between [`crate::Store::open`] and a single
/// persistence call.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("mysql error: {0}")]
    MySql(#[from] mysql::Error),

    #[error("unknown portfolio {0:?}")]
    UnknownPortfolio(String),

    #[error("unknown security {0:?}/{1:?}")]
    UnknownSecurity(String, String),

    #[error("no tag found for portfolio {0:?} at or before the requested instant")]
    NoTag(String),

    #[error("{0}")]
    Validation(#[from] fixml_types::ValidationError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
