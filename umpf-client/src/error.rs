//! Client-side error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot connect to host {host}")]
    Connect { host: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed reply: {0}")]
    Parser(#[from] fixml_codec::ParserError),

    #[error("server reply timed out")]
    Timeout,

    #[error("invalid date/time value: {0}")]
    BadDate(String),

    #[error("{0}")]
    Validation(#[from] fixml_types::ValidationError),

    #[error("{0}")]
    Usage(String),
}
