//! Error types for the daemon's connection and startup paths.
//!
//! Persistence errors never reach this layer: per the error-propagation
//! rules, lookup failures become empty reply fields and write failures are
//! logged and swallowed inside `dispatcher::dispatch` itself, so there is no
//! `DispatchError` type here — `dispatch` is infallible by design, not by
//! omission.

use thiserror::Error;

/// Fatal to a single connection; never fatal to the daemon.
#[derive(Debug, Error)]
pub enum ConnError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed request: {0}")]
    Parser(#[from] fixml_codec::ParserError),

    #[error("peer closed the connection")]
    Closed,
}

/// Fatal to the daemon as a whole.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot read config file {path:?}: {source}")]
    ReadConfig {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path:?}: {source}")]
    ParseConfig {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot open persistence backend: {0}")]
    Store(#[from] umpf_store::StoreError),

    #[error("cannot bind listener: {0}")]
    Bind(#[from] std::io::Error),
}
