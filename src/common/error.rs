//! Error types for regionmeta

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Directory Store Errors ===
    #[error("Meta store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Meta store error: {0}")]
    Store(String),

    #[error("Metadata corrupted: {0}")]
    MetadataCorrupted(String),

    #[cfg(feature = "rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    // === Retry Errors ===
    #[error("Gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        source: Box<Error>,
    },

    // === Registry Errors ===
    #[error("Putting into the meta scan queue was interrupted: {0}")]
    ScanQueueInterrupted(String),

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Can the failed operation be attempted again?
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::StoreUnavailable(_) | Error::Timeout(_)
        )
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::InvalidRegion(_) | Error::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Error::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Error::StoreUnavailable(_) | Error::RetriesExhausted { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}
