use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Fetch did not complete within {0:?}")]
    FetchTimeout(Duration),

    #[error("Incomplete download: got {received} of {expected} bytes")]
    IncompleteDownload { received: u64, expected: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot read cached descriptor {path}: {source}")]
    CacheRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("An update check is already in flight")]
    CheckInFlight,
}

pub type Result<T> = std::result::Result<T, Error>;
