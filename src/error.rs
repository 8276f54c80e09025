use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors for a pipeline run. Geocoder soft misses (ZERO_RESULTS) are
/// not errors; the client reports them as `Ok(None)`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to read source file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("geocoder returned status {status:?}")]
    GeocodeHardFailure { status: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to load mac overlay from {path:?}: {reason}")]
    OverlayLoad { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
