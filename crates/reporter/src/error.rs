//! Reporter errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{sink} rejected {kind} document: {message}")]
    Rejected {
        sink: String,
        kind: String,
        message: String,
    },
}

pub type ReportResult<T> = Result<T, ReportError>;
