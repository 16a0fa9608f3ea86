use thiserror::Error;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to load activities: {0}")]
    FetchFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TallyError>;
