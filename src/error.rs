use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Inconsistent history for {item_id}: {message}")]
    DataConsistency { item_id: String, message: String },

    #[error("Invalid timestamp: {0}")]
    TimestampParse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for per-item failures that exclude one item rather than
    /// aborting the run.
    pub fn is_item_level(&self) -> bool {
        matches!(self, Error::DataConsistency { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
