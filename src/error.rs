use thiserror::Error;

/// Errors surfaced by the history store and the live-store collaborator.
///
/// Both store variants carry the offending identifier so log lines point at
/// the record that failed, not just the driver message.
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Store write failed for '{0}': {1}")]
    StoreWrite(String, String),

    #[error("Store read failed for '{0}': {1}")]
    StoreRead(String, String),

    #[error("Store connection failed: {0}")]
    Connection(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, HistoryError>;
