use ibl_types::TypeError;

/// Errors produced by log stores.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// I/O error while appending to or reading a log file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded or decoded.
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Convenience alias used throughout the log crate.
pub type LogResult<T> = std::result::Result<T, LogError>;
