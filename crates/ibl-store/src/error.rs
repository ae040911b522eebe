use ibl_types::{AccountId, TypeError};

/// Errors from account table and snapshot operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No account with the given id exists.
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// An account with the given id already exists.
    #[error("account already exists: {0}")]
    DuplicateAccount(AccountId),

    /// A balance was negative.
    #[error("invalid amount {0}: balances must be non-negative")]
    InvalidAmount(i64),

    /// The persisted snapshot could not be decoded.
    #[error("corrupt snapshot at line {line}: {reason}")]
    CorruptSnapshot { line: usize, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid identifier or value.
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
