use thiserror::Error;

/// Errors produced by type construction and record decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid identifier {value:?}: {reason}")]
    InvalidIdentifier { value: String, reason: &'static str },

    #[error("invalid amount {0}: must be non-negative")]
    InvalidAmount(i64),

    #[error("malformed log record: {reason}")]
    MalformedLogRecord { reason: String },

    #[error("invalid transaction id: {0}")]
    InvalidTxnId(String),
}

impl TypeError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedLogRecord {
            reason: reason.into(),
        }
    }
}
