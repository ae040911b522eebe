//! Foundation types for the Interbank Ledger (IBL).
//!
//! This crate provides the identity, temporal, and record types shared by
//! every other IBL crate.
//!
//! # Key Types
//!
//! - [`AccountId`] / [`PartitionName`]: validated account and bank names
//! - [`Account`]: one row of the account table
//! - [`TxnId`] / [`TxnIdGenerator`]: `TXN<epochSeconds>_<counter>` identifiers
//! - [`Timestamp`]: local wall-clock time as written to the logs
//! - [`LogRecord`]: tagged `Update` / `Request` log record with its line codec

pub mod account;
pub mod error;
pub mod record;
pub mod temporal;
pub mod txn;

pub use account::{non_negative, Account, AccountId, PartitionName};
pub use error::TypeError;
pub use record::{Direction, LogKind, LogRecord, RequestRecord, UpdateRecord};
pub use temporal::Timestamp;
pub use txn::{TxnId, TxnIdGenerator};
