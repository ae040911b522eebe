//! Per-partition append-only logs for the Interbank Ledger.
//!
//! Every partition owns a pair of logs:
//! - the **response log**, one `UPDATE` record per committed balance change
//!   on an account of that partition;
//! - the **request log**, one `REQUEST` record per cross-partition transfer
//!   whose destination is in that partition.
//!
//! Records are never rewritten, compacted, or rotated. Reading a log that was
//! never written yields no records. Lines that fail to decode are reported
//! in the [`LogScan`] next to the good records instead of failing the read.

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{LogError, LogResult};
pub use file::{FileLogStore, LogConfig, SyncMode};
pub use memory::InMemoryLogStore;
pub use traits::{LogScan, LogStore, MalformedLine};
