//! Account table and snapshot storage for the Interbank Ledger.
//!
//! The [`Ledger`] is the authoritative account table. It is persisted
//! wholesale through a [`SnapshotStore`] after every committed phase; there
//! are no partial or delta writes.
//!
//! # Storage Backends
//!
//! - [`FileSnapshotStore`] -- one text file, replaced atomically on save
//! - [`InMemorySnapshotStore`] -- holds the encoded snapshot text for tests
//!
//! # Snapshot Format
//!
//! One line per account, whitespace-separated: `id partition balance`.

pub mod error;
pub mod file;
pub mod ledger;
pub mod memory;
pub mod snapshot;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::FileSnapshotStore;
pub use ledger::Ledger;
pub use memory::InMemorySnapshotStore;
pub use traits::SnapshotStore;
