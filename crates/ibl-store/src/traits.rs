use crate::error::StoreResult;
use crate::ledger::Ledger;

/// Whole-table persistence for the [`Ledger`].
///
/// Implementations must satisfy:
/// - `save` replaces the prior snapshot as one unit; a reader never observes
///   a partially written table.
/// - `load` on a store that was never saved yields an empty ledger.
/// - All I/O errors are propagated, never silently ignored.
pub trait SnapshotStore: Send + Sync {
    /// Reconstruct the account table from the last saved snapshot.
    fn load(&self) -> StoreResult<Ledger>;

    /// Persist the entire table, replacing prior content.
    fn save(&self, ledger: &Ledger) -> StoreResult<()>;
}
