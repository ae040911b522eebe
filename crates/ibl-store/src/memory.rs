use std::sync::RwLock;

use crate::error::StoreResult;
use crate::ledger::Ledger;
use crate::snapshot;
use crate::traits::SnapshotStore;

/// In-memory snapshot store.
///
/// Holds the encoded snapshot text rather than a `Ledger` value, so loads
/// and saves go through the same codec as the file store.
pub struct InMemorySnapshotStore {
    text: RwLock<Option<String>>,
}

impl InMemorySnapshotStore {
    /// A store that has never been saved.
    pub fn new() -> Self {
        Self {
            text: RwLock::new(None),
        }
    }

    /// A store pre-seeded with `ledger`.
    pub fn with_ledger(ledger: &Ledger) -> Self {
        Self {
            text: RwLock::new(Some(snapshot::encode(ledger))),
        }
    }

    /// The raw snapshot text, if one was saved.
    pub fn raw(&self) -> Option<String> {
        self.text.read().expect("lock poisoned").clone()
    }

    /// Replace the raw snapshot text.
    pub fn set_raw(&self, text: impl Into<String>) {
        *self.text.write().expect("lock poisoned") = Some(text.into());
    }
}

impl Default for InMemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&self) -> StoreResult<Ledger> {
        match self.text.read().expect("lock poisoned").as_deref() {
            Some(text) => snapshot::decode(text),
            None => Ok(Ledger::new()),
        }
    }

    fn save(&self, ledger: &Ledger) -> StoreResult<()> {
        *self.text.write().expect("lock poisoned") = Some(snapshot::encode(ledger));
        Ok(())
    }
}

impl std::fmt::Debug for InMemorySnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let saved = self.text.read().map(|t| t.is_some()).unwrap_or(false);
        f.debug_struct("InMemorySnapshotStore")
            .field("saved", &saved)
            .finish()
    }
}
