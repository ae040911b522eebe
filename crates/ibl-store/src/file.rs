use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StoreResult;
use crate::ledger::Ledger;
use crate::snapshot;
use crate::traits::SnapshotStore;

/// Snapshot kept in a single text file.
///
/// Saves write the full table to a temporary file in the same directory,
/// flush (and optionally fsync) it, then rename it over the target, so an
/// interruption mid-save leaves either the old or the new snapshot.
#[derive(Clone, Debug)]
pub struct FileSnapshotStore {
    path: PathBuf,
    fsync: bool,
}

impl FileSnapshotStore {
    /// A store at `path` that fsyncs every save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fsync: true,
        }
    }

    /// Toggle fsync before rename.
    pub fn with_fsync(mut self, fsync: bool) -> Self {
        self.fsync = fsync;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> StoreResult<Ledger> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot; starting empty");
                return Ok(Ledger::new());
            }
            Err(e) => return Err(e.into()),
        };
        let ledger = snapshot::decode(&text)?;
        debug!(path = %self.path.display(), accounts = ledger.len(), "snapshot loaded");
        Ok(ledger)
    }

    fn save(&self, ledger: &Ledger) -> StoreResult<()> {
        let dir = self.dir();
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(snapshot::encode(ledger).as_bytes())?;
        tmp.flush()?;
        if self.fsync {
            tmp.as_file().sync_all()?;
        }
        tmp.persist(&self.path).map_err(|e| e.error)?;

        debug!(path = %self.path.display(), accounts = ledger.len(), "snapshot saved");
        Ok(())
    }
}
