use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use ibl_types::{LogKind, LogRecord, PartitionName};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LogResult;
use crate::traits::LogStore;

/// Flush/sync strategy for log appends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// `fsync` after every append (safest, highest latency).
    #[default]
    EveryWrite,
    /// Flush to the OS and rely on its page cache.
    OsDefault,
}

/// Configuration for file-backed logs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    pub sync_mode: SyncMode,
}

/// Log pairs stored as `<partition>_respond.csv` and `<partition>_request.csv`
/// in one directory.
#[derive(Clone, Debug)]
pub struct FileLogStore {
    dir: PathBuf,
    config: LogConfig,
}

impl FileLogStore {
    /// Open (creating if needed) the log directory.
    pub fn open(dir: impl Into<PathBuf>, config: LogConfig) -> LogResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, config })
    }

    /// Path of one log file.
    pub fn path_for(&self, partition: &PartitionName, kind: LogKind) -> PathBuf {
        self.dir
            .join(format!("{}_{}.csv", partition, kind.file_suffix()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Whether the file's last byte is something other than a newline, i.e. the
/// previous append was torn and the next record needs its own line.
fn ends_mid_line(file: &mut File) -> io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

impl LogStore for FileLogStore {
    fn append(&self, partition: &PartitionName, record: &LogRecord) -> LogResult<()> {
        let path = self.path_for(partition, record.kind());
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let mut line = String::new();
        if ends_mid_line(&mut file)? {
            line.push('\n');
        }
        line.push_str(&record.encode());
        line.push('\n');

        file.write_all(line.as_bytes())?;
        file.flush()?;
        if matches!(self.config.sync_mode, SyncMode::EveryWrite) {
            file.sync_data()?;
        }

        debug!(path = %path.display(), txn = %record.txn_id(), "log append");
        Ok(())
    }

    fn read_raw(&self, partition: &PartitionName, kind: LogKind) -> LogResult<Vec<u8>> {
        match fs::read(self.path_for(partition, kind)) {
            Ok(raw) => Ok(raw),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}
