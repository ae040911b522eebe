use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use ibl_log::{LogConfig, SyncMode};
use serde::{Deserialize, Serialize};

/// File looked up in the data directory when `--config` is not given.
pub const CONFIG_FILE: &str = "ibl.toml";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IblConfig {
    /// Directory holding the snapshot and every partition log.
    pub data_dir: PathBuf,
    /// Snapshot file name, relative to `data_dir`.
    pub snapshot_file: String,
    pub sync_mode: SyncMode,
    /// `fsync` the snapshot before it replaces the previous one.
    pub fsync_snapshot: bool,
}

impl Default for IblConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            snapshot_file: "accounts_data.txt".into(),
            sync_mode: SyncMode::EveryWrite,
            fsync_snapshot: true,
        }
    }
}

impl IblConfig {
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid configuration")
    }

    /// Resolve the configuration for one invocation.
    ///
    /// An explicit `--config` file must exist. Otherwise `ibl.toml` in the
    /// data directory is used when present. `--data-dir` always wins over the
    /// file's `data_dir`.
    pub fn load(explicit: Option<&Path>, data_dir: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::read(path)?,
            None => {
                let candidate = data_dir.unwrap_or(Path::new(".")).join(CONFIG_FILE);
                if candidate.is_file() {
                    Self::read(&candidate)?
                } else {
                    Self::default()
                }
            }
        };
        if let Some(dir) = data_dir {
            config.data_dir = dir.to_path_buf();
        }
        Ok(config)
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.snapshot_file)
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            sync_mode: self.sync_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = IblConfig::default();
        assert_eq!(c.data_dir, PathBuf::from("."));
        assert_eq!(c.snapshot_path(), PathBuf::from("./accounts_data.txt"));
        assert_eq!(c.sync_mode, SyncMode::EveryWrite);
        assert!(c.fsync_snapshot);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = IblConfig::from_toml("sync_mode = \"os-default\"\n").unwrap();
        assert_eq!(c.sync_mode, SyncMode::OsDefault);
        assert_eq!(c.snapshot_file, "accounts_data.txt");
        assert!(c.fsync_snapshot);
    }

    #[test]
    fn unknown_sync_mode_is_rejected() {
        assert!(IblConfig::from_toml("sync_mode = \"sometimes\"\n").is_err());
    }

    #[test]
    fn data_dir_file_is_picked_up_and_flag_overrides() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "data_dir = \"/elsewhere\"\nsnapshot_file = \"ledger.txt\"\nfsync_snapshot = false\n",
        )
        .unwrap();

        let c = IblConfig::load(None, Some(dir.path())).unwrap();
        assert_eq!(c.data_dir, dir.path());
        assert_eq!(c.snapshot_path(), dir.path().join("ledger.txt"));
        assert!(!c.fsync_snapshot);
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(IblConfig::load(Some(&missing), None).is_err());
    }

    #[test]
    fn no_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = IblConfig::load(None, Some(dir.path())).unwrap();
        assert_eq!(c.data_dir, dir.path());
        assert_eq!(c.snapshot_file, "accounts_data.txt");
    }
}
