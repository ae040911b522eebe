use std::collections::HashMap;
use std::sync::RwLock;

use ibl_types::{LogKind, LogRecord, PartitionName};

use crate::error::LogResult;
use crate::traits::LogStore;

/// In-memory log store for tests and embedding.
///
/// Each log is kept as its raw bytes so tests can inject torn, malformed or
/// non-UTF-8 lines with [`InMemoryLogStore::push_raw`].
pub struct InMemoryLogStore {
    logs: RwLock<HashMap<(PartitionName, LogKind), Vec<u8>>>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self {
            logs: RwLock::new(HashMap::new()),
        }
    }

    /// Append raw bytes to a log, exactly as given.
    pub fn push_raw(&self, partition: &PartitionName, kind: LogKind, raw: impl AsRef<[u8]>) {
        self.logs
            .write()
            .expect("lock poisoned")
            .entry((partition.clone(), kind))
            .or_default()
            .extend_from_slice(raw.as_ref());
    }

    /// Number of complete records currently in one log.
    pub fn line_count(&self, partition: &PartitionName, kind: LogKind) -> usize {
        self.logs
            .read()
            .expect("lock poisoned")
            .get(&(partition.clone(), kind))
            .map(|raw| non_blank_lines(raw))
            .unwrap_or(0)
    }

    /// Total number of lines across every log.
    pub fn total_lines(&self) -> usize {
        self.logs
            .read()
            .expect("lock poisoned")
            .values()
            .map(|raw| non_blank_lines(raw))
            .sum()
    }
}

fn non_blank_lines(raw: &[u8]) -> usize {
    raw.split(|b| *b == b'\n')
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .count()
}

impl Default for InMemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogStore for InMemoryLogStore {
    fn append(&self, partition: &PartitionName, record: &LogRecord) -> LogResult<()> {
        let mut logs = self.logs.write().expect("lock poisoned");
        let raw = logs.entry((partition.clone(), record.kind())).or_default();
        if raw.last().is_some_and(|b| *b != b'\n') {
            raw.push(b'\n');
        }
        raw.extend_from_slice(record.encode().as_bytes());
        raw.push(b'\n');
        Ok(())
    }

    fn read_raw(&self, partition: &PartitionName, kind: LogKind) -> LogResult<Vec<u8>> {
        Ok(self
            .logs
            .read()
            .expect("lock poisoned")
            .get(&(partition.clone(), kind))
            .cloned()
            .unwrap_or_default())
    }
}

impl std::fmt::Debug for InMemoryLogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLogStore")
            .field("lines", &self.total_lines())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibl_types::{AccountId, RequestRecord, TxnId};

    fn bank() -> PartitionName {
        PartitionName::new("Y").unwrap()
    }

    fn request() -> LogRecord {
        LogRecord::Request(RequestRecord {
            txn_id: TxnId::new(5, 1),
            from: AccountId::new("A").unwrap(),
            to: AccountId::new("B").unwrap(),
            amount: 40,
            timestamp: "2024-05-01 12:00:00".parse().unwrap(),
        })
    }

    #[test]
    fn append_and_scan() {
        let logs = InMemoryLogStore::new();
        logs.append(&bank(), &request()).unwrap();
        assert_eq!(logs.line_count(&bank(), LogKind::Request), 1);
        assert_eq!(logs.line_count(&bank(), LogKind::Response), 0);
        let scan = logs.scan(&bank(), LogKind::Request).unwrap();
        assert_eq!(scan.records, vec![request()]);
    }

    #[test]
    fn push_raw_injects_malformed_lines() {
        let logs = InMemoryLogStore::new();
        logs.push_raw(&bank(), LogKind::Request, "TXN5_9,REQUEST,A,B\n");
        logs.append(&bank(), &request()).unwrap();
        let scan = logs.scan(&bank(), LogKind::Request).unwrap();
        assert_eq!(scan.records.len(), 1);
        assert_eq!(scan.malformed.len(), 1);
        assert_eq!(logs.total_lines(), 2);
    }

    #[test]
    fn append_repairs_torn_tail() {
        let logs = InMemoryLogStore::new();
        logs.push_raw(&bank(), LogKind::Request, "TXN5_9,REQ");
        logs.append(&bank(), &request()).unwrap();
        let scan = logs.scan(&bank(), LogKind::Request).unwrap();
        assert_eq!(scan.records, vec![request()]);
        assert_eq!(scan.malformed.len(), 1);
    }

    #[test]
    fn non_utf8_line_is_reported() {
        let logs = InMemoryLogStore::new();
        logs.push_raw(&bank(), LogKind::Request, b"\xff\xfe garbage\n");
        logs.append(&bank(), &request()).unwrap();
        let scan = logs.scan(&bank(), LogKind::Request).unwrap();
        assert_eq!(scan.records, vec![request()]);
        assert_eq!(scan.malformed.len(), 1);
        assert_eq!(scan.malformed[0].line_no, 1);
    }
}
