use ibl_types::{LogKind, LogRecord, PartitionName, RequestRecord, TxnId, UpdateRecord};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::LogResult;

/// A log line that could not be decoded and was skipped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedLine {
    pub partition: PartitionName,
    pub kind: LogKind,
    /// 1-based line number within the log.
    pub line_no: usize,
    /// The line as text; bytes that are not UTF-8 are replaced.
    pub content: String,
    pub reason: String,
}

impl MalformedLine {
    /// Transaction id of the line, if its first field is complete (followed
    /// by a comma) and parses.
    pub fn leading_txn_id(&self) -> Option<TxnId> {
        let (first, _) = self.content.split_once(',')?;
        first.parse().ok()
    }
}

/// Decoded contents of one log, in file order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogScan {
    pub partition: PartitionName,
    pub kind: LogKind,
    pub records: Vec<LogRecord>,
    pub malformed: Vec<MalformedLine>,
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

impl LogScan {
    /// Decode raw log bytes. Only newline-terminated lines are complete; a
    /// non-empty unterminated tail is a torn append and is reported as
    /// malformed. Lines that are not UTF-8 and records of the wrong kind for
    /// this log are malformed too.
    pub fn decode(partition: &PartitionName, kind: LogKind, raw: &[u8]) -> Self {
        let mut scan = Self {
            partition: partition.clone(),
            kind,
            records: Vec::new(),
            malformed: Vec::new(),
        };

        let mut segments: Vec<&[u8]> = raw.split(|b| *b == b'\n').collect();
        let tail = segments.pop().unwrap_or_default();

        for (index, line) in segments.iter().enumerate() {
            if !is_blank(line) {
                scan.decode_line(index + 1, line);
            }
        }
        if !is_blank(tail) {
            scan.reject(
                segments.len() + 1,
                tail,
                "torn write: missing line terminator".into(),
            );
        }
        scan
    }

    fn decode_line(&mut self, line_no: usize, raw: &[u8]) {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line,
            Err(e) => return self.reject(line_no, raw, format!("not valid UTF-8: {e}")),
        };
        match LogRecord::decode(line) {
            Ok(record) if record.kind() == self.kind => self.records.push(record),
            Ok(record) => {
                let reason = format!("{} record in {} log", record.kind(), self.kind);
                self.reject(line_no, raw, reason)
            }
            Err(e) => self.reject(line_no, raw, e.to_string()),
        }
    }

    fn reject(&mut self, line_no: usize, raw: &[u8], reason: String) {
        warn!(
            partition = %self.partition,
            log = %self.kind,
            line_no,
            %reason,
            "skipping malformed log line"
        );
        self.malformed.push(MalformedLine {
            partition: self.partition.clone(),
            kind: self.kind,
            line_no,
            content: String::from_utf8_lossy(raw).into_owned(),
            reason,
        });
    }

    /// Every transaction id the log mentions: those of decoded records, then
    /// those still readable at the start of malformed lines.
    pub fn mentioned_txn_ids(&self) -> impl Iterator<Item = TxnId> + '_ {
        self.records
            .iter()
            .map(LogRecord::txn_id)
            .chain(self.malformed.iter().filter_map(MalformedLine::leading_txn_id))
    }

    /// The `UPDATE` records of a response log.
    pub fn updates(&self) -> impl Iterator<Item = &UpdateRecord> {
        self.records.iter().filter_map(LogRecord::as_update)
    }

    /// The `REQUEST` records of a request log.
    pub fn requests(&self) -> impl Iterator<Item = &RequestRecord> {
        self.records.iter().filter_map(LogRecord::as_request)
    }
}

/// Append-only storage for every partition's response and request logs.
///
/// Implementations must satisfy:
/// - `append` routes [`LogRecord::Update`] to the response log and
///   [`LogRecord::Request`] to the request log of the given partition.
/// - An append is complete (flushed, and synced where configured) before it
///   returns.
/// - A log that was never written reads as empty, never as an error.
pub trait LogStore: Send + Sync {
    /// Append one record to `partition`'s log of the record's kind.
    fn append(&self, partition: &PartitionName, record: &LogRecord) -> LogResult<()>;

    /// The raw bytes of one log (empty if it does not exist).
    fn read_raw(&self, partition: &PartitionName, kind: LogKind) -> LogResult<Vec<u8>>;

    /// Read and decode one log, skipping malformed lines.
    fn scan(&self, partition: &PartitionName, kind: LogKind) -> LogResult<LogScan> {
        let raw = self.read_raw(partition, kind)?;
        Ok(LogScan::decode(partition, kind, &raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank() -> PartitionName {
        PartitionName::new("X").unwrap()
    }

    #[test]
    fn decode_skips_blank_lines() {
        let text = "\nTXN1_1,UPDATE,A,CREDIT,0,5,2024-05-01 12:00:00\n\n";
        let scan = LogScan::decode(&bank(), LogKind::Response, text.as_bytes());
        assert_eq!(scan.records.len(), 1);
        assert!(scan.malformed.is_empty());
    }

    #[test]
    fn decode_reports_line_numbers() {
        let text = "TXN1_1,UPDATE,A,CREDIT,0,5,2024-05-01 12:00:00\n\
                    junk\n\
                    TXN1_2,UPDATE,A,DEBIT,5,1,2024-05-01 12:00:00\n";
        let scan = LogScan::decode(&bank(), LogKind::Response, text.as_bytes());
        assert_eq!(scan.updates().count(), 2);
        assert_eq!(scan.malformed.len(), 1);
        assert_eq!(scan.malformed[0].line_no, 2);
        assert_eq!(scan.malformed[0].content, "junk");
    }

    #[test]
    fn unterminated_tail_is_torn() {
        let text = "TXN1_1,UPDATE,A,CREDIT,0,5,2024-05-01 12:00:00\nTXN1_2,UPDATE,A,DEBIT,5,1";
        let scan = LogScan::decode(&bank(), LogKind::Response, text.as_bytes());
        assert_eq!(scan.records.len(), 1);
        assert_eq!(scan.malformed.len(), 1);
        assert_eq!(scan.malformed[0].line_no, 2);
        assert!(scan.malformed[0].reason.contains("torn"));
    }

    #[test]
    fn wrong_kind_is_malformed() {
        let text = "TXN1_1,REQUEST,A,B,4,2024-05-01 12:00:00\n";
        let scan = LogScan::decode(&bank(), LogKind::Response, text.as_bytes());
        assert!(scan.records.is_empty());
        assert_eq!(scan.malformed.len(), 1);

        let scan = LogScan::decode(&bank(), LogKind::Request, text.as_bytes());
        assert_eq!(scan.requests().count(), 1);
    }

    #[test]
    fn empty_text_scans_empty() {
        let scan = LogScan::decode(&bank(), LogKind::Request, b"");
        assert!(scan.records.is_empty());
        assert!(scan.malformed.is_empty());
    }

    #[test]
    fn non_utf8_line_is_malformed_not_fatal() {
        let raw = b"TXN1_1,UPDATE,A,CREDIT,0,5,2024-05-01 12:00:00\n\xff\xfe garbage\n\
                    TXN1_2,UPDATE,A,DEBIT,5,1,2024-05-01 12:00:00\n";
        let scan = LogScan::decode(&bank(), LogKind::Response, raw);
        assert_eq!(scan.updates().count(), 2);
        assert_eq!(scan.malformed.len(), 1);
        assert_eq!(scan.malformed[0].line_no, 2);
        assert!(scan.malformed[0].reason.contains("UTF-8"));
        assert!(scan.malformed[0].content.ends_with(" garbage"));
    }

    #[test]
    fn torn_line_keeps_its_transaction_id() {
        let text = "TXN9_4,UPDATE,B,CREDIT,\nTXN9_5\n";
        let scan = LogScan::decode(&bank(), LogKind::Response, text.as_bytes());
        assert!(scan.records.is_empty());
        assert_eq!(scan.malformed[0].leading_txn_id(), Some(TxnId::new(9, 4)));
        assert_eq!(scan.malformed[1].leading_txn_id(), None);
        let ids: Vec<TxnId> = scan.mentioned_txn_ids().collect();
        assert_eq!(ids, vec![TxnId::new(9, 4)]);
    }
}
