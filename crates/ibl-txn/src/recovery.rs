//! Two-pass crash recovery.
//!
//! 1. **Replay**: every `UPDATE` record of every partition's response log is
//!    applied in file order, each setting its account's balance to
//!    `balance_after`. The last record per account wins.
//! 2. **Undo**: in every partition, a `REQUEST` record whose transaction is
//!    not mentioned by any line of that same partition's response log
//!    (including malformed lines whose txn id field survived) is a transfer
//!    whose debit committed and whose credit never did. The amount is refunded to the
//!    source account and a compensating `CREDIT` record, carrying the
//!    original transaction id, is appended to the source partition's
//!    response log. Requests that already have a compensating record are
//!    left alone, so a refund happens at most once.
//!
//! The ledger is saved only when pass 2 refunded something.

use std::collections::{BTreeMap, HashSet};

use ibl_log::{LogScan, LogStore, MalformedLine};
use ibl_store::{Ledger, SnapshotStore};
use ibl_types::{
    AccountId, Direction, LogKind, LogRecord, PartitionName, Timestamp, TxnId, UpdateRecord,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{TxnError, TxnResult};

/// One refunded transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rollback {
    pub txn_id: TxnId,
    /// Source account that was refunded.
    pub account: AccountId,
    pub amount: u64,
    /// Partition whose request log held the unanswered request.
    pub destination: PartitionName,
}

/// Counters from the replay pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayStats {
    /// Update records applied to an account.
    pub applied: usize,
    /// Update records naming an account the ledger does not have.
    pub skipped_unknown: usize,
}

/// Result of a recovery run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryReport {
    /// The reconciled ledger.
    pub ledger: Ledger,
    pub replay: ReplayStats,
    /// Every log line skipped because it did not decode.
    pub malformed: Vec<MalformedLine>,
    pub rollbacks: Vec<Rollback>,
    /// Whether the reconciled ledger was saved.
    pub persisted: bool,
}

impl RecoveryReport {
    pub fn rollback_count(&self) -> usize {
        self.rollbacks.len()
    }
}

/// Replays partition logs against the last snapshot and refunds incomplete
/// cross-partition transfers.
pub struct RecoveryEngine;

impl RecoveryEngine {
    /// Load the snapshot, run both passes, and save if anything was refunded.
    pub fn recover<S: SnapshotStore, L: LogStore>(
        snapshots: &S,
        logs: &L,
    ) -> TxnResult<RecoveryReport> {
        let mut ledger = snapshots.load()?;
        let partitions = ledger.partitions();
        info!(accounts = ledger.len(), partitions = partitions.len(), "recovery started");

        let mut malformed = Vec::new();
        let mut responses = BTreeMap::new();
        for partition in &partitions {
            let scan = logs.scan(partition, LogKind::Response)?;
            malformed.extend(scan.malformed.iter().cloned());
            responses.insert(partition.clone(), scan);
        }

        let replay = Self::replay(&mut ledger, responses.values());
        debug!(applied = replay.applied, skipped = replay.skipped_unknown, "replay pass done");

        let mut requests = BTreeMap::new();
        for partition in &partitions {
            let scan = logs.scan(partition, LogKind::Request)?;
            malformed.extend(scan.malformed.iter().cloned());
            requests.insert(partition.clone(), scan);
        }

        let rollbacks = Self::undo_incomplete(&mut ledger, logs, &responses, &requests)?;

        let persisted = !rollbacks.is_empty();
        if persisted {
            snapshots.save(&ledger)?;
            info!(rolled_back = rollbacks.len(), "recovery complete; ledger saved");
        } else {
            info!("recovery complete; no incomplete transactions");
        }

        Ok(RecoveryReport {
            ledger,
            replay,
            malformed,
            rollbacks,
            persisted,
        })
    }

    /// Pass 1: apply every update record, in order, to the ledger.
    pub fn replay<'a>(
        ledger: &mut Ledger,
        scans: impl IntoIterator<Item = &'a LogScan>,
    ) -> ReplayStats {
        let mut stats = ReplayStats::default();
        for scan in scans {
            for update in scan.updates() {
                match ledger.mutate_balance(&update.account, update.balance_after) {
                    Ok(()) => stats.applied += 1,
                    Err(_) => {
                        debug!(txn = %update.txn_id, account = %update.account, "update for unknown account");
                        stats.skipped_unknown += 1;
                    }
                }
            }
        }
        stats
    }

    /// Pass 2: refund requests with no response in their destination
    /// partition and no compensation record in their source partition.
    pub fn undo_incomplete<L: LogStore>(
        ledger: &mut Ledger,
        logs: &L,
        responses: &BTreeMap<PartitionName, LogScan>,
        requests: &BTreeMap<PartitionName, LogScan>,
    ) -> TxnResult<Vec<Rollback>> {
        // (partition, txn, account) of every credit already on record; a
        // compensation is a credit to the request's source, in the source's
        // partition, under the request's txn id.
        let mut credited: HashSet<(PartitionName, TxnId, AccountId)> = responses
            .iter()
            .flat_map(|(partition, scan)| scan.updates().map(move |u| (partition, u)))
            .filter(|(_, u)| u.direction == Direction::Credit)
            .map(|(partition, u)| (partition.clone(), u.txn_id, u.account.clone()))
            .collect();

        let mut rollbacks = Vec::new();
        for (destination, scan) in requests {
            // A response line torn after its txn id still marks the credit as
            // attempted: its snapshot save precedes the append.
            let responded: HashSet<TxnId> = responses
                .get(destination)
                .map(|r| r.mentioned_txn_ids().collect())
                .unwrap_or_default();

            for request in scan.requests() {
                if responded.contains(&request.txn_id) {
                    continue;
                }
                let Some(source) = ledger.get(&request.from) else {
                    warn!(txn = %request.txn_id, account = %request.from, "source of incomplete transfer not found");
                    continue;
                };
                let source_partition = source.partition.clone();
                let key = (source_partition.clone(), request.txn_id, request.from.clone());
                if credited.contains(&key) {
                    debug!(txn = %request.txn_id, "request already compensated");
                    continue;
                }

                let before = source.balance;
                let after = before
                    .checked_add(request.amount)
                    .ok_or_else(|| TxnError::BalanceOverflow {
                        account: request.from.clone(),
                        balance: before,
                        amount: request.amount,
                    })?;
                let record = LogRecord::Update(UpdateRecord {
                    txn_id: request.txn_id,
                    account: request.from.clone(),
                    direction: Direction::Credit,
                    balance_before: before,
                    balance_after: after,
                    timestamp: Timestamp::now(),
                });
                logs.append(&source_partition, &record)?;
                ledger.mutate_balance(&request.from, after)?;
                credited.insert(key);

                warn!(
                    txn = %request.txn_id,
                    account = %request.from,
                    amount = request.amount,
                    "rolled back incomplete transfer"
                );
                rollbacks.push(Rollback {
                    txn_id: request.txn_id,
                    account: request.from.clone(),
                    amount: request.amount,
                    destination: destination.clone(),
                });
            }
        }
        Ok(rollbacks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibl_log::InMemoryLogStore;
    use ibl_store::InMemorySnapshotStore;
    use ibl_types::RequestRecord;

    fn id(s: &str) -> AccountId {
        AccountId::new(s).unwrap()
    }

    fn bank(s: &str) -> PartitionName {
        PartitionName::new(s).unwrap()
    }

    fn ts() -> Timestamp {
        "2024-05-01 12:00:00".parse().unwrap()
    }

    fn update(counter: u64, account: &str, direction: Direction, before: u64, after: u64) -> LogRecord {
        LogRecord::Update(UpdateRecord {
            txn_id: TxnId::new(1, counter),
            account: id(account),
            direction,
            balance_before: before,
            balance_after: after,
            timestamp: ts(),
        })
    }

    fn request(counter: u64, from: &str, to: &str, amount: u64) -> LogRecord {
        LogRecord::Request(RequestRecord {
            txn_id: TxnId::new(1, counter),
            from: id(from),
            to: id(to),
            amount,
            timestamp: ts(),
        })
    }

    /// Snapshot with A (X, 100) and B (Y, 10).
    fn stores() -> (InMemorySnapshotStore, InMemoryLogStore) {
        let mut ledger = Ledger::new();
        ledger.create_account(id("A"), bank("X"), 100).unwrap();
        ledger.create_account(id("B"), bank("Y"), 10).unwrap();
        (InMemorySnapshotStore::with_ledger(&ledger), InMemoryLogStore::new())
    }

    fn balance(report: &RecoveryReport, s: &str) -> u64 {
        report.ledger.lookup(&id(s)).unwrap().balance
    }

    #[test]
    fn empty_logs_change_nothing() {
        let (snapshots, logs) = stores();
        let report = RecoveryEngine::recover(&snapshots, &logs).unwrap();
        assert_eq!(balance(&report, "A"), 100);
        assert_eq!(report.rollback_count(), 0);
        assert!(!report.persisted);
    }

    #[test]
    fn missing_snapshot_recovers_empty_ledger() {
        let snapshots = InMemorySnapshotStore::new();
        let logs = InMemoryLogStore::new();
        let report = RecoveryEngine::recover(&snapshots, &logs).unwrap();
        assert!(report.ledger.is_empty());
    }

    #[test]
    fn replay_keeps_last_value_per_account() {
        let (snapshots, logs) = stores();
        logs.append(&bank("X"), &update(1, "A", Direction::Debit, 100, 70)).unwrap();
        logs.append(&bank("X"), &update(2, "A", Direction::Debit, 70, 20)).unwrap();
        logs.append(&bank("Y"), &update(3, "B", Direction::Credit, 10, 15)).unwrap();

        let report = RecoveryEngine::recover(&snapshots, &logs).unwrap();
        assert_eq!(balance(&report, "A"), 20);
        assert_eq!(balance(&report, "B"), 15);
        assert_eq!(report.replay.applied, 3);
        assert!(!report.persisted);
    }

    #[test]
    fn unknown_accounts_are_skipped_in_replay() {
        let (snapshots, logs) = stores();
        logs.append(&bank("X"), &update(1, "ghost", Direction::Credit, 0, 5)).unwrap();
        let report = RecoveryEngine::recover(&snapshots, &logs).unwrap();
        assert_eq!(report.replay.skipped_unknown, 1);
        assert_eq!(report.ledger.total_balance(), 110);
    }

    #[test]
    fn unanswered_request_is_refunded_and_saved() {
        let (snapshots, logs) = stores();
        logs.append(&bank("X"), &update(1, "A", Direction::Debit, 100, 60)).unwrap();
        logs.append(&bank("Y"), &request(1, "A", "B", 40)).unwrap();

        let report = RecoveryEngine::recover(&snapshots, &logs).unwrap();
        assert_eq!(balance(&report, "A"), 100);
        assert_eq!(balance(&report, "B"), 10);
        assert_eq!(
            report.rollbacks,
            vec![Rollback {
                txn_id: TxnId::new(1, 1),
                account: id("A"),
                amount: 40,
                destination: bank("Y"),
            }]
        );
        assert!(report.persisted);
        assert_eq!(snapshots.load().unwrap(), report.ledger);

        let compensation: Vec<_> = logs
            .scan(&bank("X"), LogKind::Response)
            .unwrap()
            .updates()
            .cloned()
            .collect();
        assert_eq!(compensation.len(), 2);
        assert_eq!(compensation[1].direction, Direction::Credit);
        assert_eq!(compensation[1].txn_id, TxnId::new(1, 1));
        assert_eq!((compensation[1].balance_before, compensation[1].balance_after), (60, 100));
    }

    #[test]
    fn answered_request_is_left_alone() {
        let (snapshots, logs) = stores();
        logs.append(&bank("X"), &update(1, "A", Direction::Debit, 100, 60)).unwrap();
        logs.append(&bank("Y"), &request(1, "A", "B", 40)).unwrap();
        logs.append(&bank("Y"), &update(1, "B", Direction::Credit, 10, 50)).unwrap();

        for _ in 0..3 {
            let report = RecoveryEngine::recover(&snapshots, &logs).unwrap();
            assert_eq!(balance(&report, "A"), 60);
            assert_eq!(balance(&report, "B"), 50);
            assert_eq!(report.rollback_count(), 0);
        }
    }

    #[test]
    fn refund_is_not_repeated_after_later_activity() {
        let (snapshots, logs) = stores();
        logs.append(&bank("X"), &update(1, "A", Direction::Debit, 100, 60)).unwrap();
        logs.append(&bank("Y"), &request(1, "A", "B", 40)).unwrap();

        let first = RecoveryEngine::recover(&snapshots, &logs).unwrap();
        assert_eq!(balance(&first, "A"), 100);

        // A later withdrawal of 10 from A.
        logs.append(&bank("X"), &update(2, "A", Direction::Debit, 100, 90)).unwrap();
        let mut ledger = snapshots.load().unwrap();
        ledger.mutate_balance(&id("A"), 90).unwrap();
        snapshots.save(&ledger).unwrap();

        let second = RecoveryEngine::recover(&snapshots, &logs).unwrap();
        assert_eq!(balance(&second, "A"), 90);
        assert_eq!(second.rollback_count(), 0);
    }

    #[test]
    fn malformed_lines_are_reported_not_fatal() {
        let (snapshots, logs) = stores();
        logs.push_raw(&bank("X"), LogKind::Response, "TXN1_1,UPDATE,A,DEBIT,100\n");
        logs.append(&bank("X"), &update(2, "A", Direction::Debit, 100, 80)).unwrap();
        logs.push_raw(&bank("Y"), LogKind::Request, "TXN1_3,REQUEST,A,B,forty,2024-05-01 12:00:00\n");

        let report = RecoveryEngine::recover(&snapshots, &logs).unwrap();
        assert_eq!(balance(&report, "A"), 80);
        assert_eq!(report.malformed.len(), 2);
        assert_eq!(report.malformed[0].partition, bank("X"));
        assert_eq!(report.malformed[1].kind, LogKind::Request);
        assert_eq!(report.rollback_count(), 0);
    }

    #[test]
    fn request_for_unknown_source_is_ignored() {
        let (snapshots, logs) = stores();
        logs.append(&bank("Y"), &request(4, "ghost", "B", 40)).unwrap();
        let report = RecoveryEngine::recover(&snapshots, &logs).unwrap();
        assert_eq!(report.rollback_count(), 0);
        assert_eq!(report.ledger.total_balance(), 110);
    }

    #[test]
    fn duplicate_request_lines_refund_once() {
        let (snapshots, logs) = stores();
        logs.append(&bank("X"), &update(1, "A", Direction::Debit, 100, 60)).unwrap();
        logs.append(&bank("Y"), &request(1, "A", "B", 40)).unwrap();
        logs.append(&bank("Y"), &request(1, "A", "B", 40)).unwrap();
        let report = RecoveryEngine::recover(&snapshots, &logs).unwrap();
        assert_eq!(report.rollback_count(), 1);
        assert_eq!(balance(&report, "A"), 100);
    }

    #[test]
    fn torn_credit_line_counts_as_answered() {
        let (snapshots, logs) = stores();
        // The credit phase saved B=50 before its response append was cut off.
        let mut ledger = snapshots.load().unwrap();
        ledger.mutate_balance(&id("A"), 60).unwrap();
        ledger.mutate_balance(&id("B"), 50).unwrap();
        snapshots.save(&ledger).unwrap();
        logs.append(&bank("X"), &update(1, "A", Direction::Debit, 100, 60)).unwrap();
        logs.append(&bank("Y"), &request(1, "A", "B", 40)).unwrap();
        logs.push_raw(&bank("Y"), LogKind::Response, "TXN1_1,UPDATE,B,CREDIT,");

        let report = RecoveryEngine::recover(&snapshots, &logs).unwrap();
        assert_eq!(report.rollback_count(), 0);
        assert_eq!(report.malformed.len(), 1);
        assert_eq!(balance(&report, "A"), 60);
        assert_eq!(balance(&report, "B"), 50);
        assert_eq!(report.ledger.total_balance(), 110);
    }

    #[test]
    fn unreadable_response_line_does_not_abort_recovery() {
        let (snapshots, logs) = stores();
        logs.append(&bank("X"), &update(1, "A", Direction::Debit, 100, 60)).unwrap();
        logs.push_raw(&bank("X"), LogKind::Response, b"\xff\xfe garbage\n");
        logs.append(&bank("Y"), &request(1, "A", "B", 40)).unwrap();

        let report = RecoveryEngine::recover(&snapshots, &logs).unwrap();
        assert_eq!(report.malformed.len(), 1);
        assert_eq!(report.rollback_count(), 1);
        assert_eq!(balance(&report, "A"), 100);
    }

    #[test]
    fn compensation_is_looked_up_in_source_partition_only() {
        let mut ledger = Ledger::new();
        ledger.create_account(id("A"), bank("X"), 60).unwrap();
        ledger.create_account(id("B"), bank("Y"), 10).unwrap();
        ledger.create_account(id("C"), bank("Z"), 0).unwrap();
        let snapshots = InMemorySnapshotStore::with_ledger(&ledger);
        let logs = InMemoryLogStore::new();
        logs.append(&bank("Y"), &request(1, "A", "B", 40)).unwrap();
        // A stray credit for A under the same txn, in a partition A is not in.
        logs.append(&bank("Z"), &update(1, "A", Direction::Credit, 60, 60)).unwrap();

        let report = RecoveryEngine::recover(&snapshots, &logs).unwrap();
        assert_eq!(report.rollback_count(), 1);
        assert_eq!(balance(&report, "A"), 100);

        let again = RecoveryEngine::recover(&snapshots, &logs).unwrap();
        assert_eq!(again.rollback_count(), 0);
    }
}
