//! Phased transfer protocol.
//!
//! ```text
//! INIT ──debit──▶ DEBITED ──request──▶ REQUESTED ──credit──▶ CREDITED ──▶ COMPLETE
//!                    (A)     (cross-partition only)  (B)             (C)
//! ```
//!
//! Each arrow saves the whole ledger and appends one log record before the
//! checkpoint fires. Nothing is compensated here; an interrupted or failed
//! transfer is left for the recovery engine.

use std::fmt;

use ibl_log::LogStore;
use ibl_store::{Ledger, SnapshotStore};
use ibl_types::{
    AccountId, Direction, LogKind, LogRecord, PartitionName, RequestRecord, Timestamp, TxnId,
    TxnIdGenerator, UpdateRecord,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{TxnError, TxnResult};
use crate::fault::{Checkpoint, Control, FaultInjector};
use crate::request::TransferRequest;

/// Progress of one transfer through the protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxnState {
    Init,
    Debited,
    Requested,
    Credited,
    Complete,
}

impl From<Checkpoint> for TxnState {
    fn from(checkpoint: Checkpoint) -> Self {
        match checkpoint {
            Checkpoint::Debited => Self::Debited,
            Checkpoint::Requested => Self::Requested,
            Checkpoint::Credited => Self::Credited,
        }
    }
}

impl fmt::Display for TxnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "INIT",
            Self::Debited => "DEBITED",
            Self::Requested => "REQUESTED",
            Self::Credited => "CREDITED",
            Self::Complete => "COMPLETE",
        };
        f.write_str(s)
    }
}

/// How a transfer that did not fail validation ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferOutcome {
    /// Every applicable phase committed.
    Completed { txn_id: TxnId },
    /// The fault injector halted execution at `at`; everything before it is
    /// durable, nothing after it happened.
    Interrupted { txn_id: TxnId, at: Checkpoint },
}

impl TransferOutcome {
    pub fn txn_id(&self) -> TxnId {
        match self {
            Self::Completed { txn_id } | Self::Interrupted { txn_id, .. } => *txn_id,
        }
    }

    pub fn state(&self) -> TxnState {
        match self {
            Self::Completed { .. } => TxnState::Complete,
            Self::Interrupted { at, .. } => TxnState::from(*at),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Highest transaction counter recorded in any log of the given partitions.
pub fn highest_txn_counter<'a, L: LogStore>(
    logs: &L,
    partitions: impl IntoIterator<Item = &'a PartitionName>,
) -> TxnResult<u64> {
    let mut highest = 0;
    for partition in partitions {
        for kind in [LogKind::Response, LogKind::Request] {
            let scan = logs.scan(partition, kind)?;
            for record in &scan.records {
                highest = highest.max(record.txn_id().counter());
            }
        }
    }
    Ok(highest)
}

/// Executes transfers against a ledger, its snapshot store, and the
/// partition logs.
pub struct Coordinator<'a, S: SnapshotStore, L: LogStore> {
    snapshots: &'a S,
    logs: &'a L,
    ids: TxnIdGenerator,
}

impl<'a, S: SnapshotStore, L: LogStore> Coordinator<'a, S, L> {
    pub fn new(snapshots: &'a S, logs: &'a L, ids: TxnIdGenerator) -> Self {
        Self {
            snapshots,
            logs,
            ids,
        }
    }

    /// A coordinator whose transaction ids continue after the highest one
    /// found in the logs of `ledger`'s partitions.
    pub fn resume(snapshots: &'a S, logs: &'a L, ledger: &Ledger) -> TxnResult<Self> {
        let highest = highest_txn_counter(logs, &ledger.partitions())?;
        debug!(highest, "resuming transaction counter");
        Ok(Self::new(
            snapshots,
            logs,
            TxnIdGenerator::resume_after(highest),
        ))
    }

    /// Create an account and persist the ledger.
    pub fn create_account(
        &self,
        ledger: &mut Ledger,
        id: AccountId,
        partition: PartitionName,
        initial_balance: i64,
    ) -> TxnResult<()> {
        ledger.create_account(id.clone(), partition.clone(), initial_balance)?;
        self.snapshots.save(ledger)?;
        info!(account = %id, %partition, initial_balance, "account created");
        Ok(())
    }

    /// Run the phased protocol for one request.
    ///
    /// Errors abort at the phase that detects them. In particular an unknown
    /// destination is only discovered after the debit has committed, and that
    /// debit stands.
    pub fn transfer(
        &mut self,
        ledger: &mut Ledger,
        request: &TransferRequest,
        faults: &mut dyn FaultInjector,
    ) -> TxnResult<TransferOutcome> {
        let from = request.from.account();
        let to = request.to.account();
        if from.is_none() && to.is_none() {
            return Err(TxnError::InvalidTransfer("no source or destination account"));
        }

        let txn_id = self.ids.next_id();
        let amount = request.amount;
        let from_partition = from.and_then(|id| ledger.get(id)).map(|a| a.partition.clone());
        let to_partition = to.and_then(|id| ledger.get(id)).map(|a| a.partition.clone());
        let mut state = TxnState::Init;

        if let Some(from) = from {
            let source = ledger
                .get(from)
                .ok_or_else(|| TxnError::AccountNotFound(from.clone()))?;
            if source.balance < amount {
                return Err(TxnError::InsufficientFunds {
                    account: from.clone(),
                    balance: source.balance,
                    requested: amount,
                });
            }
            let before = source.balance;
            let partition = source.partition.clone();
            self.commit_balance(ledger, txn_id, from, &partition, Direction::Debit, before, before - amount)?;
            state = TxnState::Debited;
            if self.checkpoint(faults, txn_id, Checkpoint::Debited) == Control::Halt {
                return Ok(TransferOutcome::Interrupted {
                    txn_id,
                    at: Checkpoint::Debited,
                });
            }
        }

        if let (Some(from), Some(to), Some(source_bank), Some(dest_bank)) =
            (from, to, &from_partition, &to_partition)
        {
            if source_bank != dest_bank {
                let record = LogRecord::Request(RequestRecord {
                    txn_id,
                    from: from.clone(),
                    to: to.clone(),
                    amount,
                    timestamp: Timestamp::now(),
                });
                self.logs.append(dest_bank, &record)?;
                state = TxnState::Requested;
                info!(txn = %txn_id, %from, %to, amount, destination = %dest_bank, "transfer requested");
                if self.checkpoint(faults, txn_id, Checkpoint::Requested) == Control::Halt {
                    return Ok(TransferOutcome::Interrupted {
                        txn_id,
                        at: Checkpoint::Requested,
                    });
                }
            }
        }

        if let Some(to) = to {
            let Some(dest) = ledger.get(to) else {
                if state != TxnState::Init {
                    warn!(txn = %txn_id, account = %to, %state, "destination missing; committed debit stands");
                }
                return Err(TxnError::AccountNotFound(to.clone()));
            };
            let before = dest.balance;
            let after = before.checked_add(amount).ok_or_else(|| TxnError::BalanceOverflow {
                account: to.clone(),
                balance: before,
                amount,
            })?;
            let partition = dest.partition.clone();
            self.commit_balance(ledger, txn_id, to, &partition, Direction::Credit, before, after)?;
            if self.checkpoint(faults, txn_id, Checkpoint::Credited) == Control::Halt {
                return Ok(TransferOutcome::Interrupted {
                    txn_id,
                    at: Checkpoint::Credited,
                });
            }
        }

        info!(txn = %txn_id, from = %request.from, to = %request.to, amount, "transfer complete");
        Ok(TransferOutcome::Completed { txn_id })
    }

    /// Apply one balance change durably: mutate, save the snapshot, append
    /// the response record to the account's partition.
    #[allow(clippy::too_many_arguments)]
    fn commit_balance(
        &self,
        ledger: &mut Ledger,
        txn_id: TxnId,
        account: &AccountId,
        partition: &PartitionName,
        direction: Direction,
        before: u64,
        after: u64,
    ) -> TxnResult<()> {
        ledger.mutate_balance(account, after)?;
        if let Err(e) = self.snapshots.save(ledger) {
            ledger.mutate_balance(account, before)?;
            return Err(e.into());
        }

        let record = LogRecord::Update(UpdateRecord {
            txn_id,
            account: account.clone(),
            direction,
            balance_before: before,
            balance_after: after,
            timestamp: Timestamp::now(),
        });
        self.logs.append(partition, &record)?;
        info!(txn = %txn_id, %account, %direction, before, after, "balance committed");
        Ok(())
    }

    fn checkpoint(
        &self,
        faults: &mut dyn FaultInjector,
        txn_id: TxnId,
        checkpoint: Checkpoint,
    ) -> Control {
        let control = faults.at_checkpoint(&txn_id, checkpoint);
        if control == Control::Halt {
            warn!(txn = %txn_id, checkpoint = %checkpoint.label(), "halted at checkpoint");
        }
        control
    }
}
