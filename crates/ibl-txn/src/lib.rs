//! Transfer protocol and crash recovery for the Interbank Ledger (IBL).
//!
//! This crate is the heart of IBL. It provides:
//! - [`Coordinator`]: the phased transfer state machine (debit, cross-partition
//!   request, credit) with a durable commit and a checkpoint after each phase
//! - [`FaultInjector`]: the hook consulted at every checkpoint, used to model
//!   interruption deterministically
//! - [`RecoveryEngine`]: replay of the response logs over the last snapshot,
//!   followed by refunds of unanswered cross-partition requests
//!
//! Exactly one operation is in flight at a time. The ledger is an explicit
//! value passed into every operation; the stores are borrowed.

pub mod coordinator;
pub mod error;
pub mod fault;
pub mod recovery;
pub mod request;

pub use coordinator::{highest_txn_counter, Coordinator, TransferOutcome, TxnState};
pub use error::{TxnError, TxnResult};
pub use fault::{Checkpoint, Control, FaultInjector, HaltAt, NoFaults};
pub use recovery::{RecoveryEngine, RecoveryReport, ReplayStats, Rollback};
pub use request::{Endpoint, TransferRequest};
