use std::fmt;
use std::str::FromStr;

use ibl_store::Ledger;
use ibl_types::{AccountId, PartitionName, TypeError};
use serde::{Deserialize, Serialize};

use crate::fault::Checkpoint;

/// One side of a transfer: a real account, or nothing (deposit/withdrawal).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endpoint {
    None,
    Account(AccountId),
}

impl Endpoint {
    pub fn account(&self) -> Option<&AccountId> {
        match self {
            Self::None => None,
            Self::Account(id) => Some(id),
        }
    }
}

impl From<AccountId> for Endpoint {
    fn from(id: AccountId) -> Self {
        Self::Account(id)
    }
}

/// `-` and `none` parse as [`Endpoint::None`]; anything else must be a valid
/// account id.
impl FromStr for Endpoint {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "-" | "none" => Ok(Self::None),
            other => AccountId::new(other).map(Self::Account),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Account(id) => write!(f, "{id}"),
        }
    }
}

/// A request to move `amount` from one endpoint to another.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from: Endpoint,
    pub to: Endpoint,
    pub amount: u64,
}

impl TransferRequest {
    pub fn new(from: Endpoint, to: Endpoint, amount: u64) -> Self {
        Self { from, to, amount }
    }

    /// Account-to-account transfer.
    pub fn transfer(from: AccountId, to: AccountId, amount: u64) -> Self {
        Self::new(from.into(), to.into(), amount)
    }

    /// Deposit into `to`.
    pub fn credit(to: AccountId, amount: u64) -> Self {
        Self::new(Endpoint::None, to.into(), amount)
    }

    /// Withdrawal from `from`.
    pub fn debit(from: AccountId, amount: u64) -> Self {
        Self::new(from.into(), Endpoint::None, amount)
    }

    /// Checkpoints a successful run of this request passes, in order.
    /// The request checkpoint needs both accounts in `ledger`, in different
    /// partitions.
    pub fn reachable_checkpoints(&self, ledger: &Ledger) -> Vec<Checkpoint> {
        let mut checkpoints = Vec::with_capacity(3);
        if self.from.account().is_some() {
            checkpoints.push(Checkpoint::Debited);
        }
        if let (Some(source), Some(dest)) = (
            partition_of(ledger, &self.from),
            partition_of(ledger, &self.to),
        ) {
            if source != dest {
                checkpoints.push(Checkpoint::Requested);
            }
        }
        if self.to.account().is_some() {
            checkpoints.push(Checkpoint::Credited);
        }
        checkpoints
    }
}

fn partition_of<'a>(ledger: &'a Ledger, endpoint: &Endpoint) -> Option<&'a PartitionName> {
    endpoint
        .account()
        .and_then(|id| ledger.get(id))
        .map(|account| &account.partition)
}
