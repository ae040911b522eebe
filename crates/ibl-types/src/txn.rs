use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Transaction identifier: `TXN<epochSeconds>_<counter>`.
///
/// The counter alone is unique across restarts once the generator has been
/// resumed from the logs (see [`TxnIdGenerator::resume_after`]); the epoch
/// component is informational.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxnId {
    epoch_secs: u64,
    counter: u64,
}

impl TxnId {
    pub fn new(epoch_secs: u64, counter: u64) -> Self {
        Self {
            epoch_secs,
            counter,
        }
    }

    pub fn epoch_secs(&self) -> u64 {
        self.epoch_secs
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }
}

impl FromStr for TxnId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeError::InvalidTxnId(s.to_string());
        let rest = s.strip_prefix("TXN").ok_or_else(invalid)?;
        let (epoch, counter) = rest.split_once('_').ok_or_else(invalid)?;
        Ok(Self {
            epoch_secs: epoch.parse().map_err(|_| invalid())?,
            counter: counter.parse().map_err(|_| invalid())?,
        })
    }
}

impl TryFrom<String> for TxnId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TxnId> for String {
    fn from(id: TxnId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TXN{}_{}", self.epoch_secs, self.counter)
    }
}

impl fmt::Debug for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxnId({self})")
    }
}

/// Issues [`TxnId`]s with a strictly increasing counter.
#[derive(Clone, Debug)]
pub struct TxnIdGenerator {
    next: u64,
}

impl TxnIdGenerator {
    /// A generator whose first id has counter 1.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// A generator that continues after the highest counter already durable
    /// in the logs.
    pub fn resume_after(highest: u64) -> Self {
        Self {
            next: highest.saturating_add(1),
        }
    }

    /// Issue the next id stamped with the current epoch second.
    pub fn next_id(&mut self) -> TxnId {
        let epoch_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.next_id_at(epoch_secs)
    }

    /// Issue the next id with an explicit epoch second.
    pub fn next_id_at(&mut self, epoch_secs: u64) -> TxnId {
        let id = TxnId::new(epoch_secs, self.next);
        self.next += 1;
        id
    }

    /// Counter the next issued id will carry.
    pub fn peek_counter(&self) -> u64 {
        self.next
    }
}

impl Default for TxnIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
