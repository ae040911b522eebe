//! Log records and their line encoding.
//!
//! Response log lines:
//! ```text
//! txnId,UPDATE,accountId,DEBIT|CREDIT,balanceBefore,balanceAfter,timestamp
//! ```
//! Request log lines:
//! ```text
//! txnId,REQUEST,fromId,toId,amount,timestamp
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::account::AccountId;
use crate::error::TypeError;
use crate::temporal::Timestamp;
use crate::txn::TxnId;

const UPDATE_TAG: &str = "UPDATE";
const REQUEST_TAG: &str = "REQUEST";
const UPDATE_FIELDS: usize = 7;
const REQUEST_FIELDS: usize = 6;

/// Which side of a balance change an update record describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Debit,
    Credit,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debit => write!(f, "DEBIT"),
            Self::Credit => write!(f, "CREDIT"),
        }
    }
}

impl FromStr for Direction {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEBIT" => Ok(Self::Debit),
            "CREDIT" => Ok(Self::Credit),
            other => Err(TypeError::malformed(format!("unknown direction {other:?}"))),
        }
    }
}

/// The two logs every partition owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogKind {
    /// Committed balance changes (`UPDATE` records).
    Response,
    /// Announced cross-partition transfers (`REQUEST` records).
    Request,
}

impl LogKind {
    /// File-name suffix used by file-backed log stores.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Self::Response => "respond",
            Self::Request => "request",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response => write!(f, "response"),
            Self::Request => write!(f, "request"),
        }
    }
}

/// A committed balance change on one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub txn_id: TxnId,
    pub account: AccountId,
    pub direction: Direction,
    pub balance_before: u64,
    pub balance_after: u64,
    pub timestamp: Timestamp,
}

/// Announcement of a cross-partition transfer, written to the destination
/// partition before the credit happens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub txn_id: TxnId,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: u64,
    pub timestamp: Timestamp,
}

/// A single log line, tagged by kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogRecord {
    Update(UpdateRecord),
    Request(RequestRecord),
}

impl LogRecord {
    /// The log of the pair this record belongs to.
    pub fn kind(&self) -> LogKind {
        match self {
            Self::Update(_) => LogKind::Response,
            Self::Request(_) => LogKind::Request,
        }
    }

    pub fn txn_id(&self) -> TxnId {
        match self {
            Self::Update(u) => u.txn_id,
            Self::Request(r) => r.txn_id,
        }
    }

    pub fn as_update(&self) -> Option<&UpdateRecord> {
        match self {
            Self::Update(u) => Some(u),
            Self::Request(_) => None,
        }
    }

    pub fn as_request(&self) -> Option<&RequestRecord> {
        match self {
            Self::Request(r) => Some(r),
            Self::Update(_) => None,
        }
    }

    /// Encode as one log line, without the trailing newline.
    pub fn encode(&self) -> String {
        match self {
            Self::Update(u) => format!(
                "{},{UPDATE_TAG},{},{},{},{},{}",
                u.txn_id, u.account, u.direction, u.balance_before, u.balance_after, u.timestamp
            ),
            Self::Request(r) => format!(
                "{},{REQUEST_TAG},{},{},{},{}",
                r.txn_id, r.from, r.to, r.amount, r.timestamp
            ),
        }
    }

    /// Decode and validate one log line.
    pub fn decode(line: &str) -> Result<Self, TypeError> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(',').collect();
        match fields.get(1).copied() {
            Some(UPDATE_TAG) => decode_update(&fields).map(Self::Update),
            Some(REQUEST_TAG) => decode_request(&fields).map(Self::Request),
            Some(other) => Err(TypeError::malformed(format!("unknown record kind {other:?}"))),
            None => Err(TypeError::malformed("missing record kind")),
        }
    }
}

fn expect_fields(fields: &[&str], expected: usize) -> Result<(), TypeError> {
    if fields.len() != expected {
        return Err(TypeError::malformed(format!(
            "expected {expected} fields, found {}",
            fields.len()
        )));
    }
    Ok(())
}

fn number(field: &str, name: &str) -> Result<u64, TypeError> {
    field
        .parse()
        .map_err(|_| TypeError::malformed(format!("{name} is not a non-negative integer: {field:?}")))
}

fn txn(field: &str) -> Result<TxnId, TypeError> {
    field
        .parse()
        .map_err(|_| TypeError::malformed(format!("bad transaction id {field:?}")))
}

fn account(field: &str) -> Result<AccountId, TypeError> {
    AccountId::new(field).map_err(|e| TypeError::malformed(e.to_string()))
}

fn decode_update(fields: &[&str]) -> Result<UpdateRecord, TypeError> {
    expect_fields(fields, UPDATE_FIELDS)?;
    let record = UpdateRecord {
        txn_id: txn(fields[0])?,
        account: account(fields[2])?,
        direction: fields[3].parse()?,
        balance_before: number(fields[4], "balanceBefore")?,
        balance_after: number(fields[5], "balanceAfter")?,
        timestamp: fields[6].parse()?,
    };
    let consistent = match record.direction {
        Direction::Debit => record.balance_after <= record.balance_before,
        Direction::Credit => record.balance_after >= record.balance_before,
    };
    if !consistent {
        return Err(TypeError::malformed(format!(
            "{} from {} to {} moves the wrong way",
            record.direction, record.balance_before, record.balance_after
        )));
    }
    Ok(record)
}

fn decode_request(fields: &[&str]) -> Result<RequestRecord, TypeError> {
    expect_fields(fields, REQUEST_FIELDS)?;
    Ok(RequestRecord {
        txn_id: txn(fields[0])?,
        from: account(fields[2])?,
        to: account(fields[3])?,
        amount: number(fields[4], "amount")?,
        timestamp: fields[5].parse()?,
    })
}
