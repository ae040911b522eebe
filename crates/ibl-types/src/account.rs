use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Names the CLI uses for "no account" on either side of a transfer.
pub const RESERVED_NAMES: [&str; 2] = ["-", "none"];

fn validate(value: &str, kind: &'static str) -> Result<(), TypeError> {
    let invalid = |reason| TypeError::InvalidIdentifier {
        value: value.to_string(),
        reason,
    };
    if value.is_empty() {
        return Err(invalid(kind));
    }
    if value.chars().any(|c| c.is_whitespace() || c == ',') {
        return Err(invalid("must not contain whitespace or commas"));
    }
    if RESERVED_NAMES.contains(&value) {
        return Err(invalid("reserved name"));
    }
    Ok(())
}

/// Unique account identifier.
///
/// Ids appear verbatim in the whitespace-separated snapshot and in the
/// comma-separated logs, so neither separator is allowed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        validate(&value, "account id must not be empty")?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AccountId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a partition ("bank"). Each partition owns one response log and
/// one request log.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartitionName(String);

impl PartitionName {
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        validate(&value, "partition name must not be empty")?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PartitionName {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PartitionName> for String {
    fn from(name: PartitionName) -> Self {
        name.0
    }
}

impl fmt::Display for PartitionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the account table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub partition: PartitionName,
    pub balance: u64,
}

impl Account {
    pub fn new(id: AccountId, partition: PartitionName, balance: u64) -> Self {
        Self {
            id,
            partition,
            balance,
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.id, self.partition, self.balance)
    }
}

/// Convert a signed amount from user input into a balance or transfer amount.
pub fn non_negative(value: i64) -> Result<u64, TypeError> {
    u64::try_from(value).map_err(|_| TypeError::InvalidAmount(value))
}
