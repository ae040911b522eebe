//! Text codec for the snapshot file: one `id partition balance` line per
//! account.

use ibl_types::{Account, AccountId, PartitionName};

use crate::error::{StoreError, StoreResult};
use crate::ledger::Ledger;

/// Encode the whole table, one account per line.
pub fn encode(ledger: &Ledger) -> String {
    let mut out = String::new();
    for account in ledger.accounts() {
        out.push_str(&format!(
            "{} {} {}\n",
            account.id, account.partition, account.balance
        ));
    }
    out
}

/// Decode a snapshot. Blank lines are ignored; anything else that does not
/// parse is corruption.
pub fn decode(text: &str) -> StoreResult<Ledger> {
    let mut ledger = Ledger::new();
    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let corrupt = |reason: String| StoreError::CorruptSnapshot {
            line: line_no,
            reason,
        };
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        let [id, partition, balance] = fields[..] else {
            return Err(corrupt(format!("expected 3 fields, found {}", fields.len())));
        };
        let id = AccountId::new(id).map_err(|e| corrupt(e.to_string()))?;
        let partition = PartitionName::new(partition).map_err(|e| corrupt(e.to_string()))?;
        let balance: u64 = balance
            .parse()
            .map_err(|_| corrupt(format!("balance is not a non-negative integer: {balance:?}")))?;
        ledger
            .insert(Account::new(id, partition, balance))
            .map_err(|e| corrupt(e.to_string()))?;
    }
    Ok(ledger)
}
