use std::collections::BTreeSet;

use ibl_types::{non_negative, Account, AccountId, PartitionName};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// The account table: accounts keyed by unique id, kept in creation order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    accounts: Vec<Account>,
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from existing rows, rejecting duplicate ids.
    pub fn from_accounts(accounts: Vec<Account>) -> StoreResult<Self> {
        let mut ledger = Self::new();
        for account in accounts {
            ledger.insert(account)?;
        }
        Ok(ledger)
    }

    /// All accounts in creation order.
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn get(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.iter().find(|a| &a.id == id)
    }

    pub fn contains(&self, id: &AccountId) -> bool {
        self.get(id).is_some()
    }

    /// Return the account or fail with [`StoreError::AccountNotFound`].
    pub fn lookup(&self, id: &AccountId) -> StoreResult<&Account> {
        self.get(id)
            .ok_or_else(|| StoreError::AccountNotFound(id.clone()))
    }

    /// Replace an account's balance. The caller checks invariants first.
    pub fn mutate_balance(&mut self, id: &AccountId, new_balance: u64) -> StoreResult<()> {
        let account = self
            .accounts
            .iter_mut()
            .find(|a| &a.id == id)
            .ok_or_else(|| StoreError::AccountNotFound(id.clone()))?;
        account.balance = new_balance;
        Ok(())
    }

    /// Add a new account. The caller persists the ledger afterwards.
    pub fn create_account(
        &mut self,
        id: AccountId,
        partition: PartitionName,
        initial_balance: i64,
    ) -> StoreResult<&Account> {
        if self.contains(&id) {
            return Err(StoreError::DuplicateAccount(id));
        }
        let balance =
            non_negative(initial_balance).map_err(|_| StoreError::InvalidAmount(initial_balance))?;
        self.accounts.push(Account::new(id, partition, balance));
        Ok(&self.accounts[self.accounts.len() - 1])
    }

    /// Distinct partition names, sorted.
    pub fn partitions(&self) -> BTreeSet<PartitionName> {
        self.accounts.iter().map(|a| a.partition.clone()).collect()
    }

    /// Sum of every balance.
    pub fn total_balance(&self) -> u128 {
        self.accounts.iter().map(|a| u128::from(a.balance)).sum()
    }

    pub(crate) fn insert(&mut self, account: Account) -> StoreResult<()> {
        if self.contains(&account.id) {
            return Err(StoreError::DuplicateAccount(account.id));
        }
        self.accounts.push(account);
        Ok(())
    }
}
