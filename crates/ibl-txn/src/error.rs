use ibl_log::LogError;
use ibl_store::StoreError;
use ibl_types::AccountId;

/// Errors produced by the transfer coordinator and the recovery engine.
///
/// A validation failure aborts the operation where it is detected; phases
/// committed before that point stand until the next recovery.
#[derive(Debug, thiserror::Error)]
pub enum TxnError {
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("insufficient funds in {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: AccountId,
        balance: u64,
        requested: u64,
    },

    #[error("invalid transfer: {0}")]
    InvalidTransfer(&'static str),

    #[error("crediting {amount} to {account} would overflow its balance {balance}")]
    BalanceOverflow {
        account: AccountId,
        balance: u64,
        amount: u64,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("log error: {0}")]
    Log(#[from] LogError),
}

pub type TxnResult<T> = Result<T, TxnError>;
