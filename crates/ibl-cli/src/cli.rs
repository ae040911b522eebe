use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::crash::{CrashPoint, CrashReason};

#[derive(Parser)]
#[command(
    name = "ibl",
    about = "Interbank Ledger: crash-safe transfers across partitioned accounts",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the snapshot and partition logs
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Configuration file (defaults to <data-dir>/ibl.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// List every account and the total balance
    Show,
    /// Move funds between two accounts (`-` or `none` for either side)
    Transfer(TransferArgs),
    /// Deposit into an account
    Credit(CreditArgs),
    /// Withdraw from an account
    Debit(DebitArgs),
    /// Replay the logs and refund incomplete transfers
    Recover,
    /// Create an account
    Create(CreateArgs),
    /// Simulate a crash right now
    Crash(CrashArgs),
}

#[derive(Args)]
pub struct FaultArgs {
    /// Crash when this checkpoint is reached
    #[arg(long, value_enum)]
    pub crash_at: Option<CrashPoint>,
    /// Reason shown in the crash banner
    #[arg(long, value_enum, default_value = "power")]
    pub reason: CrashReason,
}

#[derive(Args)]
pub struct TransferArgs {
    pub from: String,
    pub to: String,
    #[arg(allow_negative_numbers = true)]
    pub amount: i64,
    #[command(flatten)]
    pub faults: FaultArgs,
}

#[derive(Args)]
pub struct CreditArgs {
    pub to: String,
    #[arg(allow_negative_numbers = true)]
    pub amount: i64,
    #[command(flatten)]
    pub faults: FaultArgs,
}

#[derive(Args)]
pub struct DebitArgs {
    pub from: String,
    #[arg(allow_negative_numbers = true)]
    pub amount: i64,
    #[command(flatten)]
    pub faults: FaultArgs,
}

#[derive(Args)]
pub struct CreateArgs {
    pub id: String,
    pub partition: String,
    #[arg(allow_negative_numbers = true)]
    pub balance: i64,
}

#[derive(Args)]
pub struct CrashArgs {
    #[arg(long, value_enum, default_value = "power")]
    pub reason: CrashReason,
}
