use std::fmt;

use colored::Colorize;
use ibl_txn::{Checkpoint, Control, FaultInjector, HaltAt};
use ibl_types::TxnId;
use rand::seq::SliceRandom;
use rand::Rng;

const RANDOM_REASONS: [&str; 8] = [
    "Power surge detected!",
    "Unstable voltage input!",
    "Overheating CPU!",
    "Memory (RAM) access violation!",
    "Corrupted BIOS!",
    "Electromagnetic interference!",
    "Loose motherboard connection!",
    "Fan failure - System overheated!",
];

/// Cause printed in the crash banner. Display only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum CrashReason {
    #[default]
    #[value(name = "power")]
    PowerOutage,
    #[value(name = "disk")]
    DiskFailure,
    Random,
}

impl CrashReason {
    pub fn describe<R: Rng + ?Sized>(self, rng: &mut R) -> &'static str {
        match self {
            Self::PowerOutage => "Unexpected power outage!",
            Self::DiskFailure => "Hard disk failure!",
            Self::Random => RANDOM_REASONS
                .choose(rng)
                .copied()
                .unwrap_or("Unknown error!"),
        }
    }
}

/// Checkpoint names accepted by `--crash-at`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum CrashPoint {
    Debit,
    Request,
    Credit,
}

impl From<CrashPoint> for Checkpoint {
    fn from(point: CrashPoint) -> Self {
        match point {
            CrashPoint::Debit => Checkpoint::Debited,
            CrashPoint::Request => Checkpoint::Requested,
            CrashPoint::Credit => Checkpoint::Credited,
        }
    }
}

/// Fault injector for one CLI invocation: halts at `--crash-at`, if given,
/// and traces every checkpoint it passes.
pub struct CliFaults {
    halt: Option<HaltAt>,
}

impl CliFaults {
    pub fn new(crash_at: Option<CrashPoint>) -> Self {
        Self {
            halt: crash_at.map(|point| HaltAt::new(point.into())),
        }
    }
}

impl FaultInjector for CliFaults {
    fn at_checkpoint(&mut self, txn_id: &TxnId, checkpoint: Checkpoint) -> Control {
        tracing::debug!(txn = %txn_id, checkpoint = %checkpoint.label(), "checkpoint reached");
        match &mut self.halt {
            Some(halt) => halt.at_checkpoint(txn_id, checkpoint),
            None => Control::Continue,
        }
    }
}

/// Refuse a `--crash-at` the operation can never reach, so a requested crash
/// is never silently skipped.
pub fn ensure_reachable(crash_at: Option<CrashPoint>, reachable: &[Checkpoint]) -> anyhow::Result<()> {
    let Some(point) = crash_at else {
        return Ok(());
    };
    let checkpoint = Checkpoint::from(point);
    if !reachable.contains(&checkpoint) {
        anyhow::bail!("this operation never reaches the {checkpoint}, so --crash-at would not fire");
    }
    Ok(())
}

/// The banner printed before an abrupt exit.
pub struct CrashBanner<'a> {
    pub phase: &'a str,
    pub reason: &'a str,
}

impl fmt::Display for CrashBanner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", "--- SYSTEM CRASH ---".red().bold())?;
        writeln!(f, "After: {}", self.phase)?;
        writeln!(f, "Reason: {}", self.reason)?;
        write!(f, "Emergency shutdown initiated.")
    }
}
