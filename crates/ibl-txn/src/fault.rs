use std::fmt;

use ibl_types::TxnId;
use serde::{Deserialize, Serialize};

/// Durable commit points between transfer phases. The only places a
/// transfer may be interrupted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Checkpoint {
    /// A: the debit is in the snapshot and the source response log.
    Debited,
    /// B: the request record is in the destination request log.
    Requested,
    /// C: the credit is in the snapshot and the destination response log.
    Credited,
}

impl Checkpoint {
    pub fn label(&self) -> char {
        match self {
            Self::Debited => 'A',
            Self::Requested => 'B',
            Self::Credited => 'C',
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debited => write!(f, "debit phase"),
            Self::Requested => write!(f, "request phase"),
            Self::Credited => write!(f, "credit phase"),
        }
    }
}

/// What the coordinator does after reaching a checkpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Continue,
    Halt,
}

/// Decides, at each checkpoint, whether execution stops there.
pub trait FaultInjector {
    fn at_checkpoint(&mut self, txn_id: &TxnId, checkpoint: Checkpoint) -> Control;
}

/// Never interrupts.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFaults;

impl FaultInjector for NoFaults {
    fn at_checkpoint(&mut self, _txn_id: &TxnId, _checkpoint: Checkpoint) -> Control {
        Control::Continue
    }
}

/// Halts the first time the given checkpoint is reached.
#[derive(Clone, Debug)]
pub struct HaltAt {
    checkpoint: Checkpoint,
    fired: bool,
}

impl HaltAt {
    pub fn new(checkpoint: Checkpoint) -> Self {
        Self {
            checkpoint,
            fired: false,
        }
    }

    pub fn fired(&self) -> bool {
        self.fired
    }
}

impl FaultInjector for HaltAt {
    fn at_checkpoint(&mut self, _txn_id: &TxnId, checkpoint: Checkpoint) -> Control {
        if !self.fired && checkpoint == self.checkpoint {
            self.fired = true;
            Control::Halt
        } else {
            Control::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halt_at_fires_once() {
        let txn = TxnId::new(0, 1);
        let mut faults = HaltAt::new(Checkpoint::Requested);
        assert_eq!(faults.at_checkpoint(&txn, Checkpoint::Debited), Control::Continue);
        assert_eq!(faults.at_checkpoint(&txn, Checkpoint::Requested), Control::Halt);
        assert!(faults.fired());
        assert_eq!(faults.at_checkpoint(&txn, Checkpoint::Requested), Control::Continue);
    }

    #[test]
    fn labels() {
        assert_eq!(Checkpoint::Debited.label(), 'A');
        assert_eq!(Checkpoint::Requested.label(), 'B');
        assert_eq!(Checkpoint::Credited.label(), 'C');
        assert_eq!(Checkpoint::Credited.to_string(), "credit phase");
    }
}
