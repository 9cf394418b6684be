//! Typed fault outcomes for the per-frame update
//!
//! Each update sub-phase returns a [`PhaseOutcome`]. Recoverable faults are
//! logged and handled where they occur; fatal ones travel up to the
//! scheduler, which pauses the game and arms a bounded retry.

use thiserror::Error;

/// How the scheduler should treat a fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Logged, the frame continues
    Recoverable,
    /// Pauses the game and schedules a delayed re-arm
    Fatal,
}

/// A fault raised by one update sub-phase
#[derive(Debug, Clone, Error)]
pub enum SimFault {
    #[error("generation fault: {0}")]
    Generation(String),
    #[error("physics fault: {0}")]
    Physics(String),
    #[error("camera fault: {0}")]
    Camera(String),
    #[error("checkpoint fault: {0}")]
    Checkpoint(String),
    #[error("render fault: {0}")]
    Render(String),
    /// World state could not be brought back to a usable configuration
    #[error("unrecoverable world state: {0}")]
    Invariant(String),
}

impl SimFault {
    pub fn severity(&self) -> Severity {
        match self {
            SimFault::Invariant(_) => Severity::Fatal,
            _ => Severity::Recoverable,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Result of one update sub-phase
pub type PhaseOutcome = Result<(), SimFault>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity() {
        assert!(!SimFault::Generation("bad chunk".into()).is_fatal());
        assert!(!SimFault::Physics("nan".into()).is_fatal());
        assert!(SimFault::Invariant("ball lost".into()).is_fatal());
    }

    #[test]
    fn test_display() {
        let fault = SimFault::Checkpoint("hook failed".into());
        assert_eq!(fault.to_string(), "checkpoint fault: hook failed");
    }
}
