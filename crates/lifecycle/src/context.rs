//! Lifecycle phases and progress callbacks.

use std::fmt;

use crate::result::HostResult;

/// Where a host is in its maintenance run.
///
/// `Pending → Evacuating → (Updating | SkippedUpdate) → Restoring → Done`.
/// `Done` is terminal whatever happened before; there is no retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostPhase {
    Pending,
    Evacuating,
    Updating,
    SkippedUpdate,
    Restoring,
    Done,
}

impl fmt::Display for HostPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostPhase::Pending => write!(f, "pending"),
            HostPhase::Evacuating => write!(f, "evacuating"),
            HostPhase::Updating => write!(f, "updating"),
            HostPhase::SkippedUpdate => write!(f, "skipped update"),
            HostPhase::Restoring => write!(f, "restoring"),
            HostPhase::Done => write!(f, "done"),
        }
    }
}

/// Progress callback for host lifecycles.
///
/// Called from worker threads, so implementations must be `Sync`.
pub trait PhaseCallback: Send + Sync {
    /// Called when `host` enters `phase`
    fn on_phase(&self, host: &str, phase: HostPhase);

    /// Called once a host reaches `Done`, with its final record
    fn on_host_complete(&self, _host: &str, _result: &HostResult) {}
}

/// No-op progress callback
pub struct NoProgress;

impl PhaseCallback for NoProgress {
    fn on_phase(&self, _host: &str, _phase: HostPhase) {}
}
