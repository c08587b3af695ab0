//! Per-host outcome records and the job-wide aggregator.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

/// Outcome of one host's maintenance run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostResult {
    /// Every service handler evacuated successfully
    pub evacuated: bool,
    /// Number of update actions that succeeded
    pub updated: usize,
    /// Number of failures across evacuate, update and restore
    pub failed: usize,
    /// Restore was attempted on every handler
    pub restored: bool,
}

impl HostResult {
    /// No phase reported a failure.
    pub fn is_ok(&self) -> bool {
        self.failed == 0
    }

    /// Classification used by the final report.
    pub fn status(&self) -> HostStatus {
        if self.is_ok() {
            HostStatus::Ok
        } else {
            HostStatus::Error
        }
    }
}

impl fmt::Display for HostResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "evacuated={} updated={} failed={} restored={}",
            self.evacuated, self.updated, self.failed, self.restored
        )
    }
}

/// Final classification of a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostStatus {
    /// No failures
    Ok,
    /// At least one failure
    Error,
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostStatus::Ok => write!(f, "OK"),
            HostStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// OK/ERROR counts over all recorded hosts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub ok: usize,
    pub error: usize,
}

impl Tally {
    pub fn total(&self) -> usize {
        self.ok + self.error
    }

    pub fn is_success(&self) -> bool {
        self.error == 0
    }
}

/// Job-wide map from host identifier to its result.
///
/// Workers only ever touch the entry of the host they are running, so a
/// single lock around the map is enough.
#[derive(Debug, Default)]
pub struct Results {
    entries: Mutex<BTreeMap<String, HostResult>>,
}

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, HostResult>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Mutate the entry for `host`, creating a default record on first access.
    pub fn update<R>(&self, host: &str, f: impl FnOnce(&mut HostResult) -> R) -> R {
        let mut entries = self.lock();
        f(entries.entry(host.to_string()).or_default())
    }

    /// Store the final record for `host`.
    pub fn record(&self, host: &str, result: HostResult) {
        self.update(host, |entry| *entry = result);
    }

    /// The record for `host`, if one exists.
    pub fn get(&self, host: &str) -> Option<HostResult> {
        self.lock().get(host).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// All records, sorted by host identifier.
    pub fn snapshot(&self) -> Vec<(String, HostResult)> {
        self.lock()
            .iter()
            .map(|(host, result)| (host.clone(), *result))
            .collect()
    }

    /// Count OK and ERROR hosts.
    pub fn tally(&self) -> Tally {
        self.lock()
            .values()
            .fold(Tally::default(), |mut tally, result| {
                match result.status() {
                    HostStatus::Ok => tally.ok += 1,
                    HostStatus::Error => tally.error += 1,
                }
                tally
            })
    }
}
