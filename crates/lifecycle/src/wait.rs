//! Bounded polling for long-running external operations.
//!
//! Collaborators use this to wait for things they started: live migrations
//! draining a hypervisor, a host coming back from reboot, a CI build
//! finishing.

use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Budget and cadence of a wait loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// Give up once this much time has elapsed
    pub timeout: Duration,
    /// Sleep between attempts
    pub interval: Duration,
}

impl WaitConfig {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Budget proportional to the number of items being waited on.
    pub fn scaled(per_item: Duration, items: usize, interval: Duration) -> Self {
        let items = u32::try_from(items).unwrap_or(u32::MAX);
        Self {
            timeout: per_item.saturating_mul(items),
            interval,
        }
    }
}

/// Call `check` until it reports `true` or the budget runs out.
///
/// The check runs at least once. Check errors count as "not yet" and are
/// logged at debug level, so transient faults (a host refusing connections
/// while it reboots) do not end the wait early. Returns the elapsed time on
/// success and [`Error::Timeout`] when the budget is exhausted.
pub fn wait_until<F>(config: &WaitConfig, what: &str, mut check: F) -> Result<Duration>
where
    F: FnMut() -> anyhow::Result<bool>,
{
    let start = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match check() {
            Ok(true) => return Ok(start.elapsed()),
            Ok(false) => {}
            Err(e) => log::debug!("Waiting for {what}: attempt {attempt} failed: {e:#}"),
        }

        let elapsed = start.elapsed();
        if elapsed >= config.timeout {
            return Err(Error::Timeout {
                what: what.to_string(),
                elapsed,
            });
        }

        log::debug!(
            "Waiting for {what}... ({}s of {}s)",
            elapsed.as_secs(),
            config.timeout.as_secs()
        );
        thread::sleep(config.interval.min(config.timeout - elapsed));
    }
}
