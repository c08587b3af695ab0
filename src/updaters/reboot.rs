use anyhow::Result;
use lifecycle::{HostContext, PluginArgs, PluginKind, Updater, WaitConfig, wait_until};
use log::{debug, error};
use serde_json::Value;
use std::thread;
use std::time::Duration;

use crate::ssh::Remote;

const DEFAULT_WAIT_TIMEOUT: u64 = 500;
const DEFAULT_CHECK_INTERVAL: u64 = 10;

/// Reboots the host and, unless told otherwise, waits for ssh to come back.
#[derive(Debug)]
pub struct Reboot<R> {
    host: String,
    remote: R,
    wait: bool,
    timeout: Duration,
    interval: Duration,
}

pub fn build<R: Remote + 'static>(
    ctx: &HostContext<'_>,
    args: &Value,
    remote: R,
) -> lifecycle::Result<Box<dyn Updater>> {
    let plugin = PluginArgs::new(PluginKind::Updater, "reboot", args);

    Ok(Box::new(Reboot {
        host: ctx.fix_hostname(args)?,
        remote,
        wait: plugin.flag("wait", true),
        timeout: Duration::from_secs(plugin.positive_int_or("wait-timeout", DEFAULT_WAIT_TIMEOUT)),
        interval: Duration::from_secs(
            plugin.positive_int_or("wait-check-interval", DEFAULT_CHECK_INTERVAL),
        ),
    }))
}

impl<R: Remote> Updater for Reboot<R> {
    fn name(&self) -> &str {
        "reboot"
    }

    fn update(&mut self) -> Result<bool> {
        // The connection usually drops mid-command, so the exit status is meaningless
        self.remote.exec("sudo reboot")?;

        if !self.wait {
            debug!("[{}] Not waiting for reboot", self.host);
            return Ok(true);
        }

        // Give the host time to go down before probing
        thread::sleep(self.interval);

        let connect_timeout = self.interval.as_secs().max(1);
        let config = WaitConfig::new(self.timeout, self.interval);
        match wait_until(&config, &format!("{} to reboot", self.host), || {
            Ok(self.remote.try_connect(connect_timeout))
        }) {
            Ok(elapsed) => {
                debug!("[{}] Back after {}s", self.host, elapsed.as_secs());
                Ok(true)
            }
            Err(e) => {
                error!("[{}] {e}", self.host);
                Ok(false)
            }
        }
    }
}
