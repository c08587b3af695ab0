use anyhow::Result;
use lifecycle::{HostContext, PluginArgs, PluginKind, Updater, truthy};
use log::error;
use serde_json::{Map, Value};

use crate::runner::quote;
use crate::ssh::Remote;

const APT_GET: &str =
    "sudo DEBIAN_FRONTEND=noninteractive apt-get -y -q -o Dpkg::Options::=--force-confold";

/// Non-interactive package upgrade, optionally followed by an autoremove and
/// a Patchman report.
#[derive(Debug)]
pub struct Apt<R> {
    host: String,
    remote: R,
    autoremove: bool,
    patchman_url: Option<String>,
}

pub fn build<R: Remote + 'static>(
    ctx: &HostContext<'_>,
    args: &Value,
    remote: R,
) -> lifecycle::Result<Box<dyn Updater>> {
    let plugin = PluginArgs::new(PluginKind::Updater, "apt", args);
    let host = ctx.fix_hostname(args)?;

    // `autoremove` may be a template, e.g. "{{ args.cleanup }}"
    let autoremove = match plugin.get("autoremove") {
        Some(value) => truthy(Some(&ctx.render(value, &Map::new())?)),
        None => false,
    };

    Ok(Box::new(Apt {
        host,
        remote,
        autoremove,
        patchman_url: plugin.str("patchman-url").map(str::to_string),
    }))
}

impl<R: Remote> Apt<R> {
    /// Run an apt-get subcommand; success iff nothing was written to stderr.
    fn apt_get(&self, subcommand: &str) -> Result<bool> {
        let output = self.remote.exec(&format!("{APT_GET} {subcommand};"))?;
        if output.stderr.is_empty() {
            Ok(true)
        } else {
            error!("[{}] apt-get {subcommand}: {}", self.host, output.stderr.trim());
            Ok(false)
        }
    }
}

impl<R: Remote> Updater for Apt<R> {
    fn name(&self) -> &str {
        "apt"
    }

    fn update(&mut self) -> Result<bool> {
        if !self.apt_get("upgrade")? {
            return Ok(false);
        }
        if self.autoremove && !self.apt_get("autoremove")? {
            return Ok(false);
        }
        if let Some(url) = &self.patchman_url {
            self.remote
                .exec(&format!("sudo patchman-client -s {}", quote(url)))?;
        }
        Ok(true)
    }
}
