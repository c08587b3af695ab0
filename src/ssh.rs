//! Remote commands through the system `ssh` client.

use anyhow::Result;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use crate::config::Settings;
use crate::runner::{self, CommandOutput};

/// Connection timeout used when a host does not set `ssh-timeout`.
pub const DEFAULT_TIMEOUT: u64 = 5;

/// A host that accepts commands.
pub trait Remote: Send + fmt::Debug {
    /// Run `command` on the host and capture its output.
    fn exec(&self, command: &str) -> Result<CommandOutput>;

    /// Whether a session can be opened within `timeout` seconds.
    fn try_connect(&self, timeout: u64) -> bool;
}

/// How to reach one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub user: String,
    pub identity: PathBuf,
    pub config_file: PathBuf,
    pub strict_host_key_checking: bool,
    pub timeout: u64,
    pub proxy_command: Option<String>,
}

impl SshTarget {
    /// Connection parameters for `host`; host arguments override settings.
    pub fn new(host: &str, host_args: &Value, settings: &Settings) -> Self {
        Self {
            host: host.to_string(),
            user: str_arg(host_args, "ssh-user").unwrap_or(&settings.ssh_user).to_string(),
            identity: str_arg(host_args, "ssh-id-rsa-file")
                .map_or_else(|| settings.ssh_id_rsa_file.clone(), PathBuf::from),
            config_file: settings.ssh_config_file.clone(),
            strict_host_key_checking: settings.ssh_strict_host_key_checking,
            timeout: lifecycle::positive_int(host_args.get("ssh-timeout"))
                .unwrap_or(DEFAULT_TIMEOUT),
            proxy_command: str_arg(host_args, "ssh-proxycommand").map(str::to_string),
        }
    }

    /// Arguments for `ssh`, up to and including the destination host.
    pub fn args(&self, timeout: u64) -> Vec<String> {
        let mut args = Vec::new();

        if self.config_file.is_file() {
            args.push("-F".to_string());
            args.push(self.config_file.display().to_string());
        }
        if self.identity.is_file() {
            args.push("-i".to_string());
            args.push(self.identity.display().to_string());
        }
        args.extend(["-l".to_string(), self.user.clone()]);

        let strict = if self.strict_host_key_checking {
            "yes"
        } else {
            "no"
        };
        for option in [
            format!("ConnectTimeout={timeout}"),
            "BatchMode=yes".to_string(),
            format!("StrictHostKeyChecking={strict}"),
            "LogLevel=ERROR".to_string(),
        ] {
            args.push("-o".to_string());
            args.push(option);
        }
        if let Some(proxy) = &self.proxy_command {
            log::debug!("[{}] Using proxy command {proxy}", self.host);
            args.push("-o".to_string());
            args.push(format!("ProxyCommand={proxy}"));
        }

        args.push(self.host.clone());
        args
    }

    fn command(&self, timeout: u64, remote: &str) -> Command {
        let mut command = Command::new("ssh");
        command.args(self.args(timeout)).arg(remote);
        command
    }
}

impl Remote for SshTarget {
    fn exec(&self, command: &str) -> Result<CommandOutput> {
        runner::capture(&mut self.command(self.timeout, command))
    }

    fn try_connect(&self, timeout: u64) -> bool {
        runner::capture(&mut self.command(timeout, "true")).is_ok_and(|out| out.success())
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}
