//! Updaters that run a single command over ssh.

use anyhow::Result;
use lifecycle::{HostContext, PluginArgs, PluginKind, Updater};
use log::warn;
use serde_json::Value;

use crate::runner::quote;
use crate::ssh::Remote;

const DEFAULT_TOUCH_FILE: &str = ".silently.updated";

/// Runs an arbitrary command.
#[derive(Debug)]
pub struct SshCommand<R> {
    host: String,
    remote: R,
    command: Option<String>,
}

pub fn build_command<R: Remote + 'static>(
    ctx: &HostContext<'_>,
    args: &Value,
    remote: R,
) -> lifecycle::Result<Box<dyn Updater>> {
    let host = ctx.fix_hostname(args)?;
    let command = match args.get("command") {
        Some(Value::String(command)) if !command.trim().is_empty() => Some(command.clone()),
        other => {
            warn!("[{host}] Invalid ssh command {other:?}");
            None
        }
    };

    Ok(Box::new(SshCommand {
        host,
        remote,
        command,
    }))
}

impl<R: Remote> Updater for SshCommand<R> {
    fn name(&self) -> &str {
        "ssh"
    }

    fn update(&mut self) -> Result<bool> {
        let Some(command) = &self.command else {
            return Ok(false);
        };

        let output = self.remote.exec(command)?;
        if !output.stderr.is_empty() {
            log::debug!("[{}] {}", self.host, output.stderr.trim());
        }
        Ok(true)
    }
}

/// Touches a file, proving the host is reachable and writable.
#[derive(Debug)]
pub struct SshTouchFile<R> {
    remote: R,
    filename: String,
}

pub fn build_touch_file<R: Remote + 'static>(
    _ctx: &HostContext<'_>,
    args: &Value,
    remote: R,
) -> lifecycle::Result<Box<dyn Updater>> {
    let args = PluginArgs::new(PluginKind::Updater, "ssh-touch-file", args);
    Ok(Box::new(SshTouchFile {
        remote,
        filename: args.str("filename").unwrap_or(DEFAULT_TOUCH_FILE).to_string(),
    }))
}

impl<R: Remote> Updater for SshTouchFile<R> {
    fn name(&self) -> &str {
        "ssh-touch-file"
    }

    fn update(&mut self) -> Result<bool> {
        let output = self.remote.exec(&format!("touch {}", quote(&self.filename)))?;
        Ok(output.stderr.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::updaters::tests::{FakeRemote, stderr};
    use serde_json::json;
    use std::sync::Arc;
    use templating::TemplateEngine;

    fn run(
        build: fn(&HostContext<'_>, &Value, FakeRemote) -> lifecycle::Result<Box<dyn Updater>>,
        args: Value,
        remote: FakeRemote,
    ) -> (bool, Vec<String>) {
        let commands = Arc::clone(&remote.commands);
        let templates = TemplateEngine::new();
        let host_args = json!({});
        let ctx = HostContext::new("node1", &host_args, &templates);

        let ok = build(&ctx, &args, remote).unwrap().update().unwrap();
        let commands = commands.lock().unwrap().clone();
        (ok, commands)
    }

    #[test]
    fn test_ssh_command() {
        let (ok, commands) = run(build_command, json!({"command": "uptime"}), FakeRemote::default());
        assert!(ok);
        assert_eq!(commands, vec!["uptime"]);
    }

    #[test]
    fn test_ssh_invalid_command_fails() {
        for args in [json!({}), json!({"command": ""}), json!({"command": ["ls"]})] {
            let (ok, commands) = run(build_command, args, FakeRemote::default());
            assert!(!ok);
            assert!(commands.is_empty());
        }
    }

    #[test]
    fn test_touch_file() {
        let (ok, commands) = run(build_touch_file, json!({}), FakeRemote::default());
        assert!(ok);
        assert_eq!(commands, vec!["touch .silently.updated"]);

        let (ok, commands) = run(
            build_touch_file,
            json!({"filename": "/var/tmp/maintenance done"}),
            FakeRemote::with_outputs([stderr("touch: Permission denied")]),
        );
        assert!(!ok);
        assert_eq!(commands, vec!["touch '/var/tmp/maintenance done'"]);
    }
}
