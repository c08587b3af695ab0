use anyhow::{Result, bail};
use lifecycle::{HostContext, PluginArgs, PluginKind, Updater};
use log::error;
use serde_json::{Map, Value};
use std::process::Command;

use crate::runner::{self, quote};

/// Runs a command on the machine drydock runs on.
///
/// Arguments are rendered against the host, so a job can call out to local
/// tooling per host: `{"exec": {"args": ["./drain.sh", "{{ host }}"]}}`.
#[derive(Debug)]
pub struct Exec {
    host: String,
    program: String,
    args: Vec<String>,
    cwd: Option<String>,
    env: Vec<(String, String)>,
    expect_returncode: Option<i64>,
    expect_stdout: Option<String>,
}

pub fn build(ctx: &HostContext<'_>, args: &Value) -> lifecycle::Result<Box<dyn Updater>> {
    let host = ctx.fix_hostname(args)?;

    let mut extra = Map::new();
    extra.insert("host".to_string(), Value::String(host.clone()));
    let rendered = ctx.render(args, &extra)?;
    let plugin = PluginArgs::new(PluginKind::Updater, "exec", &rendered);

    let (program, argv) = command_line(&plugin, plugin.flag("shell", false))?;

    let env = match plugin.get("env") {
        None => Vec::new(),
        Some(Value::Object(vars)) => vars
            .iter()
            .map(|(k, v)| (k.clone(), v.as_str().map_or_else(|| v.to_string(), str::to_string)))
            .collect(),
        Some(other) => return Err(plugin.invalid("env", format!("expected a mapping, got {other}"))),
    };

    let expect_returncode = match plugin.get("expect-returncode") {
        None => None,
        Some(value) => Some(value.as_i64().ok_or_else(|| {
            plugin.invalid("expect-returncode", format!("expected an integer, got {value}"))
        })?),
    };

    Ok(Box::new(Exec {
        host,
        program,
        args: argv,
        cwd: plugin.str("cwd").map(str::to_string),
        env,
        expect_returncode,
        expect_stdout: plugin.str("expect-stdout").map(str::to_string),
    }))
}

/// Program and arguments from `args` (a list or a single string).
fn command_line(plugin: &PluginArgs<'_>, shell: bool) -> lifecycle::Result<(String, Vec<String>)> {
    let words: Vec<String> = match plugin.required("args")? {
        Value::String(line) => vec![line.clone()],
        Value::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| item.as_str().map_or_else(|| item.to_string(), str::to_string))
            .collect(),
        other => {
            return Err(plugin.invalid("args", format!("expected a command, got {other}")));
        }
    };

    if shell {
        let line = if words.len() == 1 {
            words[0].clone()
        } else {
            words.iter().map(|w| quote(w).into_owned()).collect::<Vec<_>>().join(" ")
        };
        return Ok(("sh".to_string(), vec!["-c".to_string(), line]));
    }

    let mut words = words.into_iter();
    let program = words.next().unwrap_or_default();
    Ok((program, words.collect()))
}

impl Exec {
    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        command.envs(self.env.iter().map(|(k, v)| (k, v)));
        command
    }
}

impl Updater for Exec {
    fn name(&self) -> &str {
        "exec"
    }

    fn update(&mut self) -> Result<bool> {
        let output = runner::capture(&mut self.command())?;
        let mut ok = true;

        if let Some(expected) = self.expect_returncode {
            let Some(code) = output.code else {
                bail!("{} was killed by a signal", self.program);
            };
            if i64::from(code) != expected {
                error!("[{}] exec returned {code}, expected {expected}", self.host);
                ok = false;
            }
        }
        if let Some(expected) = &self.expect_stdout {
            if output.stdout != *expected {
                error!(
                    "[{}] exec printed {:?}, expected {expected:?}",
                    self.host, output.stdout
                );
                ok = false;
            }
        }

        Ok(ok)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;
    use templating::TemplateEngine;

    fn run(args: Value) -> Result<bool> {
        let templates = TemplateEngine::new();
        let host_args = json!({"rack": "r7"});
        let ctx = HostContext::new("node1", &host_args, &templates);
        build(&ctx, &args)?.update()
    }

    #[test]
    fn test_launch_is_success_without_expectations() {
        assert!(run(json!({"args": ["false"]})).unwrap());
    }

    #[test]
    fn test_expect_returncode() {
        assert!(run(json!({"args": ["sh", "-c", "exit 3"], "expect-returncode": 3})).unwrap());
        assert!(!run(json!({"args": ["true"], "expect-returncode": 1})).unwrap());
    }

    #[test]
    fn test_expect_stdout_with_host_variables() {
        assert!(
            run(json!({
                "fix-hostname": "{{ host }}.mgmt",
                "args": ["echo", "{{ host }} {{ rack }}"],
                "expect-stdout": "node1.mgmt r7\n"
            }))
            .unwrap()
        );
    }

    #[test]
    fn test_shell_and_env() {
        assert!(
            run(json!({
                "args": "printf %s \"$TARGET\"",
                "shell": true,
                "env": {"TARGET": "{{ host }}"},
                "expect-stdout": "node1"
            }))
            .unwrap()
        );
    }

    #[test]
    fn test_cwd() {
        let dir = tempfile::TempDir::new().unwrap();
        let expected = format!("{}\n", dir.path().canonicalize().unwrap().display());
        assert!(
            run(json!({
                "args": ["pwd", "-P"],
                "cwd": dir.path().to_str().unwrap(),
                "expect-stdout": expected
            }))
            .unwrap()
        );
    }

    #[test]
    fn test_missing_program_is_error() {
        assert!(run(json!({"args": ["definitely-not-a-real-program-xyz"]})).is_err());
    }

    #[test]
    fn test_invalid_arguments() {
        let templates = TemplateEngine::new();
        let host_args = json!({});
        let ctx = HostContext::new("node1", &host_args, &templates);

        for args in [json!({}), json!({"args": []}), json!({"args": ["ls"], "env": "X=1"})] {
            assert!(build(&ctx, &args).unwrap_err().is_configuration(), "{args}");
        }
    }
}
