use anyhow::{Context, Result};
use std::process::{Command, Stdio};

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Run a prepared command to completion and capture its output.
///
/// A non-zero exit is not an error here; only failing to launch is.
pub fn capture(command: &mut Command) -> Result<CommandOutput> {
    let display = describe(command);

    let output = command
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute: {display}"))?;

    let result = CommandOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    log::debug!(
        "exec: {display} -> returncode={:?} stdout={:?} stderr={:?}",
        result.code,
        result.stdout,
        result.stderr
    );

    Ok(result)
}

/// Command line as it would be typed, for logs and errors.
fn describe(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|part| quote(&part.to_string_lossy()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote a word for a POSIX shell.
pub fn quote(word: &str) -> std::borrow::Cow<'_, str> {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c));

    if safe {
        word.into()
    } else {
        format!("'{}'", word.replace('\'', r"'\''")).into()
    }
}
