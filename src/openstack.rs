//! OpenStack CLI invocation and table output parsing.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;

use crate::runner::{self, CommandOutput};

/// One data row of a table, column name → cell.
pub type Row = BTreeMap<String, String>;

/// Errors from parsing `+----+` table output.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("table output too short ({0} lines)")]
    TooShort(usize),

    #[error("line {line} is not a table border: {content:?}")]
    BadBorder { line: usize, content: String },

    #[error("line {line} has {found} cells, expected {expected}")]
    CellCount {
        line: usize,
        found: usize,
        expected: usize,
    },
}

/// Parse the table format printed by OpenStack clients.
///
/// ```text
/// +----+--------+
/// | ID | Name   |
/// +----+--------+
/// | 1  | vm-one |
/// +----+--------+
/// ```
///
/// The first, third and last lines must be borders made of `+` and `-`.
/// An empty table (header only) yields no rows.
pub fn parse_table(output: &str) -> std::result::Result<Vec<Row>, TableError> {
    let lines: Vec<&str> = output.trim_end().lines().map(str::trim_end).collect();
    if lines.len() < 4 {
        return Err(TableError::TooShort(lines.len()));
    }

    let last = lines.len() - 1;
    for index in [0, 2, last] {
        let content = lines[index];
        if content.is_empty() || !content.chars().all(|c| c == '+' || c == '-') {
            return Err(TableError::BadBorder {
                line: index + 1,
                content: content.to_string(),
            });
        }
    }

    let columns = cells(lines[1]);
    lines[3..last]
        .iter()
        .enumerate()
        .map(|(offset, line)| {
            let values = cells(line);
            if values.len() != columns.len() {
                return Err(TableError::CellCount {
                    line: offset + 4,
                    found: values.len(),
                    expected: columns.len(),
                });
            }
            Ok(columns
                .iter()
                .map(|c| (*c).to_string())
                .zip(values.into_iter().map(str::to_string))
                .collect())
        })
        .collect()
}

/// `| a | b |` → `["a", "b"]`
fn cells(line: &str) -> Vec<&str> {
    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() < 2 {
        return Vec::new();
    }
    parts[1..parts.len() - 1].iter().map(|c| c.trim()).collect()
}

/// Runs OpenStack clients with credentials sourced from an rc file.
#[derive(Debug, Clone)]
pub struct OpenStack {
    rc: PathBuf,
}

impl OpenStack {
    pub fn new(rc: impl Into<PathBuf>) -> Self {
        Self { rc: rc.into() }
    }

    fn command(&self, cmd: &str) -> Command {
        let rc = self.rc.display().to_string();
        let mut command = Command::new("bash");
        command
            .arg("-c")
            .arg(format!(". {} && {cmd}", runner::quote(&rc)));
        command
    }

    /// Run `cmd` and capture its output.
    pub fn run(&self, cmd: &str) -> Result<CommandOutput> {
        runner::capture(&mut self.command(cmd))
    }

    /// Run `cmd` and parse its table output.
    pub fn table(&self, cmd: &str) -> Result<Vec<Row>> {
        let output = self.run(cmd)?;
        let rows = parse_table(&output.stdout).with_context(|| {
            format!("Unexpected output from `{cmd}`: {}", output.stderr.trim())
        })?;
        log::debug!("{cmd}: {rows:?}");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVERS: &str = "\
+--------------------------------------+-------------------+---------------+
| ID                                   | Name              | Hypervisor ID |
+--------------------------------------+-------------------+---------------+
| 0b1a5f4e-1111-2222-3333-444455556666 | instance-00000001 | 1             |
| 7c2d9e0f-aaaa-bbbb-cccc-ddddeeeeffff | instance-00000002 | 1             |
+--------------------------------------+-------------------+---------------+
";

    #[test]
    fn test_parse_table() {
        let rows = parse_table(SERVERS).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["ID"], "0b1a5f4e-1111-2222-3333-444455556666");
        assert_eq!(rows[1]["Name"], "instance-00000002");
        assert_eq!(rows[1]["Hypervisor ID"], "1");
    }

    #[test]
    fn test_parse_empty_table() {
        let output = "+----+------+\n| ID | Name |\n+----+------+\n+----+------+\n";
        assert!(parse_table(output).unwrap().is_empty());
    }

    #[test]
    fn test_empty_cells_are_kept() {
        let output = "+---+---+\n| A | B |\n+---+---+\n| x |   |\n+---+---+";
        let rows = parse_table(output).unwrap();
        assert_eq!(rows[0]["B"], "");
    }

    #[test]
    fn test_malformed_tables() {
        assert_eq!(parse_table(""), Err(TableError::TooShort(0)));
        assert_eq!(
            parse_table("ERROR (Unauthorized)\n| a |\n+---+\n+---+"),
            Err(TableError::BadBorder {
                line: 1,
                content: "ERROR (Unauthorized)".to_string()
            })
        );
        assert!(matches!(
            parse_table("+---+\n| A |\n+---+\n| x | y |\n+---+"),
            Err(TableError::CellCount { line: 4, found: 2, expected: 1 })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_commands_source_the_rc_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let rc = dir.path().join("admin rc");
        std::fs::write(&rc, "export OS_CLOUD=lab\n").unwrap();

        let output = OpenStack::new(&rc).run("printf %s \"$OS_CLOUD\"").unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "lab");

        assert!(!OpenStack::new(dir.path().join("missing.rc")).run("true").unwrap().success());
    }
}
