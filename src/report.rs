//! Final per-host report and tally.

use colored::Colorize;
use lifecycle::{HostResult, HostStatus, Results, Tally};

/// One report line without the status mark, host name padded to `width`.
pub fn format_line(host: &str, result: &HostResult, width: usize) -> String {
    format!("{host:<width$}  {result}")
}

/// The tally line.
pub fn format_tally(tally: &Tally) -> String {
    format!("OK: {}  ERROR: {}", tally.ok, tally.error)
}

/// Print every host (sorted by identifier) and the tally; return the tally.
pub fn print(results: &Results) -> Tally {
    let entries = results.snapshot();
    let width = entries.iter().map(|(host, _)| host.len()).max().unwrap_or(0);

    println!();
    for (host, result) in &entries {
        let line = format_line(host, result, width);
        match result.status() {
            HostStatus::Ok => println!("{} {line}", "✓".green()),
            HostStatus::Error => println!("{} {}", "✗".red(), line.red()),
        }
    }

    let tally = results.tally();
    let summary = format_tally(&tally);
    println!();
    if tally.is_success() {
        println!("{}", summary.green().bold());
    } else {
        println!("{}", summary.red().bold());
    }

    tally
}
