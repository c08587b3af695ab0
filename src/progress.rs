//! Progress bar for host lifecycles.

use indicatif::{ProgressBar, ProgressStyle};
use lifecycle::{HostPhase, HostResult, PhaseCallback};

/// Counts finished hosts; hidden when not drawing to a terminal.
pub struct HostProgress {
    bar: ProgressBar,
}

impl HostProgress {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("=>-"));
        bar.set_style(style);
        Self { bar }
    }

    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PhaseCallback for HostProgress {
    fn on_phase(&self, host: &str, phase: HostPhase) {
        match phase {
            HostPhase::Pending | HostPhase::Done => {}
            phase => self.bar.set_message(format!("{host}: {phase}")),
        }
    }

    fn on_host_complete(&self, _host: &str, _result: &HostResult) {
        self.bar.inc(1);
    }
}
