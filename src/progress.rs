//! Progress bar and memory snapshots for batch runs.

use std::sync::{Mutex, PoisonError};

use harvester_core::batch::{BatchObserver, BatchStats, OutcomeStatus};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Drives an `indicatif` bar per batch and logs resident memory around it.
pub(crate) struct CliObserver {
    show_bar: bool,
    bar: Mutex<Option<ProgressBar>>,
    start_rss: Mutex<Option<u64>>,
}

impl CliObserver {
    pub(crate) fn new(show_bar: bool) -> Self {
        Self {
            show_bar,
            bar: Mutex::new(None),
            start_rss: Mutex::new(None),
        }
    }
}

impl BatchObserver for CliObserver {
    fn batch_started(&self, label: &str, total: usize) {
        let rss = resident_memory_bytes();
        *self.start_rss.lock().unwrap_or_else(PoisonError::into_inner) = rss;
        debug!(
            label,
            total,
            rss_mib = rss.map(|b| b / BYTES_PER_MIB),
            "batch starting"
        );

        if !self.show_bar || total == 0 {
            return;
        }
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg} [{bar:30}] {pos}/{len} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message(label.to_string());
        *self.bar.lock().unwrap_or_else(PoisonError::into_inner) = Some(bar);
    }

    fn item_finished(&self, _label: &str, _key: &str, _status: OutcomeStatus) {
        if let Some(bar) = self
            .bar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            bar.inc(1);
        }
    }

    fn batch_finished(&self, label: &str, stats: &BatchStats) {
        if let Some(bar) = self
            .bar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            bar.finish_and_clear();
        }

        let start = self
            .start_rss
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let end = resident_memory_bytes();
        let growth = start.zip(end).map(|(s, e)| e.saturating_sub(s) / BYTES_PER_MIB);
        debug!(
            label,
            succeeded = stats.succeeded(),
            failed = stats.failed(),
            rss_mib = end.map(|b| b / BYTES_PER_MIB),
            rss_growth_mib = growth,
            "batch finished"
        );
    }
}

/// Resident set size of this process, where the platform exposes it.
fn resident_memory_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss(&status)
}

fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kib: u64 = line
        .trim_start_matches("VmRSS:")
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;
    Some(kib * 1024)
}
