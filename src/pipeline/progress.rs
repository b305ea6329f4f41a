//! Throttled per-kind progress reporting.

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::models::EntityKind;

/// Minimum time between two progress messages.
pub const REPORT_INTERVAL: Duration = Duration::from_millis(500);

/// Elements per second; zero while no time has passed.
pub fn throughput(elements: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        elements as f64 / secs
    } else {
        0.0
    }
}

pub struct Progress {
    kind: EntityKind,
    bar: ProgressBar,
    started: Instant,
    last_report: Option<Instant>,
    elements: u64,
    records: u64,
}

impl Progress {
    /// A bar over `shards`; `visible = false` keeps it off the terminal.
    pub fn new(kind: EntityKind, shards: usize, visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new(shards as u64)
        } else {
            ProgressBar::hidden()
        };
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);

        Self {
            kind,
            bar,
            started: Instant::now(),
            last_report: None,
            elements: 0,
            records: 0,
        }
    }

    /// Count one stored shard.
    pub fn shard_done(&mut self, raw_count: usize, records: usize) {
        self.elements += raw_count as u64;
        self.records += records as u64;
        self.bar.inc(1);

        let now = Instant::now();
        if should_report(self.last_report, now) {
            self.last_report = Some(now);
            self.bar.set_message(self.message());
        }
    }

    pub fn elements(&self) -> u64 {
        self.elements
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    fn message(&self) -> String {
        format!(
            "{} elements, {:.0}/s",
            self.elements,
            throughput(self.elements, self.started.elapsed())
        )
    }

    /// Final report, always emitted.
    pub fn finish(self) -> Duration {
        let elapsed = self.started.elapsed();
        self.bar.finish_with_message(self.message());
        info!(
            "{}: {} elements, {} stored in {:.1}s ({:.0} elements/s)",
            self.kind,
            self.elements,
            self.records,
            elapsed.as_secs_f64(),
            throughput(self.elements, elapsed)
        );
        elapsed
    }
}

fn should_report(last: Option<Instant>, now: Instant) -> bool {
    match last {
        Some(last) => now.duration_since(last) >= REPORT_INTERVAL,
        None => true,
    }
}
