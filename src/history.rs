//! In-memory scan history
//!
//! Every finished scan appends a [`ScanSummary`]. The history is unbounded,
//! ordered by completion, and lives only as long as the process. It backs the
//! report printed after a run:
//! - Total scans and total threats
//! - Time of the last scan
//! - One entry per scan

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Outcome of one completed scan
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ScanSummary {
    /// When the scan finished
    pub timestamp: DateTime<Utc>,
    /// Root directory that was walked
    pub root: PathBuf,
    /// Files iterated, including skipped and unreadable ones
    pub files_scanned: u64,
    /// Files the detection rule flagged
    pub threats_found: u64,
    /// Files at or above the size ceiling
    pub files_skipped: u64,
    /// Per-file read errors
    pub warnings: u64,
    /// Whether the scan stopped early on request
    pub cancelled: bool,
}

impl ScanSummary {
    pub fn new(root: &Path) -> Self {
        Self {
            timestamp: Utc::now(),
            root: root.to_path_buf(),
            files_scanned: 0,
            threats_found: 0,
            files_skipped: 0,
            warnings: 0,
            cancelled: false,
        }
    }

    /// Completion line for the status log
    pub fn message(&self) -> String {
        let mut line = format!(
            "Scan completed. Scanned {} files. Found {} potential threats.",
            self.files_scanned, self.threats_found
        );
        if self.cancelled {
            line.push_str(" (cancelled)");
        }
        line
    }
}

/// Aggregate numbers across all recorded scans
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct HistoryTotals {
    pub total_scans: usize,
    pub threats_found: u64,
    pub last_scan: Option<DateTime<Utc>>,
}

/// Append-only list of scan summaries, shared by clone
#[derive(Debug, Clone, Default)]
pub struct ScanHistory {
    entries: Arc<Mutex<Vec<ScanSummary>>>,
}

impl ScanHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, summary: ScanSummary) {
        self.lock().push(summary);
    }

    /// Snapshot of all summaries, oldest first
    pub fn entries(&self) -> Vec<ScanSummary> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn totals(&self) -> HistoryTotals {
        let entries = self.lock();
        HistoryTotals {
            total_scans: entries.len(),
            threats_found: entries.iter().map(|s| s.threats_found).sum(),
            last_scan: entries.last().map(|s| s.timestamp),
        }
    }

    // A panicking writer cannot leave a half-pushed Vec behind, so a poisoned
    // lock is still safe to read.
    fn lock(&self) -> MutexGuard<'_, Vec<ScanSummary>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn summary(threats: u64) -> ScanSummary {
        let mut summary = ScanSummary::new(Path::new("/scan/root"));
        summary.files_scanned = 10;
        summary.threats_found = threats;
        summary
    }

    #[test]
    fn test_new_history_is_empty() {
        let history = ScanHistory::new();
        assert!(history.is_empty());
        assert_eq!(history.totals(), HistoryTotals::default());
    }

    #[test]
    fn test_record_keeps_order() {
        let history = ScanHistory::new();
        history.record(summary(1));
        history.record(summary(2));
        history.record(summary(3));

        let threats: Vec<u64> = history.entries().iter().map(|s| s.threats_found).collect();
        assert_eq!(threats, vec![1, 2, 3]);
    }

    #[test]
    fn test_totals() {
        let history = ScanHistory::new();
        history.record(summary(2));
        let last = summary(5);
        let last_time = last.timestamp;
        history.record(last);

        let totals = history.totals();
        assert_eq!(totals.total_scans, 2);
        assert_eq!(totals.threats_found, 7);
        assert_eq!(totals.last_scan, Some(last_time));
    }

    #[test]
    fn test_concurrent_append() {
        let history = ScanHistory::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let history = history.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        history.record(summary(1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(history.len(), 200);
        assert_eq!(history.totals().threats_found, 200);
    }

    #[test]
    fn test_summary_message() {
        let mut s = summary(4);
        assert_eq!(s.message(), "Scan completed. Scanned 10 files. Found 4 potential threats.");
        s.cancelled = true;
        assert!(s.message().ends_with("(cancelled)"));
    }
}
