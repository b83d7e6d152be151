//! Events emitted while a scan walks the tree

use crate::detection::Digest;
use crate::history::ScanSummary;
use serde::Serialize;
use std::path::PathBuf;

/// A status note is emitted every this many files
pub const PROGRESS_NOTE_INTERVAL: u64 = 10;

/// Counters for the scan in progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanProgress {
    pub files_scanned: u64,
    /// Snapshot taken by the counting pass before the scan starts
    pub files_total: u64,
}

impl ScanProgress {
    /// Completion percentage, 100 for an empty tree
    pub fn percent(&self) -> f64 {
        if self.files_total == 0 {
            return 100.0;
        }
        (self.files_scanned as f64 / self.files_total as f64 * 100.0).min(100.0)
    }

    /// True on every [`PROGRESS_NOTE_INTERVAL`]th file
    pub fn is_checkpoint(&self) -> bool {
        self.files_scanned > 0 && self.files_scanned % PROGRESS_NOTE_INTERVAL == 0
    }
}

/// A file the detection rule flagged
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreatEvent {
    pub file_path: PathBuf,
    pub digest: Digest,
}

/// Per-file failure; the scan carries on with the next file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReadError {
    pub path: PathBuf,
    pub message: String,
}

impl std::fmt::Display for FileReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Could not scan {}: {}", self.path.display(), self.message)
    }
}

impl std::error::Error for FileReadError {}

/// Real-time updates produced by [`crate::scanner::ScanIter`].
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Counting pass finished; the walk is about to start.
    Started { root: PathBuf, files_total: u64 },

    /// A file matched the detection rule.
    Threat(ThreatEvent),

    /// A file was at or above the size ceiling and was not opened.
    Skipped { path: PathBuf, size_bytes: u64 },

    /// A file could not be read.
    Warning(FileReadError),

    /// Emitted after every file, in traversal order.
    Progress(ScanProgress),

    /// Always the last event of a scan.
    Finished(ScanSummary),
}
