//! Status sink shared by the scanner and the analysis workers
//!
//! Producers append [`StatusEvent`]s through cloned [`StatusSink`] handles and
//! never read anything back. The presentation layer owns the single
//! [`StatusFeed`]. The channel is unbounded, so appending never blocks.

use crate::analysis::AnalysisResult;
use crate::history::ScanSummary;
use crate::scan_events::{FileReadError, ScanProgress, ThreatEvent};
use crate::utils;
use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// One entry in the status log
#[derive(Debug, Clone)]
pub enum StatusEvent {
    /// Free-form note
    Info(String),
    /// A failure the user must see, e.g. a scan root that does not exist
    Error(String),
    ScanStarted { root: PathBuf, files_total: u64 },
    /// Per-file counters; renders as the periodic "Scanned N/M" note
    Progress(ScanProgress),
    Threat(ThreatEvent),
    Warning(FileReadError),
    Analysis(AnalysisResult),
    Completed(ScanSummary),
}

impl StatusEvent {
    /// Whether a text log should print this event.
    ///
    /// Progress is only worth a line on every tenth file.
    pub fn is_loggable(&self) -> bool {
        match self {
            StatusEvent::Progress(progress) => progress.is_checkpoint(),
            _ => true,
        }
    }

    /// Failures that stay visible even in quiet mode
    pub fn is_error(&self) -> bool {
        match self {
            StatusEvent::Error(_) | StatusEvent::Warning(_) => true,
            StatusEvent::Analysis(result) => result.outcome.is_err(),
            _ => false,
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::Info(message) => f.write_str(message),
            StatusEvent::Error(message) => write!(f, "Error: {}", message),
            StatusEvent::ScanStarted { root, files_total } => write!(
                f,
                "Scanning {} ({} files)...",
                utils::display_path(root),
                files_total
            ),
            StatusEvent::Progress(p) => {
                write!(f, "Scanned {}/{} files...", p.files_scanned, p.files_total)
            }
            StatusEvent::Threat(threat) => write!(
                f,
                "ALERT: Potential threat in {}",
                utils::display_path(&threat.file_path)
            ),
            StatusEvent::Warning(err) => write!(f, "{}", err),
            StatusEvent::Analysis(result) => write!(f, "{}", result),
            StatusEvent::Completed(summary) => f.write_str(&summary.message()),
        }
    }
}

/// Append-only handle to the status log
#[derive(Debug, Clone)]
pub struct StatusSink {
    tx: Sender<StatusEvent>,
}

/// Result of waiting on the feed
#[derive(Debug)]
pub enum FeedPoll {
    Event(StatusEvent),
    /// Nothing arrived before the timeout
    Idle,
    /// Every sink handle is gone and the log is drained
    Closed,
}

/// Consumer side of the status log
#[derive(Debug)]
pub struct StatusFeed {
    rx: Receiver<StatusEvent>,
}

impl StatusSink {
    pub fn channel() -> (StatusSink, StatusFeed) {
        let (tx, rx) = mpsc::channel();
        (StatusSink { tx }, StatusFeed { rx })
    }

    /// Append an event. Dropped silently once the feed is gone.
    pub fn append(&self, event: StatusEvent) {
        let _ = self.tx.send(event);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.append(StatusEvent::Info(message.into()));
    }
}

impl StatusFeed {
    /// Wait up to `timeout` for the next event
    pub fn poll(&self, timeout: Duration) -> FeedPoll {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => FeedPoll::Event(event),
            Err(RecvTimeoutError::Timeout) => FeedPoll::Idle,
            Err(RecvTimeoutError::Disconnected) => FeedPoll::Closed,
        }
    }

    /// Everything appended so far, without blocking
    pub fn drain(&self) -> Vec<StatusEvent> {
        self.rx.try_iter().collect()
    }

    /// Block until every sink handle is dropped
    pub fn into_iter_blocking(self) -> impl Iterator<Item = StatusEvent> {
        self.rx.into_iter()
    }
}
