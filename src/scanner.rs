use crate::config::{Config, ConfigError};
use crate::detection::{self, Digest, DetectionRule, Md5PrefixRule, Sample};
use crate::history::ScanSummary;
use crate::scan_events::{FileReadError, ScanEvent, ScanProgress, ThreatEvent};
use crate::utils;
use globset::GlobSet;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid path: {} does not exist", .0.display())]
    InvalidPath(PathBuf),
}

/// A request to scan one root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub root: PathBuf,
}

impl ScanRequest {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Cooperative cancellation flag, checked before each file
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Knobs for one scanner
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub max_file_size: u64,
    pub prefix_bytes: usize,
    /// Lowercase extensions without the dot; `None` scans every file
    pub extensions: Option<Vec<String>>,
    pub exclude: GlobSet,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_file_size: 10_000_000,
            prefix_bytes: 1024,
            extensions: None,
            exclude: GlobSet::empty(),
        }
    }
}

impl ScanOptions {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let extensions = config.scan.restrict_to_extensions.then(|| {
            config
                .scan
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect()
        });

        Ok(Self {
            max_file_size: config.scan.max_file_size,
            prefix_bytes: config.scan.prefix_bytes,
            extensions,
            exclude: config.exclusion_set()?,
        })
    }

    fn is_excluded(&self, path: &Path) -> bool {
        !self.exclude.is_empty() && self.exclude.is_match(path)
    }

    fn accepts_extension(&self, path: &Path) -> bool {
        let Some(allowed) = &self.extensions else {
            return true;
        };
        path.extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| allowed.iter().any(|a| *a == ext))
    }
}

/// Walks a tree, fingerprints each file and applies a detection rule
pub struct Scanner {
    options: ScanOptions,
    rule: Arc<dyn DetectionRule>,
}

impl Scanner {
    pub fn new(options: ScanOptions) -> Self {
        Self {
            options,
            rule: Arc::new(Md5PrefixRule),
        }
    }

    /// Swap the detection rule
    pub fn with_rule(mut self, rule: Arc<dyn DetectionRule>) -> Self {
        self.rule = rule;
        self
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn rule_name(&self) -> &str {
        self.rule.name()
    }

    /// Number of files the scan pass will visit
    pub fn count_files(&self, root: &Path) -> u64 {
        self.walk(root)
            .filter_map(|entry| entry.ok())
            .filter(|entry| self.is_candidate(entry))
            .count() as u64
    }

    /// Start a scan.
    ///
    /// Counts the tree first so `files_total` is fixed for the run, then
    /// returns a lazy iterator over the second pass. The last event is always
    /// [`ScanEvent::Finished`].
    pub fn scan(&self, request: &ScanRequest, cancel: CancelToken) -> Result<ScanIter<'_>, ScanError> {
        let root = request.root.as_path();
        if !root.exists() {
            return Err(ScanError::InvalidPath(root.to_path_buf()));
        }

        let files_total = self.count_files(root);
        tracing::debug!(root = %root.display(), files_total, rule = self.rule.name(), "starting scan");

        let mut pending = VecDeque::new();
        pending.push_back(ScanEvent::Started {
            root: root.to_path_buf(),
            files_total,
        });

        Ok(ScanIter {
            scanner: self,
            walker: Box::new(self.walk(root)),
            cancel,
            progress: ScanProgress {
                files_scanned: 0,
                files_total,
            },
            summary: ScanSummary::new(root),
            pending,
            finished: false,
        })
    }

    fn walk<'a>(&'a self, root: &Path) -> impl Iterator<Item = walkdir::Result<DirEntry>> + 'a {
        WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                // The root itself is always walked
                if entry.depth() == 0 {
                    return true;
                }
                if self.options.is_excluded(entry.path()) {
                    return false;
                }
                // Never descend into junctions; file links are still scanned
                !utils::is_windows_reparse_point(entry.path()) || is_file_link(entry)
            })
    }

    fn is_candidate(&self, entry: &DirEntry) -> bool {
        (entry.file_type().is_file() || is_file_link(entry))
            && self.options.accepts_extension(entry.path())
    }
}

/// A symlink that does not resolve to a directory.
///
/// Dangling links count too, so reading them surfaces as a warning.
fn is_file_link(entry: &DirEntry) -> bool {
    entry.file_type().is_symlink()
        && !fs::metadata(entry.path()).map_or(false, |meta| meta.is_dir())
}

/// Lazy second pass of a scan
pub struct ScanIter<'a> {
    scanner: &'a Scanner,
    walker: Box<dyn Iterator<Item = walkdir::Result<DirEntry>> + 'a>,
    cancel: CancelToken,
    progress: ScanProgress,
    summary: ScanSummary,
    pending: VecDeque<ScanEvent>,
    finished: bool,
}

impl ScanIter<'_> {
    pub fn progress(&self) -> ScanProgress {
        self.progress
    }

    fn inspect(&mut self, entry: &DirEntry) {
        self.progress.files_scanned += 1;
        self.summary.files_scanned = self.progress.files_scanned;

        let path = entry.path();
        let scanner = self.scanner;
        let options = &scanner.options;

        // Follows links, unlike `DirEntry::metadata`
        match fs::metadata(path) {
            Err(e) => self.warn(path, e.to_string()),
            Ok(meta) if meta.len() >= options.max_file_size => {
                self.summary.files_skipped += 1;
                self.pending.push_back(ScanEvent::Skipped {
                    path: path.to_path_buf(),
                    size_bytes: meta.len(),
                });
            }
            Ok(_) => match detection::read_prefix(path, options.prefix_bytes) {
                Err(e) => self.warn(path, e.to_string()),
                Ok(prefix) => {
                    let digest = Digest::of(&prefix);
                    let verdict = scanner.rule.evaluate(&Sample {
                        prefix: &prefix,
                        digest: &digest,
                    });
                    if verdict.is_suspicious() {
                        tracing::debug!(path = %path.display(), %digest, "file flagged");
                        self.summary.threats_found += 1;
                        self.pending.push_back(ScanEvent::Threat(ThreatEvent {
                            file_path: path.to_path_buf(),
                            digest,
                        }));
                    }
                }
            },
        }

        self.pending.push_back(ScanEvent::Progress(self.progress));
    }

    fn warn(&mut self, path: &Path, message: String) {
        tracing::debug!(path = %path.display(), error = %message, "unreadable entry");
        self.summary.warnings += 1;
        self.pending.push_back(ScanEvent::Warning(FileReadError {
            path: path.to_path_buf(),
            message,
        }));
    }

    fn finish(&mut self) {
        self.finished = true;
        self.summary.timestamp = chrono::Utc::now();
        tracing::info!(
            root = %self.summary.root.display(),
            files_scanned = self.summary.files_scanned,
            threats_found = self.summary.threats_found,
            cancelled = self.summary.cancelled,
            "scan finished"
        );
        self.pending.push_back(ScanEvent::Finished(self.summary.clone()));
    }
}

impl Iterator for ScanIter<'_> {
    type Item = ScanEvent;

    fn next(&mut self) -> Option<ScanEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.finished {
                return None;
            }
            if self.cancel.is_cancelled() {
                self.summary.cancelled = true;
                self.finish();
                continue;
            }

            match self.walker.next() {
                None => self.finish(),
                Some(Ok(entry)) => {
                    if self.scanner.is_candidate(&entry) {
                        self.inspect(&entry);
                    }
                }
                Some(Err(e)) => {
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.summary.root.clone());
                    self.warn(&path, e.to_string());
                }
            }
        }
    }
}
