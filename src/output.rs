use crate::analysis::AnalysisResult;
use crate::history::{HistoryTotals, ScanHistory, ScanSummary};
use crate::progress;
use crate::scan_events::ThreatEvent;
use crate::scanner::ScanOptions;
use crate::sink::StatusEvent;
use crate::theme::Theme;
use crate::utils;
use indicatif::ProgressBar;
use serde::Serialize;
use std::io::{self, Write};

/// Output verbosity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Quiet,       // Only errors
    Normal,      // Standard output
    Verbose,     // Progress notes and digests
    VeryVerbose, // All details including settings
}

impl OutputMode {
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            OutputMode::Quiet
        } else {
            match verbose {
                0 => OutputMode::Normal,
                1 => OutputMode::Verbose,
                _ => OutputMode::VeryVerbose,
            }
        }
    }

    fn is_verbose(self) -> bool {
        matches!(self, OutputMode::Verbose | OutputMode::VeryVerbose)
    }
}

/// Renders the status feed on the terminal as it arrives.
///
/// In JSON and quiet modes only failures are printed live, as plain lines on
/// stderr; threats and analyses are collected for the final report instead.
pub struct ConsoleReporter {
    mode: OutputMode,
    json: bool,
    bar: Option<ProgressBar>,
    errors: Box<dyn Write>,
    threats: Vec<ThreatEvent>,
    analyses: Vec<AnalysisResult>,
}

impl ConsoleReporter {
    pub fn new(mode: OutputMode, json: bool) -> Self {
        Self {
            mode,
            json,
            bar: None,
            errors: Box::new(io::stderr()),
            threats: Vec::new(),
            analyses: Vec::new(),
        }
    }

    /// Redirect the failure lines printed outside live mode
    pub fn with_error_output(mut self, errors: Box<dyn Write>) -> Self {
        self.errors = errors;
        self
    }

    fn live(&self) -> bool {
        !self.json && self.mode != OutputMode::Quiet
    }

    /// Print above the progress bar without tearing it
    fn emit(&self, line: impl std::fmt::Display) {
        match &self.bar {
            Some(bar) => bar.suspend(|| println!("{}", line)),
            None => println!("{}", line),
        }
    }

    pub fn handle(&mut self, event: &StatusEvent) {
        match event {
            StatusEvent::Threat(threat) => self.threats.push(threat.clone()),
            StatusEvent::Analysis(result) => self.analyses.push(result.clone()),
            _ => {}
        }

        if !self.live() {
            if event.is_error() {
                let _ = writeln!(self.errors, "{}", event);
            }
            return;
        }

        match event {
            StatusEvent::Info(_) => self.emit(Theme::primary(&event.to_string())),
            StatusEvent::Error(_) => self.emit(Theme::error(&event.to_string())),
            StatusEvent::ScanStarted { files_total, .. } => {
                self.clear_bar();
                println!("{}", Theme::header(&event.to_string()));
                self.bar = Some(progress::create_scan_bar(*files_total));
            }
            StatusEvent::Progress(p) => {
                if let Some(bar) = &self.bar {
                    bar.set_position(p.files_scanned);
                }
                if self.wants_progress_note(event) {
                    self.emit(Theme::muted(&event.to_string()));
                }
            }
            StatusEvent::Threat(threat) => {
                self.emit(Theme::alert(&event.to_string()));
                if self.mode.is_verbose() {
                    self.emit(format!("  {} {}", Theme::muted("md5"), Theme::value(threat.digest.as_str())));
                }
            }
            StatusEvent::Warning(_) => self.emit(Theme::warning(&event.to_string())),
            StatusEvent::Analysis(result) => self.emit(render_analysis(result)),
            StatusEvent::Completed(summary) => {
                self.clear_bar();
                println!("{}", Theme::success(&summary.message()));
                if summary.warnings > 0 {
                    println!(
                        "{}",
                        Theme::muted(&format!("{} files could not be read", summary.warnings))
                    );
                }
            }
        }
    }

    /// Checkpoint notes stand in for the bar when it cannot be drawn
    fn wants_progress_note(&self, event: &StatusEvent) -> bool {
        event.is_loggable()
            && (self.mode.is_verbose() || self.bar.as_ref().map_or(true, ProgressBar::is_hidden))
    }

    fn clear_bar(&mut self) {
        if let Some(bar) = self.bar.take() {
            progress::finish_and_clear(&bar);
        }
    }

    /// Stop live output and hand over what was collected
    pub fn finish(mut self) -> (Vec<ThreatEvent>, Vec<AnalysisResult>) {
        self.clear_bar();
        (self.threats, self.analyses)
    }
}

fn render_analysis(result: &AnalysisResult) -> String {
    let label = utils::file_label(&result.file_path);
    match &result.outcome {
        Ok(text) => format!(
            "\n{}\n{}\n",
            Theme::header(&format!("AI Analysis for {}:", label)),
            text
        ),
        Err(_) => Theme::error(&result.to_string()).to_string(),
    }
}

/// Effective scan settings, shown in very verbose mode
pub fn print_settings(options: &ScanOptions, rule: &str, analysis_ready: bool, mode: OutputMode) {
    if mode != OutputMode::VeryVerbose {
        return;
    }
    println!(
        "{} {}  {} {}  {} {}  {} {}",
        Theme::muted("rule"),
        Theme::value(rule),
        Theme::muted("prefix"),
        Theme::value(&bytesize::to_string(options.prefix_bytes as u64, true)),
        Theme::muted("size limit"),
        Theme::value(&bytesize::to_string(options.max_file_size, true)),
        Theme::muted("ai"),
        Theme::value(if analysis_ready { "on" } else { "off" }),
    );
}

/// The "Scan Reports" view
pub fn print_report(history: &ScanHistory, mode: OutputMode) {
    if mode == OutputMode::Quiet {
        return;
    }

    let totals = history.totals();
    println!();
    println!("{}", Theme::header("Scan Reports"));
    println!("{}", Theme::divider_bold(50));
    println!("{:<15} {}", Theme::primary("Total Scans:"), Theme::value(&totals.total_scans.to_string()));
    println!("{:<15} {}", Theme::primary("Threats Found:"), Theme::value(&totals.threats_found.to_string()));
    println!(
        "{:<15} {}",
        Theme::primary("Last Scan:"),
        Theme::value(&totals.last_scan.map_or_else(|| "Never".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string()))
    );

    for summary in history.entries() {
        println!("{}", Theme::divider(50));
        print_summary(&summary, mode);
    }
    println!();
}

fn print_summary(summary: &ScanSummary, mode: OutputMode) {
    println!(
        "Scan completed at: {}",
        Theme::value(&summary.timestamp.format("%Y-%m-%d %H:%M:%S").to_string())
    );
    println!("Root: {}", utils::display_path(&summary.root));
    println!("Files scanned: {}", summary.files_scanned);
    let threats = summary.threats_found.to_string();
    println!(
        "Threats found: {}",
        if summary.threats_found > 0 { Theme::alert(&threats) } else { Theme::success(&threats) }
    );
    if mode.is_verbose() {
        println!("Skipped (too large): {}", summary.files_skipped);
        println!("Unreadable: {}", summary.warnings);
    }
    if summary.cancelled {
        println!("{}", Theme::warning("Cancelled before completion"));
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    version: String,
    timestamp: String,
    totals: HistoryTotals,
    scans: Vec<ScanSummary>,
    threats: &'a [ThreatEvent],
    analyses: Vec<JsonAnalysis>,
}

#[derive(Serialize)]
struct JsonAnalysis {
    path: String,
    ok: bool,
    text: Option<String>,
    error: Option<String>,
}

impl From<&AnalysisResult> for JsonAnalysis {
    fn from(result: &AnalysisResult) -> Self {
        let (text, error) = match &result.outcome {
            Ok(text) => (Some(text.clone()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            path: result.file_path.to_string_lossy().to_string(),
            ok: error.is_none(),
            text,
            error,
        }
    }
}

pub fn render_json(history: &ScanHistory, threats: &[ThreatEvent], analyses: &[AnalysisResult]) -> serde_json::Result<String> {
    let report = JsonReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        totals: history.totals(),
        scans: history.entries(),
        threats,
        analyses: analyses.iter().map(JsonAnalysis::from).collect(),
    };
    serde_json::to_string_pretty(&report)
}

pub fn print_json(history: &ScanHistory, threats: &[ThreatEvent], analyses: &[AnalysisResult]) -> anyhow::Result<()> {
    println!("{}", render_json(history, threats, analyses)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisError;
    use crate::detection::Digest;
    use crate::scan_events::{FileReadError, ScanProgress};
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_output_mode_from_flags() {
        assert_eq!(OutputMode::from_flags(0, false), OutputMode::Normal);
        assert_eq!(OutputMode::from_flags(1, false), OutputMode::Verbose);
        assert_eq!(OutputMode::from_flags(3, false), OutputMode::VeryVerbose);
        assert_eq!(OutputMode::from_flags(2, true), OutputMode::Quiet);
    }

    #[test]
    fn test_reporter_collects_in_json_mode() {
        let mut reporter = ConsoleReporter::new(OutputMode::Normal, true);
        let threat = ThreatEvent {
            file_path: PathBuf::from("/data/x.exe"),
            digest: Digest::of(b"x"),
        };
        reporter.handle(&StatusEvent::Threat(threat.clone()));
        reporter.handle(&StatusEvent::Analysis(AnalysisResult {
            file_path: threat.file_path.clone(),
            outcome: Ok("text".to_string()),
        }));
        reporter.handle(&StatusEvent::Info("ignored".to_string()));

        let (threats, analyses) = reporter.finish();
        assert_eq!(threats, vec![threat]);
        assert_eq!(analyses.len(), 1);
    }

    /// Cloneable in-memory writer
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    #[test]
    fn test_quiet_mode_still_prints_failures() {
        let buf = SharedBuf::default();
        let mut reporter =
            ConsoleReporter::new(OutputMode::Quiet, false).with_error_output(Box::new(buf.clone()));

        reporter.handle(&StatusEvent::Info("Starting scan of /nope...".to_string()));
        reporter.handle(&StatusEvent::Error("Invalid path: /nope does not exist".to_string()));
        reporter.handle(&StatusEvent::Warning(FileReadError {
            path: PathBuf::from("/data/locked.bin"),
            message: "permission denied".to_string(),
        }));
        reporter.handle(&StatusEvent::Analysis(AnalysisResult {
            file_path: PathBuf::from("/data/x.exe"),
            outcome: Ok("fine".to_string()),
        }));
        reporter.handle(&StatusEvent::Analysis(AnalysisResult {
            file_path: PathBuf::from("/data/y.exe"),
            outcome: Err(AnalysisError::ModelUnavailable {
                model: "org/fallback".to_string(),
            }),
        }));

        assert_eq!(
            buf.lines(),
            vec![
                "Error: Invalid path: /nope does not exist".to_string(),
                "Could not scan /data/locked.bin: permission denied".to_string(),
                "AI analysis error for y.exe: org/fallback is still loading (HTTP 503)".to_string(),
            ]
        );
    }

    #[test]
    fn test_json_mode_sends_failures_to_error_output() {
        let buf = SharedBuf::default();
        let mut reporter =
            ConsoleReporter::new(OutputMode::Normal, true).with_error_output(Box::new(buf.clone()));
        reporter.handle(&StatusEvent::Error("Invalid path: /nope does not exist".to_string()));
        reporter.handle(&StatusEvent::Info("ignored".to_string()));
        assert_eq!(buf.lines(), vec!["Error: Invalid path: /nope does not exist".to_string()]);
    }

    #[test]
    fn test_progress_note_without_visible_bar() {
        let checkpoint = StatusEvent::Progress(ScanProgress { files_scanned: 10, files_total: 30 });
        let between = StatusEvent::Progress(ScanProgress { files_scanned: 11, files_total: 30 });

        let mut reporter = ConsoleReporter::new(OutputMode::Normal, false);
        assert!(reporter.wants_progress_note(&checkpoint));
        assert!(!reporter.wants_progress_note(&between));

        reporter.bar = Some(ProgressBar::hidden());
        assert!(reporter.wants_progress_note(&checkpoint));

        let verbose = ConsoleReporter::new(OutputMode::Verbose, false);
        assert!(verbose.wants_progress_note(&checkpoint));
    }

    #[test]
    fn test_render_json_report() {
        let history = ScanHistory::new();
        let mut summary = ScanSummary::new(Path::new("/data"));
        summary.files_scanned = 4;
        summary.threats_found = 1;
        history.record(summary);

        let threats = vec![ThreatEvent {
            file_path: PathBuf::from("/data/x.exe"),
            digest: Digest::of(b"x"),
        }];
        let analyses = vec![AnalysisResult {
            file_path: PathBuf::from("/data/x.exe"),
            outcome: Err(AnalysisError::ModelUnavailable {
                model: "org/fallback".to_string(),
            }),
        }];

        let json = render_json(&history, &threats, &analyses).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["totals"]["total_scans"], 1);
        assert_eq!(value["totals"]["threats_found"], 1);
        assert_eq!(value["scans"][0]["files_scanned"], 4);
        assert_eq!(value["threats"][0]["digest"], Digest::of(b"x").as_str());
        assert_eq!(value["analyses"][0]["ok"], false);
        assert!(value["analyses"][0]["error"].as_str().unwrap().contains("503"));
    }
}
