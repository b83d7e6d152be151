//! Scan orchestration
//!
//! [`Engine`] owns the long-lived pieces (scanner, optional analysis
//! dispatcher, status sink, history). Each call to [`Engine::run`] produces a
//! [`ScanSession`] with the counters and event log of that one scan.

use crate::analysis::{AnalysisRequest, Dispatcher, InferenceClient};
use crate::config::{Config, ConfigError};
use crate::history::{ScanHistory, ScanSummary};
use crate::scan_events::{FileReadError, ScanEvent, ScanProgress, ThreatEvent};
use crate::scanner::{CancelToken, ScanError, ScanOptions, ScanRequest, Scanner};
use crate::sink::{StatusEvent, StatusSink};
use crate::utils;
use std::sync::Arc;

/// Entry in a session's append-only event log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEntry {
    Threat(ThreatEvent),
    Warning(FileReadError),
}

/// State of one scan run
#[derive(Debug, Clone)]
pub struct ScanSession {
    pub request: ScanRequest,
    pub progress: ScanProgress,
    /// Analyses handed to the dispatcher; never more than the threat count
    pub analyses_requested: u64,
    log: Vec<SessionEntry>,
    summary: Option<ScanSummary>,
}

impl ScanSession {
    fn new(request: ScanRequest) -> Self {
        Self {
            request,
            progress: ScanProgress::default(),
            analyses_requested: 0,
            log: Vec::new(),
            summary: None,
        }
    }

    pub fn log(&self) -> &[SessionEntry] {
        &self.log
    }

    pub fn threats(&self) -> impl Iterator<Item = &ThreatEvent> {
        self.log.iter().filter_map(|entry| match entry {
            SessionEntry::Threat(threat) => Some(threat),
            _ => None,
        })
    }

    pub fn warnings(&self) -> impl Iterator<Item = &FileReadError> {
        self.log.iter().filter_map(|entry| match entry {
            SessionEntry::Warning(warning) => Some(warning),
            _ => None,
        })
    }

    /// Set once the scan has finished
    pub fn summary(&self) -> Option<&ScanSummary> {
        self.summary.as_ref()
    }
}

pub struct Engine {
    scanner: Scanner,
    dispatcher: Option<Dispatcher>,
    sink: StatusSink,
    history: ScanHistory,
}

impl Engine {
    /// An engine without AI enrichment
    pub fn new(scanner: Scanner, sink: StatusSink, history: ScanHistory) -> Self {
        Self {
            scanner,
            dispatcher: None,
            sink,
            history,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Build the scanner and, when possible, the analysis subsystem.
    ///
    /// A missing API key only disables analysis; it is reported to the sink
    /// and never re-checked for the life of the engine.
    pub fn from_config(config: &Config, sink: StatusSink, history: ScanHistory) -> Result<Self, ConfigError> {
        let scanner = Scanner::new(ScanOptions::from_config(config)?);
        let engine = Self::new(scanner, sink.clone(), history);

        if !config.analysis.enabled {
            tracing::info!("AI analysis disabled by configuration");
            return Ok(engine);
        }

        let client = match InferenceClient::from_settings(&config.analysis) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(error = %e, "AI analysis unavailable");
                sink.info(format!("AI Assistant is not available: {}", e));
                return Ok(engine);
            }
        };

        match Dispatcher::new(Arc::new(client), sink.clone(), config.performance.thread_pool_size) {
            Ok(dispatcher) => Ok(engine.with_dispatcher(dispatcher)),
            Err(e) => {
                tracing::warn!(error = %e, "could not start analysis workers");
                sink.info(format!("AI Assistant is not available: {}", e));
                Ok(engine)
            }
        }
    }

    pub fn analysis_ready(&self) -> bool {
        self.dispatcher.is_some()
    }

    pub fn dispatcher(&self) -> Option<&Dispatcher> {
        self.dispatcher.as_ref()
    }

    /// Outstanding analyses (0 when analysis is off)
    pub fn in_flight(&self) -> usize {
        self.dispatcher.as_ref().map_or(0, Dispatcher::in_flight)
    }

    pub fn history(&self) -> &ScanHistory {
        &self.history
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    /// Run one scan to completion.
    ///
    /// Threats are handed to the dispatcher as they are found; this never
    /// waits for their results.
    pub fn run(&self, request: ScanRequest, cancel: CancelToken) -> Result<ScanSession, ScanError> {
        self.sink.info(format!(
            "Starting scan of {}...",
            utils::display_path(&request.root)
        ));

        let events = match self.scanner.scan(&request, cancel) {
            Ok(events) => events,
            Err(e) => {
                tracing::debug!(error = %e, "scan rejected");
                self.sink.append(StatusEvent::Error(e.to_string()));
                return Err(e);
            }
        };

        let mut session = ScanSession::new(request.clone());
        for event in events {
            match event {
                ScanEvent::Started { root, files_total } => {
                    session.progress.files_total = files_total;
                    self.sink.append(StatusEvent::ScanStarted { root, files_total });
                }
                ScanEvent::Threat(threat) => {
                    self.sink.append(StatusEvent::Threat(threat.clone()));
                    if let Some(dispatcher) = &self.dispatcher {
                        dispatcher.submit(AnalysisRequest::for_threat(&threat));
                        session.analyses_requested += 1;
                    }
                    session.log.push(SessionEntry::Threat(threat));
                }
                ScanEvent::Skipped { path, size_bytes } => {
                    tracing::trace!(path = %path.display(), size_bytes, "over size ceiling");
                }
                ScanEvent::Warning(warning) => {
                    self.sink.append(StatusEvent::Warning(warning.clone()));
                    session.log.push(SessionEntry::Warning(warning));
                }
                ScanEvent::Progress(progress) => {
                    session.progress = progress;
                    self.sink.append(StatusEvent::Progress(progress));
                }
                ScanEvent::Finished(summary) => {
                    self.history.record(summary.clone());
                    self.sink.append(StatusEvent::Completed(summary.clone()));
                    session.summary = Some(summary);
                }
            }
        }

        Ok(session)
    }
}
