//! End-to-end checks through the public API: scanner, engine, dispatcher
//! and status feed wired together the way the binary wires them.

use secscan::analysis::{
    AnalysisError, Dispatcher, InferenceClient, InferenceTransport, TextGenerator, TransportResponse,
};
use secscan::config::AnalysisSettings;
use secscan::detection::Digest;
use secscan::history::ScanHistory;
use secscan::scanner::{CancelToken, ScanOptions, ScanRequest, Scanner};
use secscan::session::Engine;
use secscan::sink::{StatusEvent, StatusSink};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn contents_with_digest_prefix(flagged: bool) -> Vec<u8> {
    (0u32..)
        .map(|i| format!("sample-{}", i).into_bytes())
        .find(|bytes| Digest::of(bytes).as_str().starts_with('a') == flagged)
        .unwrap()
}

fn write(dir: &Path, name: &str, contents: &[u8]) {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[derive(Default)]
struct Recorder {
    prompts: Mutex<Vec<String>>,
}

impl TextGenerator for Recorder {
    fn generate(&self, prompt: &str) -> Result<String, AnalysisError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("Possibly a packed executable.".to_string())
    }
}

/// 503 for the primary model, a normal answer for everything else
#[derive(Clone, Default)]
struct LoadingPrimary {
    urls: Arc<Mutex<Vec<String>>>,
}

impl InferenceTransport for LoadingPrimary {
    fn post_json(&self, url: &str, _token: &str, _body: &serde_json::Value) -> Result<TransportResponse, String> {
        self.urls.lock().unwrap().push(url.to_string());
        if url.ends_with("/primary") {
            return Ok(TransportResponse {
                status: 503,
                body: r#"{"error":"Model is currently loading"}"#.to_string(),
            });
        }
        Ok(TransportResponse {
            status: 200,
            body: r#"[{"generated_text":"Assistant: nothing alarming"}]"#.to_string(),
        })
    }
}

#[test]
fn empty_directory_completes_with_zero_counts() {
    let temp_dir = TempDir::new().unwrap();
    let (sink, feed) = StatusSink::channel();
    let engine = Engine::new(Scanner::new(ScanOptions::default()), sink, ScanHistory::new());

    let session = engine
        .run(ScanRequest::new(temp_dir.path()), CancelToken::new())
        .unwrap();

    let summary = session.summary().unwrap();
    assert_eq!((summary.files_scanned, summary.threats_found), (0, 0));

    let lines: Vec<String> = feed.drain().iter().map(|e| e.to_string()).collect();
    assert_eq!(
        lines.last().map(String::as_str),
        Some("Scan completed. Scanned 0 files. Found 0 potential threats.")
    );
}

#[test]
fn one_flagged_file_yields_one_analysis_about_its_digest() {
    let temp_dir = TempDir::new().unwrap();
    let flagged = contents_with_digest_prefix(true);
    write(temp_dir.path(), "drop/payload.dll", &flagged);
    for i in 0..3 {
        write(temp_dir.path(), &format!("docs/note{}.txt", i), &contents_with_digest_prefix(false));
    }

    let (sink, feed) = StatusSink::channel();
    let recorder = Arc::new(Recorder::default());
    let dispatcher = Dispatcher::new(recorder.clone(), sink.clone(), 2).unwrap();
    let engine = Engine::new(Scanner::new(ScanOptions::default()), sink, ScanHistory::new())
        .with_dispatcher(dispatcher);

    let session = engine
        .run(ScanRequest::new(temp_dir.path()), CancelToken::new())
        .unwrap();
    assert!(engine.dispatcher().unwrap().wait_idle(Duration::from_secs(5)));

    assert_eq!(session.summary().unwrap().files_scanned, 4);
    assert_eq!(session.summary().unwrap().threats_found, 1);

    let prompts = recorder.prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(Digest::of(&flagged).as_str()));

    let events = feed.drain();
    let alerts = events.iter().filter(|e| matches!(e, StatusEvent::Threat(_))).count();
    let analyses: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            StatusEvent::Analysis(result) => Some(result),
            _ => None,
        })
        .collect();
    assert_eq!(alerts, 1);
    assert_eq!(analyses.len(), 1);
    assert!(analyses[0].file_path.ends_with("drop/payload.dll"));
}

#[test]
fn model_loading_falls_back_through_the_dispatcher() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "a.bin", &contents_with_digest_prefix(true));

    let transport = LoadingPrimary::default();
    let settings = AnalysisSettings {
        base_url: "https://inference.test/models".to_string(),
        model: "primary".to_string(),
        fallback_model: "fallback".to_string(),
        ..AnalysisSettings::default()
    };
    let client = InferenceClient::with_transport(&settings, "key".to_string(), Box::new(transport.clone()));

    let (sink, feed) = StatusSink::channel();
    let dispatcher = Dispatcher::new(Arc::new(client), sink.clone(), 1).unwrap();
    let engine = Engine::new(Scanner::new(ScanOptions::default()), sink, ScanHistory::new())
        .with_dispatcher(dispatcher);

    engine
        .run(ScanRequest::new(temp_dir.path()), CancelToken::new())
        .unwrap();
    assert!(engine.dispatcher().unwrap().wait_idle(Duration::from_secs(5)));

    let urls = transport.urls.lock().unwrap().clone();
    assert_eq!(
        urls,
        vec![
            "https://inference.test/models/primary".to_string(),
            "https://inference.test/models/fallback".to_string(),
        ]
    );

    let analysis = feed
        .drain()
        .into_iter()
        .find_map(|e| match e {
            StatusEvent::Analysis(result) => Some(result),
            _ => None,
        })
        .unwrap();
    assert_eq!(analysis.outcome.as_deref(), Ok("nothing alarming"));
}

#[test]
fn cancelled_scan_is_recorded_as_cancelled() {
    let temp_dir = TempDir::new().unwrap();
    for i in 0..5 {
        write(temp_dir.path(), &format!("f{}.txt", i), b"data");
    }

    let (sink, _feed) = StatusSink::channel();
    let history = ScanHistory::new();
    let engine = Engine::new(Scanner::new(ScanOptions::default()), sink, history.clone());

    let cancel = CancelToken::new();
    cancel.cancel();
    let session = engine.run(ScanRequest::new(temp_dir.path()), cancel).unwrap();

    let summary = session.summary().unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.files_scanned, 0);
    assert_eq!(history.entries(), vec![summary.clone()]);
}
