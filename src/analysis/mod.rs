//! AI enrichment for flagged files
//!
//! Each flagged file becomes one prompt for a hosted text-generation model.
//! Requests run on a worker pool and report back through the status sink, so
//! the scan never waits on the network.

pub mod client;
pub mod dispatcher;
pub mod response;

pub use client::{GenerationParameters, InferenceClient, InferenceTransport, TransportResponse, UreqTransport};
pub use dispatcher::Dispatcher;

use crate::detection::Digest;
use crate::scan_events::ThreatEvent;
use crate::utils;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("request to {model} failed: {message}")]
    Transport { model: String, message: String },

    #[error("{model} returned HTTP {status}: {body}")]
    Status { model: String, status: u16, body: String },

    #[error("{model} is still loading (HTTP 503)")]
    ModelUnavailable { model: String },
}

/// Anything that turns a prompt into text
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, AnalysisError>;
}

/// One prompt about one flagged file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub prompt: String,
    pub file_path: PathBuf,
}

impl AnalysisRequest {
    pub fn for_threat(threat: &ThreatEvent) -> Self {
        Self {
            prompt: threat_prompt(&threat.digest),
            file_path: threat.file_path.clone(),
        }
    }
}

/// Terminal outcome of an [`AnalysisRequest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub file_path: PathBuf,
    pub outcome: Result<String, AnalysisError>,
}

impl fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = utils::file_label(&self.file_path);
        match &self.outcome {
            Ok(text) => write!(f, "AI Analysis for {}:\n{}", label, text),
            Err(e) => write!(f, "AI analysis error for {}: {}", label, e),
        }
    }
}

/// Question asked about every flagged file
pub fn threat_prompt(digest: &Digest) -> String {
    format!(
        "What security risks might be associated with a file having the MD5 hash {}?",
        digest
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_for_threat_carries_digest() {
        let threat = ThreatEvent {
            file_path: PathBuf::from("/srv/upload/tool.exe"),
            digest: Digest::of(b"payload"),
        };
        let request = AnalysisRequest::for_threat(&threat);
        assert!(request.prompt.contains(threat.digest.as_str()));
        assert_eq!(request.file_path, threat.file_path);
    }

    #[test]
    fn test_result_display() {
        let ok = AnalysisResult {
            file_path: PathBuf::from("/srv/upload/tool.exe"),
            outcome: Ok("Looks like a packer stub.".to_string()),
        };
        assert_eq!(ok.to_string(), "AI Analysis for tool.exe:\nLooks like a packer stub.");

        let err = AnalysisResult {
            file_path: PathBuf::from("/srv/upload/tool.exe"),
            outcome: Err(AnalysisError::Status {
                model: "org/model".to_string(),
                status: 401,
                body: "unauthorized".to_string(),
            }),
        };
        assert_eq!(
            err.to_string(),
            "AI analysis error for tool.exe: org/model returned HTTP 401: unauthorized"
        );
    }
}
