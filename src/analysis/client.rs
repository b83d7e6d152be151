//! Client for the hosted text-generation endpoint
//!
//! `POST <base_url>/<model>` with a bearer token and a JSON body. A 503 means
//! the model is still loading; the client then switches to the fallback model
//! for good and retries the same prompt once.

use super::response::{extract_text, frame_prompt};
use super::{AnalysisError, TextGenerator};
use crate::config::{AnalysisSettings, ConfigError};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const HTTP_SERVICE_UNAVAILABLE: u16 = 503;

/// Status and body of an HTTP exchange, whatever the status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// The HTTP seam. Non-2xx statuses are responses, not errors; `Err` is for
/// connection failures and timeouts.
pub trait InferenceTransport: Send + Sync {
    fn post_json(
        &self,
        url: &str,
        bearer_token: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, String>;
}

/// Blocking transport on a shared `ureq` agent
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("secscan/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

impl InferenceTransport for UreqTransport {
    fn post_json(
        &self,
        url: &str,
        bearer_token: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, String> {
        let result = self
            .agent
            .post(url)
            .set("Authorization", &format!("Bearer {}", bearer_token))
            .set("Content-Type", "application/json")
            .send_json(body);

        match result {
            Ok(response) => {
                let status = response.status();
                let body = response.into_string().map_err(|e| e.to_string())?;
                Ok(TransportResponse { status, body })
            }
            Err(ureq::Error::Status(status, response)) => Ok(TransportResponse {
                status,
                body: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(transport)) => Err(transport.to_string()),
        }
    }
}

/// Sampling parameters sent with every request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationParameters {
    pub max_length: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub repetition_penalty: f64,
    pub return_full_text: bool,
}

impl From<&AnalysisSettings> for GenerationParameters {
    fn from(settings: &AnalysisSettings) -> Self {
        Self {
            max_length: settings.max_length,
            temperature: settings.temperature,
            top_p: settings.top_p,
            repetition_penalty: settings.repetition_penalty,
            return_full_text: false,
        }
    }
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    inputs: &'a str,
    parameters: &'a GenerationParameters,
}

pub struct InferenceClient {
    transport: Box<dyn InferenceTransport>,
    base_url: String,
    api_key: String,
    primary_model: String,
    fallback_model: String,
    active_model: Mutex<String>,
    parameters: GenerationParameters,
}

impl InferenceClient {
    /// Build a client over HTTP.
    ///
    /// Fails with [`ConfigError::MissingCredential`] when no API key is
    /// configured.
    pub fn from_settings(settings: &AnalysisSettings) -> Result<Self, ConfigError> {
        let api_key = settings.resolve_api_key()?;
        let transport = UreqTransport::new(Duration::from_secs(settings.request_timeout_secs));
        Ok(Self::with_transport(settings, api_key, Box::new(transport)))
    }

    pub fn with_transport(
        settings: &AnalysisSettings,
        api_key: String,
        transport: Box<dyn InferenceTransport>,
    ) -> Self {
        Self {
            transport,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            primary_model: settings.model.clone(),
            fallback_model: settings.fallback_model.clone(),
            active_model: Mutex::new(settings.model.clone()),
            parameters: GenerationParameters::from(settings),
        }
    }

    pub fn active_model(&self) -> String {
        self.model_slot().clone()
    }

    pub fn set_model(&self, model: &str) {
        tracing::info!(model, "inference model changed");
        *self.model_slot() = model.to_string();
    }

    /// Models offered by `switch model`, primary first
    pub fn available_models(&self) -> Vec<String> {
        let mut models = vec![self.primary_model.clone()];
        if self.fallback_model != self.primary_model {
            models.push(self.fallback_model.clone());
        }
        models
    }

    pub fn endpoint_for(&self, model: &str) -> String {
        format!("{}/{}", self.base_url, model)
    }

    fn model_slot(&self) -> MutexGuard<'_, String> {
        self.active_model.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn request(&self, model: &str, body: &serde_json::Value) -> Result<String, AnalysisError> {
        let url = self.endpoint_for(model);
        tracing::debug!(%url, "sending inference request");

        let response = self
            .transport
            .post_json(&url, &self.api_key, body)
            .map_err(|message| AnalysisError::Transport {
                model: model.to_string(),
                message,
            })?;

        match response.status {
            200..=299 => Ok(extract_text(&response.body)),
            HTTP_SERVICE_UNAVAILABLE => Err(AnalysisError::ModelUnavailable {
                model: model.to_string(),
            }),
            status => Err(AnalysisError::Status {
                model: model.to_string(),
                status,
                body: response.body,
            }),
        }
    }
}

impl TextGenerator for InferenceClient {
    fn generate(&self, prompt: &str) -> Result<String, AnalysisError> {
        let inputs = frame_prompt(prompt);
        let body = serde_json::to_value(GenerationRequest {
            inputs: &inputs,
            parameters: &self.parameters,
        })
        .map_err(|e| AnalysisError::Transport {
            model: self.active_model(),
            message: e.to_string(),
        })?;

        let model = self.active_model();
        match self.request(&model, &body) {
            Err(AnalysisError::ModelUnavailable { .. }) if model != self.fallback_model => {
                tracing::warn!(%model, fallback = %self.fallback_model, "model is loading, switching to fallback");
                self.set_model(&self.fallback_model);
                self.request(&self.fallback_model, &body)
            }
            other => other,
        }
    }
}
