//! Configuration file support
//!
//! Settings live in `config.toml` under the platform config directory
//! (`%APPDATA%\secscan\config\` on Windows, `~/.config/secscan/` on Linux).
//! A missing or unreadable file is never fatal: defaults are used instead.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable holding the inference API token
pub const API_KEY_ENV: &str = "HF_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API key is required. Set the HF_API_KEY environment variable or `analysis.api_key` in the config file")]
    MissingCredential,

    #[error("could not determine the configuration directory")]
    NoConfigDir,

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid exclusion pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanSettings,
    pub analysis: AnalysisSettings,
    pub performance: PerformanceSettings,
}

/// Declared detection sensitivity.
///
/// Not wired to the detection rule; carried so config files from the
/// desktop tool keep parsing and `config --show` reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Sensitivity::Low => "low",
            Sensitivity::Medium => "medium",
            Sensitivity::High => "high",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Extension allow-list (with leading dot), only applied when
    /// `restrict_to_extensions` is set
    pub extensions: Vec<String>,
    pub restrict_to_extensions: bool,
    /// Glob patterns for paths to leave out of the walk entirely
    pub exclude: Vec<String>,
    /// Files at or above this size are never opened
    pub max_file_size: u64,
    /// Number of leading bytes that feed the fingerprint
    pub prefix_bytes: usize,
    pub sensitivity: Sensitivity,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            extensions: [
                ".exe", ".dll", ".sys", ".ocx", ".com", ".bat", ".cmd", ".ps1", ".vbs", ".js",
                ".zip", ".rar", ".7z", ".tar", ".gz", ".pdf", ".doc", ".docx", ".xls", ".xlsx",
                ".html", ".htm", ".php", ".asp", ".aspx",
            ]
            .iter()
            .map(|ext| ext.to_string())
            .collect(),
            restrict_to_extensions: false,
            exclude: Vec::new(),
            max_file_size: 10_000_000,
            prefix_bytes: 1024,
            sensitivity: Sensitivity::Medium,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub fallback_model: String,
    /// Prefer the `HF_API_KEY` environment variable over storing this on disk
    pub api_key: Option<String>,
    pub max_length: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub repetition_penalty: f64,
    /// Deadline for a single outbound inference call
    pub request_timeout_secs: u64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api-inference.huggingface.co/models".to_string(),
            model: "shahrukh95/falcon-7b-Set-3-cybersecurity-layered-config".to_string(),
            fallback_model: "TinyLlama/TinyLlama-1.1B-Chat-v1.0".to_string(),
            api_key: None,
            max_length: 256,
            temperature: 0.7,
            top_p: 0.9,
            repetition_penalty: 1.2,
            request_timeout_secs: 30,
        }
    }
}

impl AnalysisSettings {
    /// Resolve the API token: environment first, then the config file.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        let from_env = std::env::var(API_KEY_ENV).ok();
        pick_credential(from_env, self.api_key.clone())
    }
}

fn pick_credential(from_env: Option<String>, from_file: Option<String>) -> Result<String, ConfigError> {
    from_env
        .into_iter()
        .chain(from_file)
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
        .ok_or(ConfigError::MissingCredential)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceSettings {
    /// Worker threads for concurrent analysis requests (0 = rayon default)
    pub thread_pool_size: usize,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self { thread_pool_size: 4 }
    }
}

impl Config {
    /// Load configuration from disk, falling back to defaults on any error
    pub fn load() -> Self {
        match Self::config_path().and_then(|path| Self::load_from(&path)) {
            Ok(config) => config,
            Err(ConfigError::Read { ref source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                Self::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "using default configuration");
                Self::default()
            }
        }
    }

    /// Load configuration, writing the defaults to disk if no file exists yet
    pub fn load_or_create() -> Self {
        if let Ok(path) = Self::config_path() {
            if !path.exists() {
                let config = Self::default();
                if let Err(e) = config.save() {
                    tracing::warn!(error = %e, "could not write default configuration");
                }
                return config;
            }
        }
        Self::load()
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        directories::ProjectDirs::from("", "", "secscan")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Apply command-line overrides on top of the loaded file
    pub fn apply_cli_overrides(
        &mut self,
        max_file_size: Option<u64>,
        prefix_bytes: Option<usize>,
        exclude: &[String],
        no_ai: bool,
    ) {
        if let Some(size) = max_file_size {
            self.scan.max_file_size = size;
        }
        if let Some(bytes) = prefix_bytes {
            self.scan.prefix_bytes = bytes;
        }
        self.scan.exclude.extend(exclude.iter().cloned());
        if no_ai {
            self.analysis.enabled = false;
        }
    }

    /// Compile `scan.exclude` into a matcher
    pub fn exclusion_set(&self) -> Result<GlobSet, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.scan.exclude {
            let glob = Glob::new(pattern).map_err(|source| ConfigError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|source| ConfigError::Pattern {
            pattern: self.scan.exclude.join(", "),
            source,
        })
    }
}
