use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::analysis::{InferenceClient, TextGenerator};
use crate::assistant;
use crate::config::{Config, API_KEY_ENV};
use crate::history::ScanHistory;
use crate::logging;
use crate::output::{self, ConsoleReporter, OutputMode};
use crate::progress;
use crate::scanner::{CancelToken, ScanRequest};
use crate::session::Engine;
use crate::sink::{FeedPoll, StatusSink};
use crate::theme::Theme;
use crate::utils;

#[derive(Parser)]
#[command(name = "secscan")]
#[command(version)]
#[command(about = "Flag suspicious files by content digest and ask an AI model about them")]
#[command(long_about = "secscan walks a directory tree, fingerprints the start of every file \
    and flags the ones that match its detection rule. Flagged files are sent to a hosted \
    language model for a short risk assessment while the scan keeps going.\n\n\
    Examples:\n  \
    secscan scan ~/Downloads                # Scan one directory\n  \
    secscan scan /srv /opt --no-ai          # Scan two roots without AI analysis\n  \
    secscan scan . --exclude '**/target/**' # Skip build output\n  \
    secscan ask \"What is a dropper?\"        # One question to the assistant\n  \
    secscan ask                             # Interactive assistant")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase output verbosity (-v, -vv for more)
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan directories for suspicious files
    #[command(visible_alias = "s")]
    Scan {
        /// Roots to scan, one scan each (default: home directory)
        #[arg(value_name = "PATH")]
        paths: Vec<PathBuf>,

        /// Output the scan report as JSON for scripting
        #[arg(long)]
        json: bool,

        /// Skip AI analysis of flagged files
        #[arg(long)]
        no_ai: bool,

        /// Skip files at or above this size (e.g., 500KB, 10MB)
        #[arg(long, value_name = "SIZE")]
        max_size: Option<String>,

        /// Bytes read from the start of each file
        #[arg(long, value_name = "N")]
        prefix_bytes: Option<usize>,

        /// Exclude paths matching glob pattern (repeatable)
        #[arg(long, value_name = "PATTERN")]
        exclude: Vec<String>,
    },

    /// Ask the security assistant (interactive without a question)
    #[command(visible_alias = "a")]
    Ask {
        /// Question to ask once
        question: Option<String>,
    },

    /// View or reset configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Reset configuration to defaults
        #[arg(long)]
        reset: bool,

        /// Print the configuration file path
        #[arg(long)]
        path: bool,
    },
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        let output_mode = OutputMode::from_flags(self.verbose, self.quiet);
        logging::init(output_mode);

        match self.command {
            Commands::Scan {
                paths,
                json,
                no_ai,
                max_size,
                prefix_bytes,
                exclude,
            } => {
                let max_size = max_size
                    .map(|s| utils::parse_size(&s))
                    .transpose()
                    .map_err(anyhow::Error::msg)
                    .context("Invalid --max-size")?;

                let mut config = Config::load();
                config.apply_cli_overrides(max_size, prefix_bytes, &exclude, no_ai);

                let roots = if paths.is_empty() {
                    vec![default_scan_root()]
                } else {
                    paths
                };
                run_scan(&config, roots, json, output_mode)
            }
            Commands::Ask { question } => {
                let config = Config::load();
                let client = InferenceClient::from_settings(&config.analysis)
                    .context("AI Assistant is not available")?;

                match question {
                    Some(question) => {
                        let spinner = (output_mode != OutputMode::Quiet)
                            .then(|| progress::create_spinner("Generating response..."));
                        let answer = client.generate(&question);
                        if let Some(spinner) = &spinner {
                            progress::finish_and_clear(spinner);
                        }
                        println!("{}", answer.context("Assistant request failed")?);
                    }
                    None => {
                        assistant::run_chat(&client, io::stdin().lock(), io::stdout())
                            .context("Assistant session failed")?;
                    }
                }
                Ok(())
            }
            Commands::Config { show: _, reset, path } => {
                if path {
                    println!("{}", Config::config_path()?.display());
                } else if reset {
                    let saved = Config::default().save()?;
                    println!(
                        "{} Configuration reset to defaults ({}).",
                        Theme::success("OK"),
                        saved.display()
                    );
                } else {
                    show_config(&Config::load_or_create());
                }
                Ok(())
            }
        }
    }
}

fn default_scan_root() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Scan each root in turn on a worker thread while this thread renders the
/// status feed. Returns once every scan is done and every analysis reported.
fn run_scan(config: &Config, roots: Vec<PathBuf>, json: bool, mode: OutputMode) -> anyhow::Result<()> {
    let history = ScanHistory::new();
    let (sink, feed) = StatusSink::channel();
    let engine = Arc::new(
        Engine::from_config(config, sink, history.clone()).context("Invalid scan configuration")?,
    );

    if !json {
        output::print_settings(
            engine.scanner().options(),
            engine.scanner().rule_name(),
            engine.analysis_ready(),
            mode,
        );
    }

    let scans = roots.len();
    let cancel = CancelToken::new();
    let worker = {
        let engine = Arc::clone(&engine);
        thread::Builder::new()
            .name("scan".to_string())
            .spawn(move || {
                let mut failed = 0usize;
                for root in roots {
                    if let Err(e) = engine.run(ScanRequest::new(root), cancel.clone()) {
                        tracing::debug!(error = %e, "scan skipped");
                        failed += 1;
                    }
                }
                failed
            })
            .context("Failed to start scan thread")?
    };

    let mut reporter = ConsoleReporter::new(mode, json);
    loop {
        match feed.poll(Duration::from_millis(100)) {
            FeedPoll::Event(event) => reporter.handle(&event),
            FeedPoll::Idle => {
                if worker.is_finished() && engine.in_flight() == 0 {
                    for event in feed.drain() {
                        reporter.handle(&event);
                    }
                    break;
                }
            }
            FeedPoll::Closed => break,
        }
    }

    let failed = worker
        .join()
        .map_err(|_| anyhow::anyhow!("Scan thread panicked"))?;

    let (threats, analyses) = reporter.finish();
    if json {
        output::print_json(&history, &threats, &analyses)?;
    } else {
        output::print_report(&history, mode);
    }

    if failed > 0 {
        anyhow::bail!("{} of {} scans could not start", failed, scans);
    }
    Ok(())
}

fn show_config(config: &Config) {
    println!("{}", Theme::header("Current Configuration"));
    println!("{}", Theme::divider_bold(60));
    println!();
    println!("Scan:");
    println!("  Max file size: {}", bytesize::to_string(config.scan.max_file_size, true));
    println!("  Prefix bytes: {}", config.scan.prefix_bytes);
    println!("  Sensitivity: {}", config.scan.sensitivity);
    println!(
        "  Extensions: {} ({})",
        config.scan.extensions.join(", "),
        if config.scan.restrict_to_extensions { "enforced" } else { "not enforced" }
    );
    println!("  Exclusions:");
    if config.scan.exclude.is_empty() {
        println!("    (none)");
    } else {
        for pattern in &config.scan.exclude {
            println!("    {}", pattern);
        }
    }
    println!();
    println!("Analysis:");
    println!("  Enabled: {}", config.analysis.enabled);
    println!("  Endpoint: {}", config.analysis.base_url);
    println!("  Model: {}", config.analysis.model);
    println!("  Fallback model: {}", config.analysis.fallback_model);
    let key_source = if std::env::var(API_KEY_ENV).map_or(false, |v| !v.trim().is_empty()) {
        format!("from {}", API_KEY_ENV)
    } else if config.analysis.api_key.is_some() {
        "from config file".to_string()
    } else {
        "not set".to_string()
    };
    println!("  API key: {}", key_source);
    println!("  Max length: {}", config.analysis.max_length);
    println!("  Temperature: {}", config.analysis.temperature);
    println!("  Top p: {}", config.analysis.top_p);
    println!("  Repetition penalty: {}", config.analysis.repetition_penalty);
    println!("  Request timeout: {} s", config.analysis.request_timeout_secs);
    println!();
    println!("Performance:");
    println!("  Analysis threads: {} (0 = auto)", config.performance.thread_pool_size);
    println!();
    if let Ok(path) = Config::config_path() {
        println!("Config file: {}", path.display());
    }
}
