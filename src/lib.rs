//! secscan library crate
//!
//! This crate provides both a CLI binary and a library API for programmatic use

pub mod analysis;
pub mod assistant;
pub mod cli;
pub mod config;
pub mod detection;
pub mod history;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scan_events;
pub mod scanner;
pub mod session;
pub mod sink;
pub mod theme;
pub mod utils;

#[cfg(test)]
mod test_utils;
