//! Terminal styling for console output

use colored::{ColoredString, Colorize};

pub struct Theme;

impl Theme {
    pub fn header(text: &str) -> ColoredString {
        text.bold()
    }

    pub fn primary(text: &str) -> ColoredString {
        text.normal()
    }

    pub fn muted(text: &str) -> ColoredString {
        text.dimmed()
    }

    pub fn value(text: &str) -> ColoredString {
        text.cyan().bold()
    }

    pub fn success(text: &str) -> ColoredString {
        text.green()
    }

    pub fn warning(text: &str) -> ColoredString {
        text.yellow()
    }

    /// Flagged files
    pub fn alert(text: &str) -> ColoredString {
        text.red().bold()
    }

    pub fn error(text: &str) -> ColoredString {
        text.red()
    }

    pub fn command(text: &str) -> ColoredString {
        text.cyan()
    }

    pub fn divider(width: usize) -> ColoredString {
        "-".repeat(width).dimmed()
    }

    pub fn divider_bold(width: usize) -> ColoredString {
        "=".repeat(width).bold()
    }
}
