//! Status messages on stderr, keeping stdout clean for the JSON export.

use owo_colors::OwoColorize;

#[derive(Debug, Clone, Copy, Default)]
pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, msg: &str) {
        eprintln!("{} {}", "✓".green(), msg);
    }

    pub fn info(&self, label: &str, value: &str) {
        eprintln!("{} {}", label.bright_black(), value);
    }

    pub fn warning(&self, msg: &str) {
        eprintln!("{} {}", "!".yellow(), msg);
    }

    pub fn error(&self, msg: &str) {
        eprintln!("{} {}", "✗".red(), msg);
    }
}
