//! Output capability handed to the app and to every command.
//!
//! `print` is informational and is dropped once the sink is quiet;
//! `error` always goes through.

use std::io::Write;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::format::StyleOptions;

pub trait OutputSink: Send + Sync {
    fn style(&self) -> &StyleOptions;
    fn print(&self, text: &str);
    fn error(&self, text: &str);
    fn set_quiet(&self, quiet: bool);
    fn is_quiet(&self) -> bool;

    fn print_lines(&self, lines: &[String]) {
        for line in lines {
            self.print(line);
        }
    }
}

/// stdout / stderr sink used by the binary.
#[derive(Debug)]
pub struct TerminalSink {
    style: StyleOptions,
    quiet: AtomicBool,
}

impl TerminalSink {
    pub fn new(style: StyleOptions) -> Self {
        Self {
            style,
            quiet: AtomicBool::new(false),
        }
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new(StyleOptions::detect())
    }
}

impl OutputSink for TerminalSink {
    fn style(&self) -> &StyleOptions {
        &self.style
    }

    fn print(&self, text: &str) {
        if self.is_quiet() {
            return;
        }
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{text}");
    }

    fn error(&self, text: &str) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{text}");
    }

    fn set_quiet(&self, quiet: bool) {
        self.quiet.store(quiet, Ordering::Relaxed);
    }

    fn is_quiet(&self) -> bool {
        self.quiet.load(Ordering::Relaxed)
    }
}

/// In-memory sink; captures plain (uncolored) lines.
#[derive(Debug)]
pub struct BufferSink {
    style: StyleOptions,
    quiet: AtomicBool,
    lines: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl Default for BufferSink {
    fn default() -> Self {
        Self {
            style: StyleOptions::plain(),
            quiet: AtomicBool::new(false),
            lines: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
        }
    }
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// All informational output joined by newlines.
    pub fn contents(&self) -> String {
        self.lines().join("\n")
    }
}

impl OutputSink for BufferSink {
    fn style(&self) -> &StyleOptions {
        &self.style
    }

    fn print(&self, text: &str) {
        if self.is_quiet() {
            return;
        }
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(text.to_string());
        }
    }

    fn error(&self, text: &str) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.push(text.to_string());
        }
    }

    fn set_quiet(&self, quiet: bool) {
        self.quiet.store(quiet, Ordering::Relaxed);
    }

    fn is_quiet(&self) -> bool {
        self.quiet.load(Ordering::Relaxed)
    }
}
