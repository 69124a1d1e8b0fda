//==================================================
// File: diagnostics.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Structured warnings for resolution failures and cache problems
// Objective: Hand diagnostics to the host without deciding how they render
//==================================================

use std::fmt;
use std::path::PathBuf;

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A configured base path was skipped.
    Configuration,
    /// A persisted snapshot did not match the current configuration.
    CacheInvalidated,
    /// A cached binding no longer pointed at a file.
    StaleBinding,
    /// No resolver in the chain could locate the identifier.
    ResolutionFailure,
    /// The persistent store could not be read or written.
    StoreUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    pub attempted_paths: Vec<PathBuf>,
}

impl Diagnostic {
    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            message: message.into(),
            attempted_paths: Vec::new(),
        }
    }

    pub fn info(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            ..Self::warning(kind, message)
        }
    }

    pub fn with_attempted_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.attempted_paths = paths;
        self
    }
}

/// Receives diagnostics; formatting is left to the implementation.
pub trait DiagnosticsReporter: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl DiagnosticsReporter for TracingReporter {
    fn report(&self, diagnostic: Diagnostic) {
        let attempted: Vec<String> = diagnostic
            .attempted_paths
            .iter()
            .map(|path| path.display().to_string())
            .collect();
        match diagnostic.severity {
            Severity::Info => tracing::info!(kind = ?diagnostic.kind, "{}", diagnostic.message),
            Severity::Warning => tracing::warn!(
                kind = ?diagnostic.kind,
                attempted = ?attempted,
                "{}",
                diagnostic.message
            ),
            Severity::Error => tracing::error!(
                kind = ?diagnostic.kind,
                attempted = ?attempted,
                "{}",
                diagnostic.message
            ),
        }
    }
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    entries: Mutex<Vec<Diagnostic>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .iter()
            .filter(|diag| diag.kind == kind)
            .cloned()
            .collect()
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.entries.lock())
    }
}

impl DiagnosticsReporter for CollectingReporter {
    fn report(&self, diagnostic: Diagnostic) {
        self.entries.lock().push(diagnostic);
    }
}

impl<T: DiagnosticsReporter + ?Sized> DiagnosticsReporter for std::sync::Arc<T> {
    fn report(&self, diagnostic: Diagnostic) {
        (**self).report(diagnostic)
    }
}
