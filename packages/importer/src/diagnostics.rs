//! Diagnostics collected during an import pass.
//!
//! A diagnostic records where something went wrong, how bad it was, and a
//! human-readable message. Diagnostics never interrupt the pass; the sink is
//! inspected after the document has been fully consumed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Source position of a diagnostic: resource name plus line and column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    /// Name of the document being imported (file name, URL, ...).
    pub resource: String,
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
}

impl Location {
    /// Create a new location.
    #[must_use]
    pub fn new(resource: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            resource: resource.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.resource, self.line, self.column)
    }
}

/// One recorded problem or notice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub location: Location,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.location, self.severity, self.message)
    }
}

/// Ordered collector of diagnostics for one import pass.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    entries: Vec<Diagnostic>,
}

impl DiagnosticSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic.
    pub fn report(&mut self, severity: Severity, location: Location, message: impl Into<String>) {
        self.entries.push(Diagnostic {
            location,
            severity,
            message: message.into(),
        });
    }

    /// All entries, in the order they were recorded.
    #[must_use]
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Number of entries with the given severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|d| d.severity == severity).count()
    }

    /// Whether any error-level diagnostics were recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    /// Total number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the sink is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take ownership of the entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }
}
