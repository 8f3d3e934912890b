//! Validation issues and reports.

use std::fmt;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Issue categories.
pub mod category {
    /// Tech tree structure.
    pub const TECH_TREE: &str = "Tech Tree";
    /// Resource definitions.
    pub const RESOURCE: &str = "Resource";
    /// Faction definitions.
    pub const FACTION: &str = "Faction";
    /// Unit definitions.
    pub const UNIT: &str = "Unit";
    /// A name that does not resolve to a definition.
    pub const XML_REFERENCE: &str = "XML Reference";
    /// A definition file that failed to load.
    pub const XML_PARSE: &str = "XML Parse";
    /// A file or directory that should exist but does not.
    pub const ASSET_MISSING: &str = "Asset Missing";
    /// A file that exists but does not parse.
    pub const ASSET_CORRUPT: &str = "Asset Corrupt";
}

/// How bad an issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Informational.
    Info,
    /// Suspicious but playable.
    Warning,
    /// The pack cannot be played as written.
    Error,
}

impl Severity {
    /// Upper-case label used in text reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// One finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Severity.
    pub severity: Severity,
    /// Category (see [`category`]).
    pub category: String,
    /// Human-readable description.
    pub message: String,
    /// File the issue was found in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Line within the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Field of the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Offending value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Enclosing record, such as `faction magic`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Possible fix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Milliseconds since the Unix epoch when the issue was recorded.
    pub timestamp: u64,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

impl Issue {
    /// Create an issue with no location.
    #[must_use]
    pub fn new(severity: Severity, category: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            category: category.to_string(),
            message: message.into(),
            file: None,
            line: None,
            field: None,
            value: None,
            context: None,
            suggestion: None,
            timestamp: now_millis(),
        }
    }

    /// Create an error.
    #[must_use]
    pub fn error(category: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, category, message)
    }

    /// Create a warning.
    #[must_use]
    pub fn warning(category: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, category, message)
    }

    /// Create an informational issue.
    #[must_use]
    pub fn info(category: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, category, message)
    }

    /// Set the file.
    #[must_use]
    pub fn file(mut self, path: &Path) -> Self {
        self.file = Some(path.display().to_string());
        self
    }

    /// Set the line.
    #[must_use]
    pub fn line(mut self, line: Option<usize>) -> Self {
        self.line = line;
        self
    }

    /// Set the field.
    #[must_use]
    pub fn field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    /// Set the offending value.
    #[must_use]
    pub fn value(mut self, value: impl fmt::Display) -> Self {
        self.value = Some(value.to_string());
        self
    }

    /// Set the context.
    #[must_use]
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Set a suggestion, if any.
    #[must_use]
    pub fn suggestion(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion;
        self
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.severity.label(),
            self.category,
            self.message
        )?;
        if let Some(context) = &self.context {
            write!(f, " ({context})")?;
        }
        if let Some(file) = &self.file {
            match self.line {
                Some(line) => write!(f, "\n    at {file}:{line}")?,
                None => write!(f, "\n    at {file}")?,
            }
        }
        if let (Some(field), Some(value)) = (&self.field, &self.value) {
            write!(f, "\n    {field} = {value:?}")?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n    suggestion: {suggestion}")?;
        }
        Ok(())
    }
}

/// All issues found in one pack, in deterministic order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Pack name.
    pub pack: String,
    /// Issues: load failures first, then rules in registration order.
    pub issues: Vec<Issue>,
    /// Number of errors.
    pub errors: usize,
    /// Number of warnings.
    pub warnings: usize,
    /// Number of informational issues.
    pub infos: usize,
}

impl ValidationReport {
    /// Build a report and its counts.
    #[must_use]
    pub fn new(pack: impl Into<String>, issues: Vec<Issue>) -> Self {
        let count = |severity| issues.iter().filter(|i| i.severity == severity).count();
        Self {
            pack: pack.into(),
            errors: count(Severity::Error),
            warnings: count(Severity::Warning),
            infos: count(Severity::Info),
            issues,
        }
    }

    /// Check whether any error was found.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    /// Issues of one severity.
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }

    /// Issues of one category.
    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Issue> {
        self.issues.iter().filter(move |i| i.category == category)
    }

    /// A copy keeping only issues at or above `min`.
    #[must_use]
    pub fn filtered(&self, min: Severity) -> Self {
        Self::new(
            self.pack.clone(),
            self.issues
                .iter()
                .filter(|i| i.severity >= min)
                .cloned()
                .collect(),
        )
    }

    /// One-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: {} errors, {} warnings, {} info",
            self.pack, self.errors, self.warnings, self.infos
        )
    }

    /// Render as plain text.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut text = format!("Validation report for {}\n", self.summary());
        for issue in &self.issues {
            text.push_str(&issue.to_string());
            text.push('\n');
        }
        text
    }

    /// Render as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Serialization failure.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
