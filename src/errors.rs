//! # Error Types
//!
//! Error handling for the conversion engine.
//! Per-file errors are isolated by the service and recorded in the report;
//! only a failed backup destination aborts a whole run.

use std::fmt;
use std::path::PathBuf;

/// Error types that can occur while converting source files.
#[derive(Debug)]
pub enum ServiceError {
    /// File could not be read, was not valid UTF-8, exceeded the size limit or timed out
    UnreadableFile { path: PathBuf, reason: String },
    /// File could not be parsed as Python
    UnparseableFile {
        path: PathBuf,
        line: usize,
        column: usize,
    },
    /// A replacement overlapped one that was already applied
    SpanConflict {
        start_line: usize,
        start_col: usize,
        end_line: usize,
        end_col: usize,
    },
    /// Snapshot of a file, or the backup destination itself, could not be created
    BackupFailure { path: PathBuf, source: std::io::Error },
    /// I/O error reading/writing files
    Io(std::io::Error),
    /// Error parsing YAML configuration
    Config(serde_yaml::Error),
    /// Error serializing the report as JSON
    SerdeJson(serde_json::Error),
    /// Configuration values that cannot produce valid Python
    InvalidConfig(String),
}

impl ServiceError {
    /// Short category name used in reports.
    pub fn category(&self) -> &'static str {
        match self {
            ServiceError::UnreadableFile { .. } => "unreadable",
            ServiceError::UnparseableFile { .. } => "unparseable",
            ServiceError::SpanConflict { .. } => "span-conflict",
            ServiceError::BackupFailure { .. } => "backup",
            ServiceError::Io(_) => "io",
            ServiceError::Config(_) => "config",
            ServiceError::SerdeJson(_) => "json",
            ServiceError::InvalidConfig(_) => "config",
        }
    }

    /// Attach a path to a parse error produced before the path was known.
    pub fn with_path(self, file: impl Into<PathBuf>) -> Self {
        match self {
            ServiceError::UnparseableFile { line, column, .. } => ServiceError::UnparseableFile {
                path: file.into(),
                line,
                column,
            },
            ServiceError::UnreadableFile { reason, .. } => ServiceError::UnreadableFile {
                path: file.into(),
                reason,
            },
            other => other,
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::UnreadableFile { path, reason } => {
                write!(f, "Cannot read {}: {reason}", path.display())
            }
            ServiceError::UnparseableFile { path, line, column } => {
                write!(f, "Syntax error in {} at {line}:{column}", path.display())
            }
            ServiceError::SpanConflict {
                start_line,
                start_col,
                end_line,
                end_col,
            } => write!(
                f,
                "Replacement {start_line}:{start_col}-{end_line}:{end_col} overlaps an applied replacement"
            ),
            ServiceError::BackupFailure { path, source } => {
                write!(f, "Backup of {} failed: {source}", path.display())
            }
            ServiceError::Io(err) => write!(f, "IO error: {err}"),
            ServiceError::Config(err) => write!(f, "Configuration error: {err}"),
            ServiceError::SerdeJson(err) => write!(f, "JSON error: {err}"),
            ServiceError::InvalidConfig(msg) => write!(f, "Invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::BackupFailure { source, .. } => Some(source),
            ServiceError::Io(err) => Some(err),
            ServiceError::Config(err) => Some(err),
            ServiceError::SerdeJson(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Io(err)
    }
}

impl From<serde_yaml::Error> for ServiceError {
    fn from(err: serde_yaml::Error) -> Self {
        ServiceError::Config(err)
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerdeJson(err)
    }
}
