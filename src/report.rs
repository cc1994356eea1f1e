//! # Conversion Report
//!
//! Aggregates per-file outcomes of a run. Everything here is pure: the service
//! records results as it goes and the binary renders the finished report as
//! text or JSON.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::bindings::ShadowBinding;
use crate::errors::ServiceError;
use crate::patch::DroppedReplacement;
use crate::types::CandidateKind;

/// Hex SHA-256 of a buffer.
pub fn file_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionReport {
    pub dry_run: bool,
    pub files_scanned: usize,
    pub files_with_candidates: usize,
    pub files_modified: usize,
    pub candidates_found: usize,
    pub candidates_converted: usize,
    pub backups_created: usize,
    pub files: Vec<FileReport>,
    pub failures: Vec<FileFailure>,
    pub conflicts: Vec<SpanConflictRecord>,
    pub details: Vec<ConversionDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub candidates: usize,
    pub converted: usize,
    pub existing_calls: usize,
    pub skipped_undecodable: usize,
    /// Concatenations left alone because they contain comments
    pub skipped_commented: usize,
    pub hash_before: String,
    pub hash_after: String,
    pub modified: bool,
    pub backup: Option<PathBuf>,
    /// The file calls the externalization function but never binds it
    pub missing_import: bool,
    pub shadows: Vec<ShadowBinding>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub category: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpanConflictRecord {
    pub path: PathBuf,
    #[serde(flatten)]
    pub dropped: DroppedReplacement,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionDetail {
    pub file: PathBuf,
    pub line: usize,
    pub kind: CandidateKind,
    pub template: String,
    pub variables: Vec<String>,
    pub original_line: String,
    pub replacement_line: String,
    pub replacement: String,
}

impl ConversionReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    pub fn record_scanned(&mut self) {
        self.files_scanned += 1;
    }

    pub fn record_file(&mut self, file: FileReport) {
        if file.candidates > 0 {
            self.files_with_candidates += 1;
        }
        if file.modified {
            self.files_modified += 1;
        }
        if file.backup.is_some() {
            self.backups_created += 1;
        }
        self.candidates_found += file.candidates;
        self.candidates_converted += file.converted;
        self.files.push(file);
    }

    pub fn record_failure(&mut self, path: &Path, error: &ServiceError) {
        self.failures.push(FileFailure {
            path: path.to_path_buf(),
            category: error.category().to_string(),
            message: error.to_string(),
        });
    }

    pub fn record_conflicts(&mut self, path: &Path, dropped: Vec<DroppedReplacement>) {
        self.conflicts
            .extend(dropped.into_iter().map(|dropped| SpanConflictRecord {
                path: path.to_path_buf(),
                dropped,
            }));
    }

    pub fn record_details(&mut self, details: Vec<ConversionDetail>) {
        self.details.extend(details);
    }

    pub fn to_json(&self) -> Result<String, ServiceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Human-readable summary grouped by file.
    pub fn render_text(&self) -> String {
        let title = if self.dry_run {
            "🔎 **Conversion Preview**"
        } else {
            "🌐 **Conversion Results**"
        };
        let mut out = format!(
            "{title}\n\n📁 **Files**: {} scanned, {} with candidates, {} {}\n🎯 **Strings**: {} found, {} converted\n",
            self.files_scanned,
            self.files_with_candidates,
            self.files_modified,
            if self.dry_run { "would change" } else { "modified" },
            self.candidates_found,
            self.candidates_converted,
        );
        if self.backups_created > 0 {
            out.push_str(&format!("💾 **Backups**: {}\n", self.backups_created));
        }

        for file in self.files.iter().filter(|f| f.candidates > 0 || !f.shadows.is_empty()) {
            out.push_str(&format!(
                "\n📄 `{}`: {} of {} converted\n",
                file.path.display(),
                file.converted,
                file.candidates
            ));
            for detail in self.details.iter().filter(|d| d.file == file.path) {
                out.push_str(&format!(
                    "   {}. - {}\n      + {}\n",
                    detail.line, detail.original_line, detail.replacement_line
                ));
            }
            if file.missing_import {
                out.push_str("   ⚠️ externalization function is called but never imported\n");
            }
            for shadow in &file.shadows {
                out.push_str(&format!(
                    "   ⚠️ line {} rebinds the externalization function: {}\n",
                    shadow.line, shadow.line_text
                ));
            }
        }

        if !self.conflicts.is_empty() {
            out.push_str(&format!("\n⚠️ **Conflicts**: {}\n", self.conflicts.len()));
            for conflict in &self.conflicts {
                out.push_str(&format!(
                    "   `{}` {}: {}\n",
                    conflict.path.display(),
                    conflict.dropped.span,
                    conflict.dropped.reason
                ));
            }
        }

        if !self.failures.is_empty() {
            out.push_str(&format!("\n❌ **Skipped**: {}\n", self.failures.len()));
            for failure in &self.failures {
                out.push_str(&format!("   [{}] {}\n", failure.category, failure.message));
            }
        }

        out
    }
}
