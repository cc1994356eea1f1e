//! # Conversion Service
//!
//! Drives one run over caller-supplied files: read, parse, analyze, build
//! replacements, patch, back up and write. Files are handled one at a time and
//! a failure in one file never stops the others. Preview mode runs the same
//! pipeline and only skips the backup and the write.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs;
use tracing::{debug, info, warn};

use crate::analyzer::SourceAnalyzer;
use crate::ast_utils::ParsedSource;
use crate::backup::{BackupManager, BackupStore};
use crate::bindings::{ExternUsage, extern_usage};
use crate::builder::ExpressionBuilder;
use crate::classifier::{HeuristicClassifier, StringClassifier};
use crate::config::ConverterConfig;
use crate::errors::ServiceError;
use crate::patch::{DroppedReplacement, LineIndex, PatchEngine};
use crate::report::{ConversionDetail, ConversionReport, FileReport, file_hash};
use crate::types::{Candidate, Span};

/// Result of running the pipeline over one buffer.
#[derive(Debug, Clone)]
pub struct FileConversion {
    pub bytes: Vec<u8>,
    pub changed: bool,
    pub candidates: Vec<Candidate>,
    /// Spans that were rewritten, in ascending order
    pub applied: Vec<Span>,
    pub dropped: Vec<DroppedReplacement>,
    pub existing_calls: usize,
    pub undecodable: usize,
    pub commented: usize,
    pub usage: ExternUsage,
    pub details: Vec<LineChange>,
}

impl FileConversion {
    /// The file calls the externalization function without binding it.
    pub fn missing_import(&self) -> bool {
        (self.existing_calls + self.applied.len()) > 0 && !self.usage.has_binding
    }
}

/// Before/after view of one converted candidate.
#[derive(Debug, Clone)]
pub struct LineChange {
    pub candidate: Candidate,
    pub replacement: String,
    pub original_line: String,
    pub replacement_line: String,
}

#[derive(Clone)]
pub struct ConversionService {
    config: ConverterConfig,
    classifier: Arc<dyn StringClassifier>,
    backup: Option<Arc<dyn BackupStore>>,
}

impl Default for ConversionService {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionService {
    pub fn new() -> Self {
        Self::with_config(ConverterConfig::default())
    }

    pub fn with_config(config: ConverterConfig) -> Self {
        let classifier: Arc<dyn StringClassifier> =
            Arc::new(HeuristicClassifier::new(config.classifier.clone()));
        let backup: Option<Arc<dyn BackupStore>> = if config.backup.enabled {
            Some(Arc::new(BackupManager::new(&config.backup)))
        } else {
            None
        };
        Self {
            config,
            classifier,
            backup,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn StringClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_backup_store(mut self, backup: Option<Arc<dyn BackupStore>>) -> Self {
        self.backup = backup;
        self
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Run the full pipeline over a buffer without touching the filesystem.
    pub fn convert_source(&self, bytes: &[u8]) -> Result<FileConversion, ServiceError> {
        let parsed = ParsedSource::parse(bytes)?;
        let analysis = SourceAnalyzer::new(&self.config, self.classifier.as_ref()).analyze(&parsed);
        let usage = extern_usage(&parsed, &self.config.extern_function);

        let builder = ExpressionBuilder::new(
            self.config.extern_function.as_str(),
            self.config.format_method.as_str(),
        );
        let replacements: Vec<_> = analysis
            .candidates
            .iter()
            .map(|c| builder.replacement(c))
            .collect();
        let outcome = PatchEngine::apply(bytes, &replacements);

        let details = analysis
            .candidates
            .iter()
            .zip(&replacements)
            .filter(|(c, _)| outcome.applied.binary_search(&c.span).is_ok())
            .map(|(candidate, replacement)| {
                let replacement = String::from_utf8_lossy(&replacement.text).into_owned();
                LineChange {
                    original_line: candidate.line_text.clone(),
                    replacement_line: rewritten_line(
                        parsed.index(),
                        bytes,
                        candidate.span,
                        &replacement,
                    ),
                    replacement,
                    candidate: candidate.clone(),
                }
            })
            .collect();

        Ok(FileConversion {
            changed: outcome.changed(bytes),
            bytes: outcome.bytes,
            candidates: analysis.candidates,
            applied: outcome.applied,
            dropped: outcome.dropped,
            existing_calls: analysis.existing_calls,
            undecodable: analysis.undecodable,
            commented: analysis.commented,
            usage,
            details,
        })
    }

    /// Convert every file in `paths`, recording per-file outcomes.
    ///
    /// Only a backup destination that cannot be created fails the whole run.
    pub async fn convert_files(&self, paths: &[PathBuf]) -> Result<ConversionReport, ServiceError> {
        let dry_run = self.config.dry_run;
        let mut report = ConversionReport::new(dry_run);

        let backup = if dry_run { None } else { self.backup.as_deref() };
        if let Some(store) = backup {
            store.prepare().await?;
        }

        info!(
            "Converting {} files{}",
            paths.len(),
            if dry_run { " (preview)" } else { "" }
        );

        for path in paths {
            report.record_scanned();
            if let Err(e) = self.convert_file(path, backup, &mut report).await {
                warn!("Skipping {}: {}", path.display(), e);
                report.record_failure(path, &e);
            }
        }

        info!(
            "Converted {} of {} strings in {} files",
            report.candidates_converted, report.candidates_found, report.files_modified
        );
        Ok(report)
    }

    async fn convert_file(
        &self,
        path: &Path,
        backup: Option<&dyn BackupStore>,
        report: &mut ConversionReport,
    ) -> Result<(), ServiceError> {
        let original = self.read_file(path).await?;
        let conversion = self
            .convert_source(&original)
            .map_err(|e| e.with_path(path))?;

        let mut backup_path = None;
        if conversion.changed && !self.config.dry_run {
            if let Some(store) = backup {
                backup_path = Some(store.snapshot(path).await?);
            }
            self.write_file(path, &conversion.bytes).await?;
            debug!("Rewrote {}", path.display());
        }

        let missing_import = conversion.missing_import();
        if missing_import {
            warn!(
                "{} calls {} without importing it",
                path.display(),
                self.config.extern_function
            );
        }
        let has_extern_calls = conversion.existing_calls + conversion.applied.len() > 0;

        report.record_conflicts(path, conversion.dropped);
        report.record_details(
            conversion
                .details
                .into_iter()
                .map(|change| ConversionDetail {
                    file: path.to_path_buf(),
                    line: change.candidate.span.start_line,
                    kind: change.candidate.kind,
                    template: change.candidate.text,
                    variables: change.candidate.variables,
                    original_line: change.original_line,
                    replacement_line: change.replacement_line,
                    replacement: change.replacement,
                })
                .collect(),
        );
        report.record_file(FileReport {
            path: path.to_path_buf(),
            candidates: conversion.candidates.len(),
            converted: conversion.applied.len(),
            existing_calls: conversion.existing_calls,
            skipped_undecodable: conversion.undecodable,
            skipped_commented: conversion.commented,
            hash_before: file_hash(&original),
            hash_after: file_hash(&conversion.bytes),
            modified: conversion.changed,
            backup: backup_path,
            missing_import,
            shadows: if has_extern_calls {
                conversion.usage.shadows
            } else {
                Vec::new()
            },
        });
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, ServiceError> {
        let unreadable = |reason: String| ServiceError::UnreadableFile {
            path: path.to_path_buf(),
            reason,
        };

        let metadata = self
            .with_io_retry(|| fs::metadata(path))
            .await
            .map_err(|e| unreadable(e.to_string()))?;
        if !metadata.is_file() {
            return Err(unreadable("not a regular file".to_string()));
        }
        if metadata.len() > self.config.max_file_size {
            return Err(unreadable(format!(
                "file is {} bytes, limit is {}",
                metadata.len(),
                self.config.max_file_size
            )));
        }

        self.with_io_retry(|| fs::read(path))
            .await
            .map_err(|e| unreadable(e.to_string()))
    }

    async fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), ServiceError> {
        let temp = temp_path(path)?;
        let result = self.with_io_retry(|| write_atomic(path, &temp, bytes)).await;
        // a timed out attempt is dropped mid-write and cannot clean up itself
        if result.is_err() && fs::try_exists(&temp).await.unwrap_or(false) {
            if let Err(e) = fs::remove_file(&temp).await {
                warn!("Could not remove {}: {}", temp.display(), e);
            }
        }
        Ok(result?)
    }

    /// Run an I/O operation under the configured timeout, retrying transient
    /// failures.
    async fn with_io_retry<T, F, Fut>(&self, mut op: F) -> io::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = io::Result<T>>,
    {
        let limit = Duration::from_millis(self.config.io_timeout_ms);
        let mut attempt = 0;
        loop {
            let error = match tokio::time::timeout(limit, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if !is_transient(&e) => return Err(e),
                Ok(Err(e)) => e,
                Err(_) => io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("timed out after {}ms", self.config.io_timeout_ms),
                ),
            };
            if attempt >= self.config.io_retries {
                return Err(error);
            }
            attempt += 1;
            warn!("I/O attempt {} failed: {}, retrying", attempt, error);
        }
    }
}

fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::ResourceBusy
    )
}

/// Sibling temp file used while rewriting `path`.
fn temp_path(path: &Path) -> io::Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let mut temp_name = std::ffi::OsString::from(".");
    temp_name.push(file_name);
    temp_name.push(".gettextify.tmp");
    Ok(path.with_file_name(temp_name))
}

/// Write through `temp` and rename it over the target, keeping the target's
/// permissions. The caller removes `temp` when this fails.
async fn write_atomic(path: &Path, temp: &Path, bytes: &[u8]) -> io::Result<()> {
    let permissions = fs::metadata(path).await?.permissions();
    fs::write(temp, bytes).await?;
    fs::set_permissions(temp, permissions).await?;
    fs::rename(temp, path).await
}

/// The candidate's line(s) with only its own span replaced, trimmed.
fn rewritten_line(index: &LineIndex, bytes: &[u8], span: Span, replacement: &str) -> String {
    let first = index.line(bytes, span.start_line);
    let last = index.line(bytes, span.end_line);
    let prefix = first.get(..span.start_col).unwrap_or(first);
    let suffix = last.get(span.end_col..).unwrap_or_default();
    format!(
        "{}{}{}",
        String::from_utf8_lossy(prefix),
        replacement,
        String::from_utf8_lossy(suffix)
    )
    .trim()
    .to_string()
}
