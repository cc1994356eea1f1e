use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::ServiceError;

const DEFAULT_SINKS: &[&str] = &["print", "input", "echo", "prompt"];

const DEFAULT_VOCABULARY: &[&str] = &[
    "error",
    "warning",
    "success",
    "failed",
    "complete",
    "install",
    "remove",
    "update",
    "found",
    "missing",
    "version",
    "package",
    "dependency",
    "conflict",
    "press enter",
    "are you sure",
    "continue",
    "cancel",
    "proceed",
    "select",
    "choice",
    "skipping",
    "restoring",
    "clearing",
    "verification",
    "cleanup",
    "switching",
    "confirm",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Name of the externalization function wrapped around strings
    pub extern_function: String,
    /// Method chained on the externalization call for interpolated strings
    pub format_method: String,
    /// Calls whose direct string arguments are considered user-facing
    pub sink_functions: Vec<String>,
    /// Classifier tuning
    pub classifier: ClassifierConfig,
    /// Maximum file size to process (in bytes)
    pub max_file_size: u64,
    /// Timeout for a single read or write attempt
    pub io_timeout_ms: u64,
    /// Additional attempts after a failed or timed-out read/write
    pub io_retries: u32,
    /// Compute everything but never write
    pub dry_run: bool,
    pub backup: BackupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Lowercase terms that mark a multi-word string as user-facing
    pub vocabulary: Vec<String>,
    /// Line prefixes that mark any surviving string as user-facing
    pub context_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub enabled: bool,
    /// Directory under which timestamped snapshot folders are created
    pub root: PathBuf,
    /// Root that backed-up paths are made relative to (defaults to the current directory)
    pub project_root: Option<PathBuf>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        let sink_functions: Vec<String> = DEFAULT_SINKS.iter().map(|s| s.to_string()).collect();
        let extern_function = "_".to_string();
        Self {
            classifier: ClassifierConfig::for_sinks(&sink_functions, &extern_function),
            extern_function,
            format_method: "format".to_string(),
            sink_functions,
            max_file_size: 10 * 1024 * 1024, // 10MB
            io_timeout_ms: 10_000,
            io_retries: 2,
            dry_run: false,
            backup: BackupConfig::default(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let sinks: Vec<String> = DEFAULT_SINKS.iter().map(|s| s.to_string()).collect();
        Self::for_sinks(&sinks, "_")
    }
}

impl ClassifierConfig {
    /// Build a classifier config whose context prefixes follow the given sinks
    /// and externalization function (only the plain `print`/`input` style
    /// sinks, since attribute sinks never start a line).
    pub fn for_sinks(sinks: &[String], extern_function: &str) -> Self {
        let mut context_prefixes: Vec<String> = sinks
            .iter()
            .filter(|s| *s == "print" || *s == "input")
            .map(|s| format!("{s}("))
            .collect();
        context_prefixes.push(format!("{extern_function}("));
        Self {
            vocabulary: DEFAULT_VOCABULARY.iter().map(|s| s.to_string()).collect(),
            context_prefixes,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".gettextify")
                .join("backups"),
            project_root: None,
        }
    }
}

impl ConverterConfig {
    /// Load a configuration from a YAML file; absent keys keep their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ServiceError> {
        let content = std::fs::read_to_string(path).map_err(|e| ServiceError::UnreadableFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ServiceError> {
        let mut config: ConverterConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        config.normalize();
        Ok(config)
    }

    /// Make sure lines starting with the configured externalization call count
    /// as user-facing context, whatever the classifier section says.
    pub fn normalize(&mut self) {
        let prefix = format!("{}(", self.extern_function);
        if !self.classifier.context_prefixes.contains(&prefix) {
            self.classifier.context_prefixes.push(prefix);
        }
    }

    /// Reject configurations that would generate invalid Python.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if !is_identifier(&self.extern_function) {
            return Err(ServiceError::InvalidConfig(format!(
                "extern_function '{}' is not a Python identifier",
                self.extern_function
            )));
        }
        if !is_identifier(&self.format_method) {
            return Err(ServiceError::InvalidConfig(format!(
                "format_method '{}' is not a Python identifier",
                self.format_method
            )));
        }
        if let Some(sink) = self.sink_functions.iter().find(|s| !is_identifier(s)) {
            return Err(ServiceError::InvalidConfig(format!(
                "sink function '{sink}' is not a Python identifier"
            )));
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}
