// Common test utilities
#![allow(dead_code)]

use gettextify::config::{BackupConfig, ConverterConfig};
use gettextify::service::ConversionService;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const SAMPLE_APP: &str = r#"from myapp.i18n import _


def main(name, count):
    print(f"Hello {name}!")
    print("====")
    print(_("Save changes?"))
    label = f"Processed {count} files."
    key = f"{name}_{count}"
    print("✅ Operation complete")
    return label, key
"#;

pub const SAMPLE_APP_CONVERTED: &str = r#"from myapp.i18n import _


def main(name, count):
    print(_("Hello {}!").format(name))
    print("====")
    print(_("Save changes?"))
    label = _("Processed {} files.").format(count)
    key = f"{name}_{count}"
    print(_("✅ Operation complete"))
    return label, key
"#;

pub fn test_config(dir: &Path, backups: bool) -> ConverterConfig {
    ConverterConfig {
        backup: BackupConfig {
            enabled: backups,
            root: dir.join("backups"),
            project_root: Some(dir.to_path_buf()),
        },
        ..Default::default()
    }
}

pub fn create_test_service(backups: bool) -> (ConversionService, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let service = ConversionService::with_config(test_config(temp_dir.path(), backups));
    (service, temp_dir)
}

pub fn create_test_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let file_path = dir.join(name);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&file_path, content).unwrap();
    file_path
}
