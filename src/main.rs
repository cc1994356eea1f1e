use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{self, filter::EnvFilter};

use gettextify::{
    ast_utils::ParsedSource,
    config::{ClassifierConfig, ConverterConfig},
    service::ConversionService,
};

/// gettextify - wrap user-facing Python strings in gettext calls
#[derive(Parser, Debug)]
#[command(name = "gettextify")]
#[command(about = "Rewrite user-facing string literals and f-strings into externalization calls")]
#[command(version)]
struct Args {
    /// Python files to convert
    #[arg(required = true, value_name = "FILES")]
    files: Vec<PathBuf>,

    #[arg(long = "dry-run", help = "Report what would change without writing files")]
    dry_run: bool,

    #[arg(long = "no-backup", help = "Do not back up files before rewriting them")]
    no_backup: bool,

    #[arg(
        long = "backup-dir",
        help = "Directory for backups (default: ~/.gettextify/backups)",
        value_name = "PATH"
    )]
    backup_dir: Option<PathBuf>,

    #[arg(
        long = "project-root",
        help = "Root that backup paths are mirrored from (default: current directory)",
        value_name = "PATH"
    )]
    project_root: Option<PathBuf>,

    #[arg(long = "config", help = "YAML configuration file", value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(
        long = "extern-fn",
        help = "Name of the externalization function (default: _)",
        value_name = "NAME"
    )]
    extern_function: Option<String>,

    /// Sink function names; replaces the configured set when given
    #[arg(long = "sink", help = "Sink function whose string arguments are converted (repeatable)")]
    sinks: Vec<String>,

    #[arg(long = "json", help = "Print the report as JSON")]
    json: bool,

    #[arg(long = "dump-ast", help = "Print the syntax tree of each file and exit")]
    dump_ast: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::debug!("Arguments: {:?}", args);

    if args.dump_ast {
        for path in &args.files {
            let bytes = std::fs::read(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let parsed = ParsedSource::parse(&bytes).map_err(|e| e.with_path(path))?;
            println!("# {}\n{}", path.display(), parsed.ast_debug_string());
        }
        return Ok(());
    }

    let json = args.json;
    let files = args.files.clone();
    let config = create_config_from_args(args)?;

    let service = ConversionService::with_config(config);
    let report = service.convert_files(&files).await?;

    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

/// Create a ConverterConfig from the optional YAML file and command line arguments
fn create_config_from_args(args: Args) -> Result<ConverterConfig> {
    let mut config = match &args.config {
        Some(path) => ConverterConfig::from_yaml_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ConverterConfig::default(),
    };

    if let Some(name) = args.extern_function {
        config.extern_function = name;
    }
    if !args.sinks.is_empty() {
        let derived = ClassifierConfig::for_sinks(&args.sinks, &config.extern_function);
        for prefix in derived.context_prefixes {
            if !config.classifier.context_prefixes.contains(&prefix) {
                config.classifier.context_prefixes.push(prefix);
            }
        }
        config.sink_functions = args.sinks;
    }

    config.dry_run |= args.dry_run;
    if args.no_backup {
        config.backup.enabled = false;
    }
    if let Some(dir) = args.backup_dir {
        config.backup.root = dir;
    }
    config.backup.project_root = match args.project_root {
        Some(root) => Some(root),
        None => match config.backup.project_root.take() {
            Some(root) => Some(root),
            None => Some(std::env::current_dir()?),
        },
    };

    config.validate()?;
    config.normalize();
    Ok(config)
}
