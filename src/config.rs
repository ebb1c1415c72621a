//! Runtime configuration.
//!
//! A single immutable [`Options`] struct is resolved before any core code
//! runs, merging four layers: built-in defaults, the TOML config file, the
//! environment (handled by the CLI layer's env fallbacks), and CLI flags.
//! Flags and environment arrive here together as [`Overrides`]; the core
//! never reads the environment or the filesystem itself.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::XsdIngestError;

/// Optional settings from the TOML config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FileConfig {
    pub xsd: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub schema: Option<String>,
    pub xml: Option<PathBuf>,
    pub import_dir: Option<PathBuf>,
    pub connection: Option<String>,
    pub remote_source_dir: Option<PathBuf>,
    pub remote_poll_seconds: Option<u64>,
    pub remote_history_file: Option<PathBuf>,
    pub watch: Option<bool>,
    pub verbose_import: Option<bool>,
    pub audit: Option<bool>,
    pub debounce_ms: Option<u64>,
    pub ready_wait_ms: Option<u64>,
    pub no_idempotency: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, XsdIngestError> {
        let content =
            std::fs::read_to_string(path).map_err(|err| XsdIngestError::ConfigError {
                message: format!("cannot read config file {}: {}", path.display(), err),
            })?;
        toml::from_str(&content).map_err(|err| XsdIngestError::ConfigError {
            message: format!("invalid config file {}: {}", path.display(), err),
        })
    }
}

/// Values arriving from CLI flags or their environment fallbacks.
/// `None` means "not given"; the config file or defaults apply.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub xsd: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub schema: Option<String>,
    pub xml: Option<PathBuf>,
    pub import_dir: Option<PathBuf>,
    pub connection: Option<String>,
    pub remote_source_dir: Option<PathBuf>,
    pub remote_poll_seconds: Option<u64>,
    pub remote_history_file: Option<PathBuf>,
    pub watch: Option<bool>,
    pub verbose_import: Option<bool>,
    pub audit: Option<bool>,
    pub debounce_ms: Option<u64>,
    pub ready_wait_ms: Option<u64>,
    pub no_idempotency: Option<bool>,
}

/// Fully resolved, immutable runtime options
#[derive(Debug, Clone)]
pub struct Options {
    pub xsd: PathBuf,
    pub out_dir: PathBuf,
    pub target_schema: String,
    /// Example XML instance to import once after analysis
    pub example_xml: Option<PathBuf>,
    pub import_dir: Option<PathBuf>,
    pub connection: Option<String>,
    pub remote_source_dir: Option<PathBuf>,
    pub remote_poll_seconds: u64,
    pub remote_history_file: PathBuf,
    pub watch: bool,
    pub verbose_import: bool,
    pub audit: bool,
    pub debounce_ms: u64,
    pub ready_wait_ms: u64,
    pub idempotency: bool,
}

impl Options {
    /// Merge precedence: flag/environment > config file > built-in default
    pub fn resolve(cli: Overrides, file: FileConfig) -> Result<Self, XsdIngestError> {
        let xsd = cli
            .xsd
            .or(file.xsd)
            .ok_or_else(|| XsdIngestError::ConfigError {
                message: "missing required --xsd (or XSD_INGEST_XSD / config `xsd`)".to_string(),
            })?;
        let out_dir = cli.out.or(file.out).unwrap_or_else(|| PathBuf::from("out"));
        let remote_history_file = cli
            .remote_history_file
            .or(file.remote_history_file)
            .unwrap_or_else(|| out_dir.join("remote_copied_files.txt"));

        Ok(Self {
            xsd,
            target_schema: cli.schema.or(file.schema).unwrap_or_else(|| "xsd".to_string()),
            example_xml: cli.xml.or(file.xml),
            import_dir: cli.import_dir.or(file.import_dir),
            connection: cli.connection.or(file.connection),
            remote_source_dir: cli.remote_source_dir.or(file.remote_source_dir),
            remote_poll_seconds: cli
                .remote_poll_seconds
                .or(file.remote_poll_seconds)
                .unwrap_or(60)
                .max(30),
            remote_history_file,
            watch: cli.watch.or(file.watch).unwrap_or(false),
            verbose_import: cli.verbose_import.or(file.verbose_import).unwrap_or(false),
            audit: cli.audit.or(file.audit).unwrap_or(false),
            debounce_ms: cli.debounce_ms.or(file.debounce_ms).unwrap_or(200),
            ready_wait_ms: cli.ready_wait_ms.or(file.ready_wait_ms).unwrap_or(2000),
            idempotency: !cli.no_idempotency.or(file.no_idempotency).unwrap_or(false),
            out_dir,
        })
    }

    /// Daemon and import modes additionally need a database and a directory
    pub fn require_ingest(&self) -> Result<(&str, &Path), XsdIngestError> {
        let connection = self
            .connection
            .as_deref()
            .ok_or_else(|| XsdIngestError::ConfigError {
                message: "missing required --connection for ingest mode".to_string(),
            })?;
        let import_dir = self
            .import_dir
            .as_deref()
            .ok_or_else(|| XsdIngestError::ConfigError {
                message: "missing required --import-dir for ingest mode".to_string(),
            })?;
        Ok((connection, import_dir))
    }
}
