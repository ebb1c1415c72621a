//! xsd-ingest CLI entry point

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use xsd_ingest::config::{FileConfig, Options, Overrides};
use xsd_ingest::db::{memory::MemoryConnector, mssql::MssqlConnector, SqlConnector};
use xsd_ingest::import::{ImportOptions, Importer};
use xsd_ingest::ingest::{IngestRunner, RemoteMirror, RunnerOptions};
use xsd_ingest::observe::Observer;
use xsd_ingest::{analyze_xsd, AnalyzeOptions};

#[derive(Parser)]
#[command(name = "xsd-ingest")]
#[command(author, version, about = "Derive a SQL Server schema from an XSD and ingest XML documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every mode; each has an environment fallback.
/// Precedence: flag > environment > config file > built-in default.
#[derive(Args, Clone)]
struct CommonArgs {
    /// Path to the .xsd file
    #[arg(long, env = "XSD_INGEST_XSD")]
    xsd: Option<PathBuf>,

    /// Output directory for generated artifacts
    #[arg(long, env = "XSD_INGEST_OUT")]
    out: Option<PathBuf>,

    /// Target SQL schema name
    #[arg(long, env = "XSD_INGEST_SCHEMA")]
    schema: Option<String>,

    /// Example XML instance to import once after analysis
    #[arg(long, env = "XSD_INGEST_XML")]
    xml: Option<PathBuf>,

    /// Directory scanned for incoming *.xml files
    #[arg(long = "import-dir", env = "XSD_INGEST_IMPORT_DIR")]
    import_dir: Option<PathBuf>,

    /// ADO-style connection string, or `memory:` for a dry run
    #[arg(long, env = "XSD_INGEST_CONNECTION")]
    connection: Option<String>,

    /// Remote directory mirrored into the import directory
    #[arg(long = "remote-source-dir", env = "XSD_INGEST_REMOTE_SOURCE_DIR")]
    remote_source_dir: Option<PathBuf>,

    /// Remote poll cadence in seconds (floor: 30)
    #[arg(long = "remote-poll-seconds", env = "XSD_INGEST_REMOTE_POLL_SECONDS")]
    remote_poll_seconds: Option<u64>,

    /// History file recording already-mirrored filenames
    #[arg(long = "remote-history-file", env = "XSD_INGEST_REMOTE_HISTORY_FILE")]
    remote_history_file: Option<PathBuf>,

    /// Keep watching after the first pass (analyze mode)
    #[arg(long, env = "XSD_INGEST_WATCH", num_args = 0..=1, default_missing_value = "true")]
    watch: Option<bool>,

    /// Verbose import diagnostics
    #[arg(
        long = "verbose-import",
        env = "XSD_INGEST_VERBOSE_IMPORT",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    verbose_import: Option<bool>,

    /// Write the per-decision import_audit.csv
    #[arg(long, env = "XSD_INGEST_AUDIT", num_args = 0..=1, default_missing_value = "true")]
    audit: Option<bool>,

    /// Quiet window after filesystem events before a batch runs
    #[arg(long = "debounce-ms", env = "XSD_INGEST_DEBOUNCE_MS")]
    debounce_ms: Option<u64>,

    /// Longest wait for the per-file ready gate
    #[arg(long = "ready-wait-ms", env = "XSD_INGEST_READY_WAIT_MS")]
    ready_wait_ms: Option<u64>,

    /// Disable duplicate-row probes before inserts
    #[arg(
        long = "no-idempotency",
        env = "XSD_INGEST_NO_IDEMPOTENCY",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    no_idempotency: Option<bool>,

    /// TOML config file
    #[arg(long, env = "XSD_INGEST_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze the XSD, emit DDL artifacts, optionally import one document
    Analyze {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Run one ingest pass over the import directory
    Import {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Ingest and poll the remote source until canceled
    Watch {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Watch mode intended for platform service hosting
    Daemon {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let (mode, common) = match cli.command {
        Commands::Analyze { common } => (Mode::Analyze, common),
        Commands::Import { common } => (Mode::Import, common),
        Commands::Watch { common } => (Mode::Watch, common),
        Commands::Daemon { common } => (Mode::Watch, common),
    };

    let default_level = if common.verbose_import == Some(true) {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if let Err(err) = run(mode, common).await {
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Analyze,
    Import,
    Watch,
}

fn overrides_from(common: &CommonArgs) -> Overrides {
    Overrides {
        xsd: common.xsd.clone(),
        out: common.out.clone(),
        schema: common.schema.clone(),
        xml: common.xml.clone(),
        import_dir: common.import_dir.clone(),
        connection: common.connection.clone(),
        remote_source_dir: common.remote_source_dir.clone(),
        remote_poll_seconds: common.remote_poll_seconds,
        remote_history_file: common.remote_history_file.clone(),
        watch: common.watch,
        verbose_import: common.verbose_import,
        audit: common.audit,
        debounce_ms: common.debounce_ms,
        ready_wait_ms: common.ready_wait_ms,
        no_idempotency: common.no_idempotency,
    }
}

fn connector_for(connection: &str) -> Arc<dyn SqlConnector> {
    if connection.starts_with("memory:") {
        Arc::new(MemoryConnector::new())
    } else {
        Arc::new(MssqlConnector::new(connection))
    }
}

async fn run(mode: Mode, common: CommonArgs) -> Result<()> {
    let file_config = match &common.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let options = Options::resolve(overrides_from(&common), file_config)?;

    let output = analyze_xsd(&AnalyzeOptions {
        xsd_path: options.xsd.clone(),
        out_dir: options.out_dir.clone(),
        target_schema: options.target_schema.clone(),
    })?;
    let model = Arc::new(output.model);

    let observer = Arc::new(Observer::configure(&options.out_dir, options.audit));
    let import_options = ImportOptions {
        idempotency: options.idempotency,
    };

    // One-shot example document, when requested.
    if let Some(example) = &options.example_xml {
        let connection = options
            .connection
            .as_deref()
            .context("--connection is required to import the example document")?;
        let connector = connector_for(connection);
        let importer = Importer::new(
            Arc::clone(&model),
            import_options.clone(),
            Arc::clone(&observer),
        );
        let mut session = connector.connect().await?;
        let outcome = importer.import_file(session.as_mut(), example).await?;
        info!(file = %example.display(), rows = outcome.total, "imported example document");
    }

    let watching = mode == Mode::Watch || (mode == Mode::Analyze && options.watch);
    if mode == Mode::Import || watching {
        let (connection, import_dir) = options.require_ingest()?;
        let connector = connector_for(connection);
        let importer = Importer::new(Arc::clone(&model), import_options, Arc::clone(&observer));
        let runner = Arc::new(IngestRunner::new(
            RunnerOptions {
                ingest_dir: import_dir.to_path_buf(),
                debounce: Duration::from_millis(options.debounce_ms),
                ready_wait: Duration::from_millis(options.ready_wait_ms),
            },
            importer,
            connector,
            Arc::clone(&observer),
        ));

        let token = CancellationToken::new();
        if watching {
            run_daemon(&options, runner, observer, token).await?;
        } else {
            runner.run_batch(&token).await;
        }
    }

    Ok(())
}

/// Watch + poll until Ctrl-C; the in-flight file finishes before exit
async fn run_daemon(
    options: &Options,
    runner: Arc<IngestRunner>,
    observer: Arc<Observer>,
    token: CancellationToken,
) -> Result<()> {
    let (trigger_tx, trigger_rx) = tokio::sync::mpsc::unbounded_channel();

    let mirror_task = options.remote_source_dir.as_ref().map(|remote| {
        let mirror = Arc::new(RemoteMirror::new(
            remote,
            options.import_dir.as_deref().expect("checked by caller"),
            &options.remote_history_file,
            Arc::clone(&observer),
        ));
        let token = token.clone();
        let trigger = trigger_tx.clone();
        let poll = Duration::from_secs(options.remote_poll_seconds);
        tokio::spawn(async move { mirror.run(token, poll, trigger).await })
    });

    let runner_task = {
        let token = token.clone();
        tokio::spawn(async move { runner.run(token, trigger_tx, trigger_rx).await })
    };

    info!("daemon running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await.ok();
    info!("shutting down");
    token.cancel();

    runner_task.await.ok();
    if let Some(task) = mirror_task {
        task.await.ok();
    }
    Ok(())
}
