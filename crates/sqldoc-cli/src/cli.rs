//! sqldoc - generate HTML, Markdown and JSON documentation for an Azure SQL
//! or SQL Server database.
//!
//! Settings are read from the settings file, then `SQLDOC_*` environment
//! variables, then the flags below. The password is only ever taken from the
//! settings file or `SQLDOC_PASSWORD`.

mod logging;
mod summary;

use anyhow::{Context, Result};
use clap::Parser;
use logging::{LoggingConfig, Verbosity};
use sqldoc_catalog::{NameMatching, RowCountStrategy};
use sqldoc_core::{ConnectionProvider, DatabaseDriver, DriverConnections};
use sqldoc_driver_mssql::MssqlDriver;
use sqldoc_render::{default_formatter, DocumentationAssembler, OutputFormat};
use sqldoc_services::{DocumentationService, RunOutcome, RunProgress, RunRequest};
use sqldoc_settings::{settings_path, SqldocSettings};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Exit status when some formats could not be written
const EXIT_PARTIAL: u8 = 2;
/// Exit status after Ctrl-C
const EXIT_CANCELLED: u8 = 130;

#[derive(Debug, Parser)]
#[command(name = "sqldoc", version, about = "Generate documentation for an Azure SQL / SQL Server database")]
struct Args {
    /// Settings file (JSON, or TOML with a .toml extension)
    #[arg(short, long, env = "SQLDOC_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output format; repeat for several (html, markdown, json, csv, xml)
    #[arg(short = 'f', long = "format", value_name = "FORMAT")]
    formats: Vec<OutputFormat>,

    /// Directory the documents are written to
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    #[arg(long)]
    server: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    database: Option<String>,

    #[arg(long)]
    username: Option<String>,

    /// Connect, print the server version and exit
    #[arg(long)]
    test_connection: bool,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only
    #[arg(short, long)]
    quiet: bool,

    /// Also write JSON logs to the default log directory
    #[arg(long)]
    log_json: bool,

    /// Document system schemas and Microsoft-shipped objects too
    #[arg(long)]
    include_system_objects: bool,

    /// Skip row counts entirely
    #[arg(long)]
    no_row_counts: bool,

    /// Count rows with COUNT_BIG(*) per table instead of catalog statistics
    #[arg(long, conflicts_with = "no_row_counts")]
    exact_row_counts: bool,

    /// Match child rows to tables ignoring case
    #[arg(long)]
    case_insensitive_names: bool,

    /// Fetch catalog categories on parallel connections
    #[arg(long)]
    concurrent: bool,

    #[arg(long, value_name = "PATH")]
    html_template: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    markdown_template: Option<PathBuf>,

    /// Write a sample settings file to --config (or the default location) and exit
    #[arg(long)]
    create_sample_config: bool,
}

impl Args {
    fn verbosity(&self) -> Verbosity {
        if self.verbose {
            Verbosity::Verbose
        } else if self.quiet {
            Verbosity::Quiet
        } else {
            Verbosity::Normal
        }
    }

    /// Flags win over the settings file and the environment
    fn apply_to(&self, settings: &mut SqldocSettings) {
        let connection = &mut settings.connection;
        if let Some(server) = &self.server {
            connection.server = server.clone();
        }
        if let Some(port) = self.port {
            connection.port = port;
        }
        if let Some(database) = &self.database {
            connection.database = database.clone();
        }
        if let Some(username) = &self.username {
            connection.username = Some(username.clone());
        }

        let output = &mut settings.output;
        if !self.formats.is_empty() {
            output.formats = self.formats.iter().copied().collect();
        }
        if let Some(dir) = &self.output_dir {
            output.directory = dir.clone();
        }
        if let Some(path) = &self.html_template {
            output.html_template = Some(path.clone());
        }
        if let Some(path) = &self.markdown_template {
            output.markdown_template = Some(path.clone());
        }

        let extraction = &mut settings.extraction;
        if self.include_system_objects {
            extraction.include_system_objects = true;
        }
        if self.no_row_counts {
            extraction.include_row_counts = false;
        }
        if self.exact_row_counts {
            extraction.include_row_counts = true;
            extraction.row_count_strategy = RowCountStrategy::ExactCount;
        }
        if self.case_insensitive_names {
            extraction.name_matching = NameMatching::CaseInsensitive;
        }
        if self.concurrent {
            extraction.concurrent_categories = true;
        }
    }

    fn load_settings(&self) -> Result<SqldocSettings> {
        let mut settings = match &self.config {
            Some(path) => SqldocSettings::load_from(path)?,
            None => SqldocSettings::load()?,
        };
        settings.apply_process_env()?;
        self.apply_to(&mut settings);
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "sqldoc failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    if args.create_sample_config {
        let path = match &args.config {
            Some(path) => path.clone(),
            None => settings_path()?,
        };
        SqldocSettings::write_sample(&path)?;
        println!("Wrote sample settings to {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let settings = args.load_settings()?;
    let log_dir = settings
        .logging
        .directory
        .clone()
        .or_else(|| args.log_json.then(logging::log_directory));
    let _log_guard = logging::init(&LoggingConfig::new(
        &settings.logging.level,
        args.verbosity(),
        log_dir,
    ))?;

    let driver = Arc::new(MssqlDriver::new());
    let config = settings.to_connection_config()?;
    tracing::info!(connection = %driver.build_connection_string(&config), "using connection");

    if args.test_connection {
        let version = driver
            .test_connection(&config)
            .await
            .context("Connection test failed")?;
        println!("Connected: {}", version);
        return Ok(ExitCode::SUCCESS);
    }

    let mut assembler = DocumentationAssembler::new(default_formatter());
    for (format, source) in settings.output.template_overrides()? {
        tracing::info!(%format, "using custom template");
        assembler = assembler.with_template_source(format, source)?;
    }
    let service = DocumentationService::new(assembler);

    let provider: Arc<dyn ConnectionProvider> = Arc::new(DriverConnections::new(driver, config));
    let request = RunRequest::new(
        provider,
        settings.output.formats.iter().copied(),
        &settings.output.directory,
    )
    .with_extractor_config(settings.to_extractor_config())
    .with_progress(Arc::new(log_progress));

    let handle = service.start(request)?;
    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling documentation run");
            cancel.cancel();
        }
    });

    match handle.wait().await {
        RunOutcome::Completed(report) => {
            println!("{}", summary::render(&report));
            if report.is_complete() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_PARTIAL))
            }
        }
        RunOutcome::Cancelled => {
            eprintln!("Documentation run cancelled; no documents were kept");
            Ok(ExitCode::from(EXIT_CANCELLED))
        }
        RunOutcome::Failed(e) => Err(e).context("Documentation run failed"),
    }
}

fn log_progress(event: RunProgress) {
    match event {
        RunProgress::Started { run_id } => tracing::info!(%run_id, "documentation run started"),
        RunProgress::Extracting(progress) => tracing::info!(
            category = %progress.category,
            "[{}/{}] fetched",
            progress.completed,
            progress.total
        ),
        RunProgress::Extracted { tables, warnings } => {
            tracing::info!(tables, warnings, "catalog extracted")
        }
        RunProgress::Assembling { formats } => tracing::info!(formats, "rendering documentation"),
        RunProgress::Finished => tracing::debug!("documentation run finished"),
    }
}
