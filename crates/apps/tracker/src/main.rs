//! jobtrack - mirror job application emails into a spreadsheet

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use jobtrack::storage::{ApplicationStore, SqliteStore};
use jobtrack::{
    GmailClient, GoogleSheetsClient, IngestConfig, IngestionPipeline, RunReport, build_classifier,
    spreadsheet_id_from_url,
};
use log::{error, info, warn};

#[derive(Parser)]
#[command(name = "jobtrack")]
#[command(about = "Track job applications from your mailbox in a spreadsheet")]
struct Cli {
    /// Path to a JSON config file (default: ~/.config/jobtrack/jobtrack.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one ingestion cycle
    Run(RunArgs),
    /// Run ingestion cycles on a fixed interval
    Watch {
        #[command(flatten)]
        run: RunArgs,

        /// Seconds between two runs
        #[arg(long, default_value_t = 300)]
        interval: u64,
    },
    /// Print the stored applications of an owner
    List {
        /// Mailbox owner
        #[arg(short, long)]
        owner: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Mailbox owner; checkpoints and applications are kept per owner
    #[arg(short, long)]
    owner: String,

    /// Spreadsheet id or its full Google Sheets URL
    #[arg(short, long)]
    spreadsheet: String,

    /// Tab to write to (default: the first tab)
    #[arg(long)]
    sheet_name: Option<String>,

    /// OAuth access token with Gmail read and Sheets write scopes
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: String,
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        warn!("Failed to initialize config directory: {}", e);
    }

    if let Err(e) = run_cli(Cli::parse()) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => IngestConfig::from_file(path)?,
        None => IngestConfig::load()?,
    };

    match cli.command {
        Command::Run(args) => {
            let (pipeline, sheet_name) = build_pipeline(&config, &args)?;
            let report = pipeline.run(&args.owner, &sheet_name)?;
            print_report(&report);
            Ok(())
        }
        Command::Watch { run, interval } => watch(&config, &run, Duration::from_secs(interval)),
        Command::List { owner } => list(&config, &owner),
    }
}

fn build_pipeline(config: &IngestConfig, args: &RunArgs) -> Result<(IngestionPipeline, String)> {
    let spreadsheet_id = if args.spreadsheet.contains('/') {
        spreadsheet_id_from_url(&args.spreadsheet)?
    } else {
        args.spreadsheet.clone()
    };

    let sheets = GoogleSheetsClient::new(
        &args.access_token,
        spreadsheet_id,
        config.http_timeout(),
        config.sheet_write_delay(),
    );
    let sheet_name = match &args.sheet_name {
        Some(name) => name.clone(),
        None => sheets
            .first_sheet_name()
            .context("Failed to read spreadsheet tabs")?,
    };

    let db_path = config.resolved_database_path()?;
    info!("Using database {:?}", db_path);
    let store = Arc::new(SqliteStore::new(&db_path)?);

    let classifier = build_classifier(&config.classifier, config.http_timeout())?;
    let gmail = GmailClient::new(&args.access_token, config.http_timeout());

    let pipeline = IngestionPipeline::new(
        Arc::new(gmail),
        Arc::from(classifier),
        store.clone(),
        store,
        Arc::new(sheets),
        config,
    );
    Ok((pipeline, sheet_name))
}

fn watch(config: &IngestConfig, args: &RunArgs, interval: Duration) -> Result<()> {
    let (pipeline, sheet_name) = build_pipeline(config, args)?;
    info!(
        "Watching mail for {} every {}s into tab {:?}",
        args.owner,
        interval.as_secs(),
        sheet_name
    );

    loop {
        // A failed run leaves the watermark where it was; the next tick retries
        match pipeline.run(&args.owner, &sheet_name) {
            Ok(report) => print_report(&report),
            Err(e) => error!("Run failed: {}", e),
        }
        std::thread::sleep(interval);
    }
}

fn list(config: &IngestConfig, owner: &str) -> Result<()> {
    let store = SqliteStore::new(config.resolved_database_path()?)?;
    let applications = store.list(owner)?;

    if applications.is_empty() {
        println!("No applications for {}", owner);
        return Ok(());
    }

    for app in applications {
        println!(
            "{:>4}  {:<32}  {:<24}  {:<14}  {}",
            app.row_number,
            app.job_title,
            app.company,
            app.status.as_str(),
            app.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    for skipped in &report.skipped {
        let retry = if skipped.transient { " (will retry)" } else { "" };
        warn!(
            "Skipped {} at {}: {}{}",
            skipped.message_id, skipped.stage, skipped.reason, retry
        );
    }
    for failed in &report.mirror.failed {
        warn!("Row {} not mirrored: {}", failed.row_number, failed.reason);
    }
    if let Some(checkpoint) = report.checkpoint {
        info!("Checkpoint recorded at {}", checkpoint.to_rfc3339());
    }
}
