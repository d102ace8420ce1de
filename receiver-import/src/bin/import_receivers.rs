use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use receiver_import::credentials::CredentialService;
use receiver_import::db;
use receiver_import::import::{
    ImportArguments, ImportConfig, ImportStatus, PgSubscriberStore, ReceiverImporter,
};

#[derive(Parser, Debug)]
#[command(
    name = "import_receivers",
    about = "Import receivers from a spreadsheet into a container"
)]
struct Args {
    /// Spreadsheet to import (xlsx, xlsm, xlsb, xls or ods).
    #[arg(long)]
    file: PathBuf,

    /// 1-based column holding the comma-separated group titles.
    #[arg(long)]
    title_column: String,

    /// 1-based column holding the email address.
    #[arg(long)]
    email_column: String,

    /// Container the receivers and groups belong to.
    #[arg(long)]
    pid: String,

    /// Treat the first row as a header.
    #[arg(long)]
    has_title_row: bool,

    /// Override RECEIVER_IMPORT_BATCH_SIZE.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Apply pending migrations before importing.
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    let workbook = tokio::fs::read(&args.file).await?;
    let arguments = ImportArguments {
        file_size: workbook.len() as u64,
        title_column: Some(args.title_column),
        email_column: Some(args.email_column),
        import_pid: Some(args.pid),
        has_title_row: args.has_title_row,
    };

    let mut config = ImportConfig::from_env();
    if let Some(batch_size) = args.batch_size {
        config = config.with_batch_size(batch_size);
    }

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;

    if args.migrate {
        db::run_migrations(&pool).await?;
    }

    let store = PgSubscriberStore::new(pool.clone());
    let importer = ReceiverImporter::new(&store, config, CredentialService::new()?);
    let report = importer.import(&arguments, workbook).await?;
    pool.close().await;

    let mut stdout = io::stdout();
    for (field, message) in &report.errors {
        writeln!(stdout, "field {field}: {message}")?;
    }
    for row_error in &report.row_errors {
        writeln!(
            stdout,
            "row {}: {} ({})",
            row_error.row, row_error.error, row_error.email
        )?;
    }
    writeln!(
        stdout,
        "{:?}: {} imported, {} updated, {} unchanged, {} skipped",
        report.status,
        report.stats.imported,
        report.stats.updated,
        report.stats.unchanged,
        report.stats.skipped
    )?;

    if report.status == ImportStatus::Error {
        std::process::exit(1);
    }

    Ok(())
}
