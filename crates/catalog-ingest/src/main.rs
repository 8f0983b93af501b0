//! Catalog Ingest - product image pipeline and catalog synchronizer

use anyhow::Result;
use catalog_common::logging::{init_logging, LogConfig, LogLevel};
use catalog_ingest::config::IngestConfig;
use catalog_ingest::pipeline;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "catalog-ingest")]
#[command(author, version, about = "Product image pipeline and catalog synchronizer")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process every CSV in the input directory: images, then export windows
    Process {
        /// Input directory
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Scratch directory for images
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Rows processed at once
        #[arg(long)]
        products: Option<usize>,

        /// Images processed at once, across all rows
        #[arg(long)]
        images: Option<usize>,

        /// Rows per output window
        #[arg(long)]
        batch_size: Option<usize>,

        /// First row to process (1-based)
        #[arg(long)]
        row_start: Option<usize>,

        /// Last row to process (inclusive)
        #[arg(long)]
        row_end: Option<usize>,
    },

    /// Create or update catalog products from every CSV in the sync directory
    Sync {
        /// Sync directory
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Entries synchronized at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Move finished files to `<dir>/done`
        #[arg(long)]
        move_done: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("catalog-ingest")
        .filter_directives("aws_config=warn,aws_smithy_runtime=warn,hyper=warn,reqwest=warn")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);
    let _guard = init_logging(&log_config)?;

    let mut config = IngestConfig::from_env()?;

    match cli.command {
        Command::Process {
            input,
            output,
            work_dir,
            products,
            images,
            batch_size,
            row_start,
            row_end,
        } => {
            if let Some(input) = input {
                config.paths.input_dir = input;
            }
            if let Some(output) = output {
                config.paths.output_dir = output;
            }
            if let Some(work_dir) = work_dir {
                config.paths.work_dir = work_dir;
            }
            if let Some(products) = products {
                config.concurrency.products = products;
            }
            if let Some(images) = images {
                config.concurrency.images = images;
            }
            if let Some(batch_size) = batch_size {
                config.export.batch_size = batch_size;
            }
            config.export.row_start = row_start.or(config.export.row_start);
            config.export.row_end = row_end.or(config.export.row_end);
            config.validate()?;

            info!(input = %config.paths.input_dir.display(), "Processing catalog files");
            let summaries = pipeline::run_process(&config).await?;

            let rows: usize = summaries.iter().map(|s| s.rows).sum();
            let failed: usize = summaries.iter().map(|s| s.failed).sum();
            if failed > 0 {
                warn!(files = summaries.len(), rows, failed, "Processing finished with failed rows");
            } else {
                info!(files = summaries.len(), rows, "Processing finished");
            }
        },
        Command::Sync {
            dir,
            concurrency,
            move_done,
        } => {
            if let Some(dir) = dir {
                config.paths.sync_dir = dir;
            }
            if let Some(concurrency) = concurrency {
                config.concurrency.sync = concurrency;
            }
            config.validate()?;

            info!(dir = %config.paths.sync_dir.display(), "Synchronizing catalog");
            let summaries = pipeline::run_sync(&config, move_done).await?;

            let failed: usize = summaries.iter().map(|s| s.report.failed).sum();
            let total: usize = summaries.iter().map(|s| s.report.total()).sum();
            info!(files = summaries.len(), entries = total, failed, "Sync finished");
        },
    }

    Ok(())
}
