//! Run orchestration
//!
//! `process` walks the input directory one file at a time: read, schedule rows
//! and images, export windows. `sync` walks the sync directory and upserts each
//! row into the remote catalog.

use crate::catalog::{CatalogEntry, CatalogService, SyncReport, Synchronizer, WooCommerceClient};
use crate::config::IngestConfig;
use crate::context::RunContext;
use crate::export::{BatchExporter, Stream};
use crate::images::{ExifTool, Fetcher, ImageProcessor, ImageStage, Tagger};
use crate::scheduler::{RowLayout, RowScheduler};
use crate::table::{list_csv_files, read_catalog, RowRange};
use crate::upload::build_uploader;
use anyhow::Context;
use catalog_common::CatalogError;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Per-file result of a `process` run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub file: String,
    pub rows: usize,
    pub success: usize,
    pub failed: usize,
    /// Window files written, both streams
    pub windows: usize,
    pub elapsed: Duration,
}

/// Per-file result of a `sync` run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFileSummary {
    pub file: String,
    pub report: SyncReport,
    pub elapsed: Duration,
}

/// Run the image pipeline with the production image stage
///
/// The tagging tool is shut down whether or not the run succeeds.
pub async fn run_process(config: &IngestConfig) -> anyhow::Result<Vec<FileSummary>> {
    prepare_dirs(config).await?;

    let uploader = build_uploader(&config.upload)
        .await
        .context("Failed to set up upload destination")?;

    let ctx = Arc::new(RunContext::new());
    let tagger: Arc<dyn Tagger> = Arc::new(ExifTool::new(config.metadata.exiftool_path.clone()));
    let fetcher = Fetcher::new(config.fetch.clone(), config.paths.work_dir.clone())
        .context("Failed to build HTTP client")?;
    let stage = ImageStage::new(ctx.clone(), fetcher, tagger.clone(), uploader, config.metadata.clone());

    info!(run_id = %ctx.run_id, "Starting image pipeline");
    let result = process_dir(config, Arc::new(stage)).await;

    if let Err(e) = tagger.shutdown().await {
        warn!(error = %e, "Failed to stop tagging tool cleanly");
    }
    result
}

/// Run the image pipeline over every CSV file in the input directory
pub async fn process_dir(
    config: &IngestConfig,
    processor: Arc<dyn ImageProcessor>,
) -> anyhow::Result<Vec<FileSummary>> {
    prepare_dirs(config).await?;

    let input_dir = &config.paths.input_dir;
    let files = list_csv_files(input_dir)
        .with_context(|| format!("Failed to list input directory {}", input_dir.display()))?;

    if files.is_empty() {
        warn!(dir = %input_dir.display(), "No CSV files found");
    }

    let mut summaries = Vec::with_capacity(files.len());
    for path in files {
        if let Some(summary) = process_file(config, processor.clone(), &path).await? {
            summaries.push(summary);
        }
    }
    Ok(summaries)
}

/// Process one file to completion
///
/// Returns `Ok(None)` when the file is skipped: unreadable, missing columns
/// or no rows. Export failures abort.
pub async fn process_file(
    config: &IngestConfig,
    processor: Arc<dyn ImageProcessor>,
    path: &Path,
) -> anyhow::Result<Option<FileSummary>> {
    let started = Instant::now();
    let range = RowRange {
        start: config.export.row_start,
        end: config.export.row_end,
    };

    let file = match read_catalog(path, range) {
        Ok(file) => file,
        Err(e) => {
            error!(file = %path.display(), error = %e, "Failed to read file, skipping");
            return Ok(None);
        },
    };

    let columns = match file.require_columns() {
        Ok(columns) => columns,
        Err(e @ CatalogError::MissingColumns { .. }) => {
            error!(file = %file.name, error = %e, "Skipping file");
            return Ok(None);
        },
        Err(e) => return Err(e.into()),
    };

    if file.rows.is_empty() {
        warn!(file = %file.name, ?range, "No rows to process, skipping file");
        return Ok(None);
    }

    let total = file.rows.len();
    info!(
        file = %file.name,
        rows = total,
        products = config.concurrency.products,
        images = config.concurrency.images,
        "Processing file"
    );

    let layout = RowLayout::new(&file.name, &columns, config.export.random_sku);
    let scheduler = RowScheduler::new(config.concurrency, processor, layout)?;
    let mut exporter = BatchExporter::new(
        config.paths.output_dir.clone(),
        file.stem.as_str(),
        config.metadata.author_tag(),
        config.export.batch_size,
    );

    let progress = progress_bar(total as u64, &file.name);
    let mut export_error = None;
    scheduler
        .run(file.rows, |outcome| {
            progress.inc(1);
            if export_error.is_none() {
                if let Err(e) = exporter.push(outcome) {
                    export_error = Some(e);
                }
            }
        })
        .await;
    progress.finish_and_clear();

    if let Some(e) = export_error {
        return Err(anyhow::Error::new(e).context(format!("Failed to export results of {}", file.name)));
    }
    let report = exporter
        .finish()
        .with_context(|| format!("Failed to export results of {}", file.name))?;

    let summary = FileSummary {
        file: file.name,
        rows: total,
        success: report.success_rows,
        failed: report.failed_rows,
        windows: report.files.len(),
        elapsed: started.elapsed(),
    };

    info!(
        file = %summary.file,
        rows = summary.rows,
        success = summary.success,
        failed = summary.failed,
        output_files = report.windows(Stream::Success),
        failed_files = report.windows(Stream::Failed),
        elapsed_secs = summary.elapsed.as_secs_f64(),
        "File complete"
    );
    Ok(Some(summary))
}

/// Run the catalog synchronizer against the configured WooCommerce store
pub async fn run_sync(config: &IngestConfig, move_done: bool) -> anyhow::Result<Vec<SyncFileSummary>> {
    let client = WooCommerceClient::from_config(&config.catalog).context("Failed to set up catalog client")?;
    sync_dir(config, Arc::new(client), move_done).await
}

/// Synchronize every CSV file in the sync directory
pub async fn sync_dir(
    config: &IngestConfig,
    service: Arc<dyn CatalogService>,
    move_done: bool,
) -> anyhow::Result<Vec<SyncFileSummary>> {
    let sync_dir = &config.paths.sync_dir;
    let files = list_csv_files(sync_dir)
        .with_context(|| format!("Failed to list sync directory {}", sync_dir.display()))?;

    if files.is_empty() {
        warn!(dir = %sync_dir.display(), "No CSV files to synchronize");
        return Ok(Vec::new());
    }

    let ctx = Arc::new(RunContext::new());
    info!(run_id = %ctx.run_id, files = files.len(), "Starting catalog sync");
    let synchronizer = Synchronizer::new(
        service,
        ctx,
        config.catalog.backoff_schedule(),
        config.concurrency.sync,
    );

    let mut summaries = Vec::with_capacity(files.len());
    for path in files {
        let started = Instant::now();
        let file = match read_catalog(&path, RowRange::default()) {
            Ok(file) => file,
            Err(e) => {
                error!(file = %path.display(), error = %e, "Failed to read file, skipping");
                continue;
            },
        };

        let entries: Vec<CatalogEntry> = file
            .rows
            .iter()
            .map(|row| CatalogEntry::from_row(row, &config.catalog.status))
            .collect();
        info!(file = %file.name, entries = entries.len(), "Synchronizing file");

        let report = synchronizer.sync_all(entries).await;
        let summary = SyncFileSummary {
            file: file.name,
            report,
            elapsed: started.elapsed(),
        };
        info!(
            file = %summary.file,
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "File synchronized"
        );

        if move_done {
            let moved = move_to_done(sync_dir, &path).await?;
            info!(file = %summary.file, to = %moved.display(), "Moved to done");
        }
        summaries.push(summary);
    }
    Ok(summaries)
}

async fn prepare_dirs(config: &IngestConfig) -> anyhow::Result<()> {
    for dir in [&config.paths.output_dir, &config.paths.work_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    Ok(())
}

/// Move `path` into `<dir>/done/`
async fn move_to_done(dir: &Path, path: &Path) -> anyhow::Result<PathBuf> {
    let done = dir.join("done");
    tokio::fs::create_dir_all(&done)
        .await
        .with_context(|| format!("Failed to create {}", done.display()))?;

    let name = path
        .file_name()
        .with_context(|| format!("{} has no file name", path.display()))?;
    let target = done.join(name);
    tokio::fs::rename(path, &target)
        .await
        .with_context(|| format!("Failed to move {} to {}", path.display(), target.display()))?;
    Ok(target)
}

fn progress_bar(total: u64, file: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} rows ({eta})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(file.to_string());
    pb
}
