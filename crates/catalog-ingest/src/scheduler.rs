//! Two-tier row/image scheduler
//!
//! Rows run under the product pool. Each row spawns its image tasks, which all
//! compete for one image pool shared by every row; a row never holds an image
//! permit itself. Row outcomes are delivered in completion order.

use crate::config::ConcurrencyConfig;
use crate::extract::UrlExtractor;
use crate::images::{ImageError, ImageProcessor, ImageTask};
use crate::table::CatalogColumns;
use catalog_common::row::ProductRow;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const NO_VALID_IMAGE: &str = "No valid image URL";
pub const ALL_IMAGES_FAILED: &str = "All images failed";

/// Where a row's data lives and what to do with it
#[derive(Debug, Clone)]
pub struct RowLayout {
    /// Source file name, for logs
    pub file: String,
    pub images: String,
    pub title: String,
    pub description: Option<String>,
    /// Column that receives a synthesized SKU
    pub sku: String,
    pub random_sku: bool,
}

impl RowLayout {
    pub fn new(file: &str, columns: &CatalogColumns, random_sku: bool) -> Self {
        Self {
            file: file.to_string(),
            images: columns.images.clone(),
            title: columns.title.clone(),
            description: columns.description.clone(),
            sku: columns.sku.clone().unwrap_or_else(|| "SKU".to_string()),
            random_sku,
        }
    }
}

/// Terminal state of one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Success(ProductRow),
    /// The row carries its reason in the error column
    Failed(ProductRow),
}

impl RowOutcome {
    pub fn row(&self) -> &ProductRow {
        match self {
            RowOutcome::Success(row) | RowOutcome::Failed(row) => row,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RowOutcome::Success(_))
    }
}

struct Shared {
    images: Arc<Semaphore>,
    processor: Arc<dyn ImageProcessor>,
    extractor: UrlExtractor,
    layout: RowLayout,
}

pub struct RowScheduler {
    products: Arc<Semaphore>,
    shared: Arc<Shared>,
}

impl RowScheduler {
    pub fn new(
        concurrency: ConcurrencyConfig,
        processor: Arc<dyn ImageProcessor>,
        layout: RowLayout,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            products: Arc::new(Semaphore::new(concurrency.products)),
            shared: Arc::new(Shared {
                images: Arc::new(Semaphore::new(concurrency.images)),
                processor,
                extractor: UrlExtractor::new()?,
                layout,
            }),
        })
    }

    /// Process every row, handing each outcome to `on_outcome` as it completes
    ///
    /// Returns once every row has produced exactly one outcome.
    pub async fn run<F>(&self, rows: Vec<ProductRow>, mut on_outcome: F)
    where
        F: FnMut(RowOutcome),
    {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let products = self.products.clone();
        let shared = self.shared.clone();
        let producer = tokio::spawn(async move {
            let mut rows_in_flight = JoinSet::new();
            for row in rows {
                let Ok(permit) = products.clone().acquire_owned().await else {
                    break;
                };
                let shared = shared.clone();
                let tx = tx.clone();
                rows_in_flight.spawn(async move {
                    let outcome = process_row(&shared, row).await;
                    drop(permit);
                    let _ = tx.send(outcome);
                });
            }
            drop(tx);
            while let Some(joined) = rows_in_flight.join_next().await {
                if let Err(e) = joined {
                    error!(error = %e, "Row task panicked");
                }
            }
        });

        while let Some(outcome) = rx.recv().await {
            on_outcome(outcome);
        }

        if let Err(e) = producer.await {
            error!(error = %e, "Row producer panicked");
        }
    }
}

async fn process_row(shared: &Arc<Shared>, mut row: ProductRow) -> RowOutcome {
    let layout = &shared.layout;

    if layout.random_sku {
        row.set(&layout.sku, random_sku(row.number));
    }

    let title = row.value(&layout.title).trim().to_string();
    let urls = shared.extractor.extract(row.value(&layout.images));

    if urls.is_empty() {
        warn!(file = %layout.file, row = row.number, "No valid image URL, marking row failed");
        row.set(&layout.images, "");
        return RowOutcome::Failed(row.with_error(NO_VALID_IMAGE));
    }

    info!(file = %layout.file, row = row.number, title = %title, images = urls.len(), "Processing row");

    let mut image_tasks = JoinSet::new();
    for (index, url) in urls.iter().enumerate() {
        let task = ImageTask::new(url, index, &title, row.number);
        let pool = shared.images.clone();
        let processor = shared.processor.clone();
        image_tasks.spawn(async move {
            let result = match pool.acquire_owned().await {
                Ok(_permit) => processor.process(&task).await,
                Err(e) => Err(ImageError::Join(e.to_string())),
            };
            (task, result)
        });
    }

    // (source url, uploaded url) in completion order
    let mut uploaded: Vec<(String, String)> = Vec::with_capacity(urls.len());
    while let Some(joined) = image_tasks.join_next().await {
        match joined {
            Ok((task, Ok(url))) => {
                debug!(file = %layout.file, row = task.row, image = task.index + 1, url = %url, "Image uploaded");
                uploaded.push((task.url, url));
            },
            Ok((task, Err(e))) => {
                warn!(
                    file = %layout.file,
                    row = task.row,
                    image = task.index + 1,
                    url = %task.url,
                    error = %e,
                    "Image failed"
                );
            },
            Err(e) => {
                error!(file = %layout.file, row = row.number, error = %e, "Image task panicked");
            },
        }
    }

    if uploaded.is_empty() {
        error!(file = %layout.file, row = row.number, title = %title, "All images failed");
        row.set(&layout.images, "");
        return RowOutcome::Failed(row.with_error(ALL_IMAGES_FAILED));
    }

    let joined: Vec<&str> = uploaded.iter().map(|(_, url)| url.as_str()).collect();
    row.set(&layout.images, joined.join(", "));

    if let Some(column) = &layout.description {
        let rewritten = rewrite_references(row.value(column), &uploaded);
        row.set(column, rewritten);
    }

    RowOutcome::Success(row)
}

/// Replace source image URLs in `text` with their uploaded counterparts
pub fn rewrite_references(text: &str, uploaded: &[(String, String)]) -> String {
    let mut pairs: Vec<&(String, String)> = uploaded.iter().collect();
    // A URL that is a prefix of another must not be replaced first
    pairs.sort_by_key(|(source, _)| std::cmp::Reverse(source.len()));

    let mut out = text.to_string();
    for (source, target) in pairs {
        if out.contains(source.as_str()) {
            out = out.replace(source.as_str(), target);
        }
    }
    out
}

/// `SKU-<row:04>-<base36 millis>-<4 random chars>`
pub fn random_sku(row: usize) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(4)
        .collect::<String>()
        .to_uppercase();
    format!("SKU-{:04}-{}-{}", row, to_base36(millis), suffix)
}

fn to_base36(mut n: u128) -> String {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
