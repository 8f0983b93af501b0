//! Image transform stage: fetch, normalize, tag, upload
//!
//! Every failure is reported as an [`ImageError`] for the one image task; the
//! owning row decides what that means.

use crate::config::MetadataConfig;
use crate::context::RunContext;
use crate::upload::{UploadError, Uploader};
use async_trait::async_trait;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

pub mod canvas;
pub mod fetch;
pub mod tagging;

pub use fetch::Fetcher;
pub use tagging::{ExifTool, ImageTags, TagError, Tagger};

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Invalid image URL: {0}")]
    InvalidUrl(String),

    #[error("Download failed: {url} -> {status}")]
    Download { url: String, status: u16 },

    #[error("Download failed: {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unsupported or corrupted format: {path}")]
    Decode { path: String },

    #[error("JPEG encoding failed: {0}")]
    Encode(String),

    #[error("Tagging failed: {0}")]
    Tag(#[from] TagError),

    #[error("Upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image task panicked: {0}")]
    Join(String),
}

/// One image of one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTask {
    pub url: String,
    /// 0-based position within the row's extracted URLs
    pub index: usize,
    /// Title-cased product title (or URL stem when the row has none)
    pub title: String,
    pub base_name: String,
    /// Owning row, for logs only
    pub row: usize,
}

impl ImageTask {
    pub fn new(url: &str, index: usize, product_title: &str, row: usize) -> Self {
        let source = if product_title.trim().is_empty() {
            url_stem(url).replace(['-', '_'], " ")
        } else {
            product_title.trim().to_string()
        };
        let title = capitalize_words(&source);
        let base_name = safe_name(&format!("{}_{}", title, index + 1));
        Self {
            url: url.to_string(),
            index,
            title,
            base_name,
            row,
        }
    }
}

/// Uppercase the first character of each word and lowercase the rest
pub fn capitalize_words(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            at_word_start = false;
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// Lowercase, with every run of non-alphanumerics collapsed to `_`
pub fn safe_name(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

fn url_stem(url: &str) -> String {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());
    let last = path.rsplit('/').next().unwrap_or_default();
    Path::new(last)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Turns an image task into an uploaded URL
#[async_trait]
pub trait ImageProcessor: Send + Sync {
    async fn process(&self, task: &ImageTask) -> Result<String, ImageError>;
}

/// The production image stage
pub struct ImageStage {
    ctx: Arc<RunContext>,
    fetcher: Fetcher,
    tagger: Arc<dyn Tagger>,
    uploader: Arc<dyn Uploader>,
    metadata: MetadataConfig,
}

impl ImageStage {
    pub fn new(
        ctx: Arc<RunContext>,
        fetcher: Fetcher,
        tagger: Arc<dyn Tagger>,
        uploader: Arc<dyn Uploader>,
        metadata: MetadataConfig,
    ) -> Self {
        Self {
            ctx,
            fetcher,
            tagger,
            uploader,
            metadata,
        }
    }

    async fn run(
        &self,
        task: &ImageTask,
        url: &Url,
        author: &str,
        scratch: &mut Vec<PathBuf>,
    ) -> Result<String, ImageError> {
        let raw = self.fetcher.fetch(url).await?;
        scratch.push(raw.clone());

        let processed = self
            .fetcher
            .work_dir()
            .join(format!("{}.jpg", Uuid::new_v4()));
        scratch.push(processed.clone());

        let out = processed.clone();
        let dims = tokio::task::spawn_blocking(move || canvas::normalize_file(&raw, &out))
            .await
            .map_err(|e| ImageError::Join(e.to_string()))??;
        debug!(row = task.row, image = task.index + 1, width = dims.0, height = dims.1, "Image normalized");

        let tags = ImageTags::new(&task.title, author, &self.metadata, Local::now());
        self.ctx
            .exclusive_tagging(self.tagger.write_tags(&processed, &tags))
            .await?;

        let object_name = format!("{}-{}.jpg", task.base_name, author);
        Ok(self.uploader.upload(&processed, &object_name).await?)
    }
}

#[async_trait]
impl ImageProcessor for ImageStage {
    async fn process(&self, task: &ImageTask) -> Result<String, ImageError> {
        let url = Url::parse(&task.url).map_err(|_| ImageError::InvalidUrl(task.url.clone()))?;
        let author = self.metadata.author_for(url.host_str().unwrap_or_default());

        let mut scratch = Vec::with_capacity(2);
        let result = self.run(task, &url, &author, &mut scratch).await;

        for path in scratch {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to remove work file");
                }
            }
        }
        result
    }
}
