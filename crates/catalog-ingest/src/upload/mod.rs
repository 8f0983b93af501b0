//! Upload destinations for processed images
//!
//! The pipeline only sees the [`Uploader`] trait. Which destination is used is
//! decided once, from configuration, in [`build_uploader`].

use crate::config::UploadConfig;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub mod ftp;
pub mod s3;

pub use ftp::FtpUploader;
pub use s3::S3Uploader;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Failed to read artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("S3 upload of {key} failed: {message}")]
    S3 { key: String, message: String },

    #[error("FTP upload of {name} failed: {message}")]
    Ftp { name: String, message: String },

    #[error("Upload task panicked: {0}")]
    Join(String),
}

/// A destination that stores a local artifact and returns its public URL
///
/// Implementations do not retry.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, artifact: &Path, object_name: &str) -> Result<String, UploadError>;

    /// Short label for logs
    fn destination(&self) -> String;
}

/// Build the uploader selected by configuration
pub async fn build_uploader(config: &UploadConfig) -> anyhow::Result<Arc<dyn Uploader>> {
    config.validate()?;
    let uploader: Arc<dyn Uploader> = match config {
        UploadConfig::S3(s3) => Arc::new(S3Uploader::new(s3.clone())),
        UploadConfig::Ftp(ftp) => Arc::new(FtpUploader::new(ftp.clone())),
    };
    tracing::info!(destination = %uploader.destination(), "Uploader ready");
    Ok(uploader)
}

/// MIME type by file extension
pub fn content_type_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
