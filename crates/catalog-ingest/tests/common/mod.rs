//! Shared helpers for catalog-ingest integration tests
//!
//! Provides a configuration rooted in a temp directory, a real PNG body for
//! the mock image host, and in-memory [`Tagger`]/[`Uploader`] fakes so the
//! production [`ImageStage`] can run without exiftool or a remote bucket.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use catalog_ingest::config::*;
use catalog_ingest::context::RunContext;
use catalog_ingest::images::{Fetcher, ImageStage, ImageTags, TagError, Tagger};
use catalog_ingest::upload::{UploadError, Uploader};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CDN: &str = "https://cdn.test/products";

pub fn test_config(root: &Path) -> IngestConfig {
    IngestConfig {
        paths: PathsConfig {
            input_dir: root.join("inputs"),
            output_dir: root.join("outputs"),
            work_dir: root.join("work"),
            sync_dir: root.join("sync"),
        },
        concurrency: ConcurrencyConfig {
            products: 3,
            images: 2,
            sync: 1,
        },
        export: ExportConfig {
            batch_size: 1000,
            row_start: None,
            row_end: None,
            random_sku: false,
        },
        metadata: MetadataConfig {
            latitude: DEFAULT_LATITUDE,
            longitude: DEFAULT_LONGITUDE,
            days_ago: DEFAULT_DAYS_AGO,
            author: Some("shop.example".to_string()),
            exiftool_path: PathBuf::from(DEFAULT_EXIFTOOL_PATH),
        },
        fetch: FetchConfig {
            trusted_hosts: Vec::new(),
            timeout_secs: 5,
        },
        upload: UploadConfig::Ftp(FtpConfig {
            host: "ftp.test".to_string(),
            port: DEFAULT_FTP_PORT,
            username: "user".to_string(),
            password: "secret".to_string(),
            remote_dir: "products".to_string(),
            public_base_url: CDN.to_string(),
        }),
        catalog: CatalogConfig {
            base_url: None,
            consumer_key: None,
            consumer_secret: None,
            status: DEFAULT_CATALOG_STATUS.to_string(),
            timeout_secs: 5,
            backoff_secs: DEFAULT_BACKOFF_SECS.to_vec(),
        },
    }
}

/// A small opaque PNG
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 30, 30]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// Records tag writes and the most tag writes ever in flight at once
#[derive(Default)]
pub struct RecordingTagger {
    pub written: Mutex<Vec<(PathBuf, String)>>,
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
    pub shutdowns: AtomicUsize,
}

#[async_trait]
impl Tagger for RecordingTagger {
    async fn write_tags(&self, path: &Path, tags: &ImageTags) -> Result<(), TagError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(path.exists(), "tagged file must exist");
        self.written
            .lock()
            .unwrap()
            .push((path.to_path_buf(), tags.title.clone()));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), TagError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Accepts every artifact and serves it from [`CDN`]
#[derive(Default)]
pub struct MemoryUploader {
    pub names: Mutex<Vec<String>>,
}

impl MemoryUploader {
    pub fn names(&self) -> Vec<String> {
        let mut names = self.names.lock().unwrap().clone();
        names.sort();
        names
    }
}

#[async_trait]
impl Uploader for MemoryUploader {
    async fn upload(&self, artifact: &Path, object_name: &str) -> Result<String, UploadError> {
        let bytes = tokio::fs::read(artifact).await.map_err(|source| UploadError::Read {
            path: artifact.to_path_buf(),
            source,
        })?;
        // Uploaded artifacts are always the normalized JPEG
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        self.names.lock().unwrap().push(object_name.to_string());
        Ok(format!("{}/{}", CDN, object_name))
    }

    fn destination(&self) -> String {
        "memory".to_string()
    }
}

pub struct Harness {
    pub stage: Arc<ImageStage>,
    pub tagger: Arc<RecordingTagger>,
    pub uploader: Arc<MemoryUploader>,
}

pub fn harness(config: &IngestConfig) -> Harness {
    std::fs::create_dir_all(&config.paths.work_dir).unwrap();
    let tagger = Arc::new(RecordingTagger::default());
    let uploader = Arc::new(MemoryUploader::default());
    let fetcher = Fetcher::new(config.fetch.clone(), config.paths.work_dir.clone()).unwrap();
    let stage = ImageStage::new(
        Arc::new(RunContext::new()),
        fetcher,
        tagger.clone(),
        uploader.clone(),
        config.metadata.clone(),
    );
    Harness {
        stage: Arc::new(stage),
        tagger,
        uploader,
    }
}

/// Read an exported CSV into (header, rows)
pub fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    (header, rows)
}

/// Sorted file names in a directory
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
