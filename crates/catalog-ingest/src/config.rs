//! Configuration management
//!
//! Everything is read from the environment (after loading `.env`) with the
//! defaults below. CLI flags may override individual values afterwards.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_INPUT_DIR: &str = "./inputs";
pub const DEFAULT_OUTPUT_DIR: &str = "./outputs";
pub const DEFAULT_WORK_DIR: &str = "./tmp_imgs";
pub const DEFAULT_SYNC_DIR: &str = "./products_to_be_created";

pub const DEFAULT_PRODUCT_CONCURRENCY: usize = 8;
pub const DEFAULT_IMAGE_CONCURRENCY: usize = 8;
/// The catalog serializes writes per SKU on its side, so one at a time by default
pub const DEFAULT_SYNC_CONCURRENCY: usize = 1;
pub const DEFAULT_EXPORT_BATCH_SIZE: usize = 1000;

pub const DEFAULT_LATITUDE: f64 = 32.7688;
pub const DEFAULT_LONGITUDE: f64 = -97.3093;
pub const DEFAULT_DAYS_AGO: i64 = 7;
/// About a century; larger offsets overflow date arithmetic
pub const MAX_DAYS_AGO: i64 = 36_500;
/// Placeholder author; when left as-is the image host is used instead
pub const DEFAULT_AUTHOR: &str = "unknown-source.com";
pub const DEFAULT_EXIFTOOL_PATH: &str = "exiftool";

pub const DEFAULT_TRUSTED_HOSTS: &[&str] = &["digitaloceanspaces.com", "amazonaws.com"];
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_S3_REGION: &str = "us-east-1";
pub const DEFAULT_FTP_PORT: u16 = 21;

pub const DEFAULT_CATALOG_STATUS: &str = "publish";
pub const DEFAULT_CATALOG_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_BACKOFF_SECS: &[u64] = &[2, 4, 6, 10];

/// Full configuration for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub paths: PathsConfig,
    pub concurrency: ConcurrencyConfig,
    pub export: ExportConfig,
    pub metadata: MetadataConfig,
    pub fetch: FetchConfig,
    pub upload: UploadConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Shared scratch directory for downloaded and re-encoded images
    pub work_dir: PathBuf,
    pub sync_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Rows processed at once
    pub products: usize,
    /// Image tasks processed at once, across all rows
    pub images: usize,
    /// Catalog entries synchronized at once
    pub sync: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Rows per output window
    pub batch_size: usize,
    /// First source row to process (1-based, inclusive)
    pub row_start: Option<usize>,
    /// Last source row to process (1-based, inclusive)
    pub row_end: Option<usize>,
    pub random_sku: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub days_ago: i64,
    /// `None` when META_AUTHOR is unset
    pub author: Option<String>,
    pub exiftool_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Hosts (suffix match) that get no browser-like headers
    pub trusted_hosts: Vec<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum UploadConfig {
    S3(S3Config),
    Ftp(FtpConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    /// Key prefix, without trailing slash
    pub folder: String,
    pub path_style: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub remote_dir: String,
    /// Public URL prefix under which `remote_dir` is served
    pub public_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub base_url: Option<String>,
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    /// Publish status for created/updated products
    pub status: String,
    pub timeout_secs: u64,
    /// Waits between existence checks after a create conflict
    pub backoff_secs: Vec<u64>,
}

impl IngestConfig {
    /// Load configuration from `.env` and the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let author = env::var("META_AUTHOR").ok().filter(|a| !a.trim().is_empty());

        let config = Self {
            paths: PathsConfig {
                input_dir: env_path("INPUT_DIR", DEFAULT_INPUT_DIR),
                output_dir: env_path("OUTPUT_DIR", DEFAULT_OUTPUT_DIR),
                work_dir: env_path("WORK_DIR", DEFAULT_WORK_DIR),
                sync_dir: env_path("SYNC_DIR", DEFAULT_SYNC_DIR),
            },
            concurrency: ConcurrencyConfig {
                products: env_parse("CONCURRENCY_PRODUCTS")
                    .or_else(|| env_parse("CONCURRENCY"))
                    .unwrap_or(DEFAULT_PRODUCT_CONCURRENCY),
                images: env_parse("CONCURRENCY_IMAGES")
                    .or_else(|| env_parse("CONCURRENCY"))
                    .unwrap_or(DEFAULT_IMAGE_CONCURRENCY),
                sync: env_parse("CONCURRENCY_SYNC").unwrap_or(DEFAULT_SYNC_CONCURRENCY),
            },
            export: ExportConfig {
                batch_size: env_parse("EXPORT_BATCH_SIZE").unwrap_or(DEFAULT_EXPORT_BATCH_SIZE),
                row_start: env_parse("ROW_START"),
                row_end: env_parse("ROW_END"),
                random_sku: env_flag("RANDOM_SKU_ENABLED"),
            },
            metadata: MetadataConfig {
                latitude: env_parse("META_LAT").unwrap_or(DEFAULT_LATITUDE),
                longitude: env_parse("META_LNG").unwrap_or(DEFAULT_LONGITUDE),
                days_ago: env_parse("META_DAYS_AGO").unwrap_or(DEFAULT_DAYS_AGO),
                author: author.clone(),
                exiftool_path: env_path("EXIFTOOL_PATH", DEFAULT_EXIFTOOL_PATH),
            },
            fetch: FetchConfig {
                trusted_hosts: env::var("TRUSTED_IMAGE_HOSTS")
                    .map(|v| split_list(&v))
                    .unwrap_or_else(|_| DEFAULT_TRUSTED_HOSTS.iter().map(|h| h.to_string()).collect()),
                timeout_secs: env_parse("FETCH_TIMEOUT_SECS").unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
            },
            upload: UploadConfig::from_env()?,
            catalog: CatalogConfig {
                base_url: env::var("WOOCOMMERCE_URL")
                    .ok()
                    .or_else(|| author.as_ref().map(|a| format!("https://{}", a))),
                consumer_key: env::var("WOOCOMMERCE_KEY").ok(),
                consumer_secret: env::var("WOOCOMMERCE_SECRET").ok(),
                status: env::var("WOOCOMMERCE_STATUS")
                    .map(|s| s.to_lowercase())
                    .unwrap_or_else(|_| DEFAULT_CATALOG_STATUS.to_string()),
                timeout_secs: env_parse("WOOCOMMERCE_TIMEOUT_SECS")
                    .unwrap_or(DEFAULT_CATALOG_TIMEOUT_SECS),
                backoff_secs: match env::var("SYNC_BACKOFF_SECS") {
                    Ok(raw) => parse_backoff(&raw)?,
                    Err(_) => DEFAULT_BACKOFF_SECS.to_vec(),
                },
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.concurrency.products == 0 {
            anyhow::bail!("CONCURRENCY_PRODUCTS must be greater than 0");
        }
        if self.concurrency.images == 0 {
            anyhow::bail!("CONCURRENCY_IMAGES must be greater than 0");
        }
        if self.concurrency.sync == 0 {
            anyhow::bail!("CONCURRENCY_SYNC must be greater than 0");
        }
        if self.export.batch_size == 0 {
            anyhow::bail!("EXPORT_BATCH_SIZE must be greater than 0");
        }
        if self.export.row_start == Some(0) {
            anyhow::bail!("ROW_START is 1-based and must be greater than 0");
        }
        if let (Some(start), Some(end)) = (self.export.row_start, self.export.row_end) {
            if start > end {
                anyhow::bail!("ROW_START ({}) cannot be greater than ROW_END ({})", start, end);
            }
        }
        if !(0..=MAX_DAYS_AGO).contains(&self.metadata.days_ago) {
            anyhow::bail!("META_DAYS_AGO must be within 0..={}", MAX_DAYS_AGO);
        }
        if !(-90.0..=90.0).contains(&self.metadata.latitude) {
            anyhow::bail!("META_LAT must be within -90..=90");
        }
        if !(-180.0..=180.0).contains(&self.metadata.longitude) {
            anyhow::bail!("META_LNG must be within -180..=180");
        }
        Ok(())
    }
}

impl MetadataConfig {
    /// Author written into tags and object names for an image from `host`
    pub fn author_for(&self, host: &str) -> String {
        match self.author.as_deref() {
            Some(author) if author != DEFAULT_AUTHOR => author.to_string(),
            _ => host.to_string(),
        }
    }

    /// Short tag used in exported file names
    pub fn author_tag(&self) -> String {
        match self.author.as_deref() {
            Some(author) => author.chars().take(3).collect(),
            None => "unk".to_string(),
        }
    }
}

impl FetchConfig {
    pub fn is_trusted(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        self.trusted_hosts
            .iter()
            .any(|trusted| host == *trusted || host.ends_with(&format!(".{}", trusted)))
    }
}

impl UploadConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let mode = env::var("UPLOAD_MODE").unwrap_or_else(|_| "s3".to_string());
        match mode.to_lowercase().as_str() {
            "s3" | "spaces" => Ok(UploadConfig::S3(S3Config::from_env())),
            "ftp" => Ok(UploadConfig::Ftp(FtpConfig::from_env())),
            other => anyhow::bail!("Unknown UPLOAD_MODE '{}', expected 's3' or 'ftp'", other),
        }
    }

    /// Check the credentials the selected destination needs
    pub fn validate(&self) -> anyhow::Result<()> {
        match self {
            UploadConfig::S3(s3) => {
                if s3.bucket.is_empty() {
                    anyhow::bail!("S3_BUCKET is required for s3 uploads");
                }
                if s3.access_key.is_empty() || s3.secret_key.is_empty() {
                    anyhow::bail!("S3_ACCESS_KEY and S3_SECRET_KEY are required for s3 uploads");
                }
            },
            UploadConfig::Ftp(ftp) => {
                if ftp.host.is_empty() {
                    anyhow::bail!("FTP_HOST is required for ftp uploads");
                }
                if ftp.public_base_url.is_empty() {
                    anyhow::bail!("FTP_PUBLIC_BASE_URL is required for ftp uploads");
                }
            },
        }
        Ok(())
    }
}

impl S3Config {
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var("S3_ENDPOINT").ok().filter(|e| !e.is_empty()),
            region: env::var("S3_REGION").unwrap_or_else(|_| DEFAULT_S3_REGION.to_string()),
            bucket: env::var("S3_BUCKET").unwrap_or_default(),
            access_key: env::var("S3_ACCESS_KEY")
                .or_else(|_| env::var("AWS_ACCESS_KEY_ID"))
                .unwrap_or_default(),
            secret_key: env::var("S3_SECRET_KEY")
                .or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"))
                .unwrap_or_default(),
            folder: env::var("S3_FOLDER")
                .map(|f| f.trim_matches('/').to_string())
                .unwrap_or_default(),
            // Spaces and MinIO serve objects under /<bucket>/<key>
            path_style: env_parse("S3_PATH_STYLE").unwrap_or(true),
        }
    }
}

impl FtpConfig {
    pub fn from_env() -> Self {
        Self {
            host: env::var("FTP_HOST").unwrap_or_default(),
            port: env_parse("FTP_PORT").unwrap_or(DEFAULT_FTP_PORT),
            username: env::var("FTP_USER").unwrap_or_else(|_| "anonymous".to_string()),
            password: env::var("FTP_PASSWORD").unwrap_or_default(),
            remote_dir: env::var("FTP_REMOTE_DIR").unwrap_or_else(|_| "/".to_string()),
            public_base_url: env::var("FTP_PUBLIC_BASE_URL").unwrap_or_default(),
        }
    }
}

impl CatalogConfig {
    /// Credentials needed by `sync`; missing ones are a hard error there only
    pub fn credentials(&self) -> anyhow::Result<(&str, &str, &str)> {
        match (
            self.base_url.as_deref(),
            self.consumer_key.as_deref(),
            self.consumer_secret.as_deref(),
        ) {
            (Some(url), Some(key), Some(secret)) => Ok((url, key, secret)),
            _ => anyhow::bail!(
                "Missing catalog credentials: set WOOCOMMERCE_URL, WOOCOMMERCE_KEY and WOOCOMMERCE_SECRET"
            ),
        }
    }

    pub fn backoff_schedule(&self) -> Vec<Duration> {
        self.backoff_secs.iter().map(|s| Duration::from_secs(*s)).collect()
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    PathBuf::from(env::var(key).unwrap_or_else(|_| default.to_string()))
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_backoff(raw: &str) -> anyhow::Result<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map_err(|_| anyhow::anyhow!("SYNC_BACKOFF_SECS entry '{}' is not a whole number", s))
        })
        .collect()
}
