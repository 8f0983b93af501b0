use super::ImageError;
use crate::config::FetchConfig;
use reqwest::header::{REFERER, USER_AGENT};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// Desktop browser user agent sent to untrusted hosts
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";

/// Downloads source images into the shared work directory
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    work_dir: PathBuf,
}

impl Fetcher {
    pub fn new(config: FetchConfig, work_dir: impl Into<PathBuf>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            work_dir: work_dir.into(),
        })
    }

    /// Download `url` to a uniquely named file and return its path
    pub async fn fetch(&self, url: &Url) -> Result<PathBuf, ImageError> {
        let host = url.host_str().unwrap_or_default();
        let mut request = self.client.get(url.clone());
        if !self.config.is_trusted(host) {
            request = request
                .header(USER_AGENT, BROWSER_USER_AGENT)
                .header(REFERER, url.as_str());
        }

        debug!(url = %url, "Downloading image");

        let download_err = |source: reqwest::Error| ImageError::Request {
            url: url.to_string(),
            source,
        };

        let response = request.send().await.map_err(download_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Download {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(download_err)?;

        let path = self
            .work_dir
            .join(format!("{}.{}", Uuid::new_v4(), raw_extension(url)));
        tokio::fs::write(&path, &bytes).await?;

        debug!(url = %url, path = %path.display(), bytes = bytes.len(), "Image downloaded");
        Ok(path)
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

/// Extension of the URL path, `jpg` when there is none
fn raw_extension(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|last| Path::new(last).extension())
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "jpg".to_string())
}
