//! FTP destination
//!
//! Every upload opens its own session in a blocking task. All operations use
//! Extended Passive Mode (EPSV).

use super::{UploadError, Uploader};
use crate::config::FtpConfig;
use async_trait::async_trait;
use std::fs::File;
use std::path::{Path, PathBuf};
use suppaftp::FtpStream;
use tracing::{debug, warn};

pub struct FtpUploader {
    config: FtpConfig,
}

impl FtpUploader {
    pub fn new(config: FtpConfig) -> Self {
        Self { config }
    }

    pub fn public_url(&self, name: &str) -> String {
        format!("{}/{}", self.config.public_base_url.trim_end_matches('/'), name)
    }

    fn upload_sync(config: &FtpConfig, artifact: &Path, name: &str) -> Result<(), UploadError> {
        let ftp_err = |message: String| UploadError::Ftp {
            name: name.to_string(),
            message,
        };

        let mut file = File::open(artifact).map_err(|source| UploadError::Read {
            path: artifact.to_path_buf(),
            source,
        })?;

        debug!("Connecting to FTP server: {}:{}", config.host, config.port);

        let mut ftp_stream = FtpStream::connect(format!("{}:{}", config.host, config.port))
            .map_err(|e| ftp_err(format!("connect: {}", e)))?;

        ftp_stream.set_mode(suppaftp::Mode::ExtendedPassive);

        ftp_stream
            .login(&config.username, &config.password)
            .map_err(|e| ftp_err(format!("login: {}", e)))?;

        ftp_stream
            .transfer_type(suppaftp::types::FileType::Binary)
            .map_err(|e| ftp_err(format!("binary mode: {}", e)))?;

        Self::enter_dir(&mut ftp_stream, &config.remote_dir)
            .map_err(|e| ftp_err(format!("remote dir {}: {}", config.remote_dir, e)))?;

        ftp_stream
            .put_file(name, &mut file)
            .map_err(|e| ftp_err(format!("store: {}", e)))?;

        if let Err(e) = ftp_stream.quit() {
            warn!("Failed to quit FTP session gracefully: {}", e);
        }

        Ok(())
    }

    /// Change into `dir`, creating missing segments on the way
    fn enter_dir(ftp_stream: &mut FtpStream, dir: &str) -> suppaftp::FtpResult<()> {
        if dir.starts_with('/') {
            ftp_stream.cwd("/")?;
        }
        for segment in dir.split('/').filter(|s| !s.is_empty()) {
            if ftp_stream.cwd(segment).is_err() {
                ftp_stream.mkdir(segment)?;
                ftp_stream.cwd(segment)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Uploader for FtpUploader {
    async fn upload(&self, artifact: &Path, object_name: &str) -> Result<String, UploadError> {
        let config = self.config.clone();
        let artifact: PathBuf = artifact.to_path_buf();
        let name = object_name.to_string();

        tokio::task::spawn_blocking(move || Self::upload_sync(&config, &artifact, &name))
            .await
            .map_err(|e| UploadError::Join(e.to_string()))??;

        debug!("Uploaded {} to ftp://{}{}", object_name, self.config.host, self.config.remote_dir);

        Ok(self.public_url(object_name))
    }

    fn destination(&self) -> String {
        format!("ftp://{}:{}{}", self.config.host, self.config.port, self.config.remote_dir)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn config() -> FtpConfig {
        FtpConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: "anonymous".to_string(),
            password: String::new(),
            remote_dir: "/media/products".to_string(),
            public_base_url: "https://cdn.shop.example/products/".to_string(),
        }
    }

    #[test]
    fn test_public_url() {
        let uploader = FtpUploader::new(config());
        assert_eq!(
            uploader.public_url("red_mug_1-shop.jpg"),
            "https://cdn.shop.example/products/red_mug_1-shop.jpg"
        );
    }

    #[tokio::test]
    async fn test_missing_artifact_is_read_error() {
        let uploader = FtpUploader::new(config());
        let err = uploader
            .upload(Path::new("/nonexistent/artifact.jpg"), "a.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Read { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_ftp_error() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("a.jpg");
        std::fs::write(&artifact, b"jpeg").unwrap();

        let uploader = FtpUploader::new(config());
        let err = uploader.upload(&artifact, "a.jpg").await.unwrap_err();
        assert!(matches!(err, UploadError::Ftp { .. }));
    }
}
