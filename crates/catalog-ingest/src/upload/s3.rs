use super::{content_type_for, UploadError, Uploader};
use crate::config::S3Config;
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::ObjectCannedAcl,
    Client,
};
use std::path::Path;
use tracing::{debug, info, instrument};

/// S3-compatible object storage (AWS, DigitalOcean Spaces, MinIO)
#[derive(Clone)]
pub struct S3Uploader {
    client: Client,
    config: S3Config,
}

impl S3Uploader {
    pub fn new(config: S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "catalog-ingest",
        );

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!("S3 uploader initialized for bucket: {}", config.bucket);

        Self { client, config }
    }

    /// Object key for a file name under the configured folder
    pub fn object_key(&self, object_name: &str) -> String {
        if self.config.folder.is_empty() {
            object_name.to_string()
        } else {
            format!("{}/{}", self.config.folder, object_name)
        }
    }

    /// Public URL of an uploaded key
    pub fn object_url(&self, key: &str) -> String {
        match &self.config.endpoint {
            Some(endpoint) => format!(
                "{}/{}/{}",
                endpoint.trim_end_matches('/'),
                self.config.bucket,
                key
            ),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.config.bucket, self.config.region, key
            ),
        }
    }
}

#[async_trait]
impl Uploader for S3Uploader {
    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn upload(&self, artifact: &Path, object_name: &str) -> Result<String, UploadError> {
        let data = tokio::fs::read(artifact)
            .await
            .map_err(|source| UploadError::Read {
                path: artifact.to_path_buf(),
                source,
            })?;
        let key = self.object_key(object_name);

        debug!("Uploading {} bytes to s3://{}/{}", data.len(), self.config.bucket, key);

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .acl(ObjectCannedAcl::PublicRead)
            .content_type(content_type_for(object_name))
            .send()
            .await
            .map_err(|e| UploadError::S3 {
                key: key.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        debug!("Uploaded s3://{}/{}", self.config.bucket, key);

        Ok(self.object_url(&key))
    }

    fn destination(&self) -> String {
        format!("s3://{}/{}", self.config.bucket, self.config.folder)
    }
}
