//! WooCommerce REST client (`/wp-json/wc/v3`)

use super::entry::CatalogEntry;
use super::service::{CatalogService, ErrorKind, RemoteProduct, ServiceError, TaxonomyKind};
use crate::config::CatalogConfig;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const API_PREFIX: &str = "wp-json/wc/v3";

/// Error body returned by the WordPress REST API
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Term {
    id: u64,
    #[serde(default)]
    name: String,
}

pub struct WooCommerceClient {
    client: Client,
    base_url: String,
    consumer_key: String,
    consumer_secret: String,
}

impl WooCommerceClient {
    pub fn new(
        base_url: impl Into<String>,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
        })
    }

    pub fn from_config(config: &CatalogConfig) -> anyhow::Result<Self> {
        let (url, key, secret) = config.credentials()?;
        Ok(Self::new(url, key, secret, Duration::from_secs(config.timeout_secs))?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_PREFIX, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ServiceError> {
        let response = request
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .send()
            .await
            .map_err(|e| ServiceError::fatal(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ServiceError::fatal(format!("Invalid response body: {}", e)));
        }

        let text = response.text().await.unwrap_or_default();
        let body: ApiErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let message = if body.message.is_empty() {
            format!("HTTP {}: {}", status, text.trim())
        } else {
            body.message.clone()
        };

        debug!(status = %status, code = %body.code, message = %message, "Catalog request failed");

        Err(ServiceError {
            kind: classify(status, &body.code, &message),
            message,
        })
    }
}

/// Map a failed response onto an [`ErrorKind`]
///
/// WooCommerce reports SKU races as 400s whose message says the SKU is "under
/// processing", "already exists" or "duplicated".
pub fn classify(status: StatusCode, code: &str, message: &str) -> ErrorKind {
    let message = message.to_lowercase();
    let code = code.to_lowercase();
    let conflict = message.contains("under processing")
        || message.contains("already exists")
        || message.contains("duplicate")
        || code.contains("invalid_sku")
        || code.contains("duplicate");

    if conflict {
        ErrorKind::Conflict
    } else if status == StatusCode::NOT_FOUND {
        ErrorKind::NotFound
    } else {
        ErrorKind::Fatal
    }
}

#[async_trait]
impl CatalogService for WooCommerceClient {
    async fn find_by_sku(&self, sku: &str) -> Result<Option<RemoteProduct>, ServiceError> {
        if sku.trim().is_empty() {
            return Ok(None);
        }
        let request = self.client.get(self.url("products")).query(&[("sku", sku)]);
        let products: Vec<RemoteProduct> = self.send(request).await?;
        Ok(products.into_iter().next())
    }

    async fn create(&self, entry: &CatalogEntry) -> Result<RemoteProduct, ServiceError> {
        let request = self.client.post(self.url("products")).json(entry);
        self.send(request).await
    }

    async fn update(&self, id: u64, entry: &CatalogEntry) -> Result<RemoteProduct, ServiceError> {
        let request = self
            .client
            .put(self.url(&format!("products/{}", id)))
            .json(entry);
        self.send(request).await
    }

    async fn find_taxonomy(&self, kind: TaxonomyKind, name: &str) -> Result<Option<u64>, ServiceError> {
        let request = self
            .client
            .get(self.url(&format!("products/{}", kind.path())))
            .query(&[("search", name)]);
        let terms: Vec<Term> = self.send(request).await?;

        // Search is fuzzy; prefer an exact name match
        let exact = terms
            .iter()
            .find(|t| t.name.trim().eq_ignore_ascii_case(name.trim()))
            .map(|t| t.id);
        Ok(exact.or_else(|| terms.first().map(|t| t.id)))
    }

    async fn create_taxonomy(&self, kind: TaxonomyKind, name: &str) -> Result<u64, ServiceError> {
        let request = self
            .client
            .post(self.url(&format!("products/{}", kind.path())))
            .json(&serde_json::json!({ "name": name }));
        let term: Term = self.send(request).await?;
        Ok(term.id)
    }
}
