//! Remote catalog service seam

use super::entry::CatalogEntry;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// How the synchronizer should react to a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The SKU is being written concurrently or already exists; worth waiting
    Conflict,
    NotFound,
    /// Anything else; never retried
    Fatal,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Conflict,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Fatal,
            message: message.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == ErrorKind::Conflict
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaxonomyKind {
    Category,
    Tag,
}

impl TaxonomyKind {
    /// Path segment under `products/`
    pub fn path(self) -> &'static str {
        match self {
            TaxonomyKind::Category => "categories",
            TaxonomyKind::Tag => "tags",
        }
    }
}

impl fmt::Display for TaxonomyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaxonomyKind::Category => write!(f, "category"),
            TaxonomyKind::Tag => write!(f, "tag"),
        }
    }
}

/// A product as returned by the remote catalog
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteProduct {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sku: String,
}

#[async_trait]
pub trait CatalogService: Send + Sync {
    /// `Ok(None)` when no product has this SKU
    async fn find_by_sku(&self, sku: &str) -> Result<Option<RemoteProduct>, ServiceError>;

    async fn create(&self, entry: &CatalogEntry) -> Result<RemoteProduct, ServiceError>;

    /// Full replace of product `id`
    async fn update(&self, id: u64, entry: &CatalogEntry) -> Result<RemoteProduct, ServiceError>;

    async fn find_taxonomy(&self, kind: TaxonomyKind, name: &str) -> Result<Option<u64>, ServiceError>;

    async fn create_taxonomy(&self, kind: TaxonomyKind, name: &str) -> Result<u64, ServiceError>;
}
