//! Run-scoped category/tag ID cache
//!
//! Lookups go cache -> remote search -> remote create. The lock is never held
//! across a remote call, so two entries missing the same name at the same time
//! may both create it; the later insert wins in the cache.

use super::service::{CatalogService, ServiceError, TaxonomyKind};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct TaxonomyCache {
    ids: RwLock<HashMap<(TaxonomyKind, String), u64>>,
}

impl TaxonomyCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(kind: TaxonomyKind, name: &str) -> (TaxonomyKind, String) {
        (kind, name.trim().to_lowercase())
    }

    pub fn get(&self, kind: TaxonomyKind, name: &str) -> Option<u64> {
        self.ids
            .read()
            .ok()
            .and_then(|ids| ids.get(&Self::key(kind, name)).copied())
    }

    fn insert(&self, kind: TaxonomyKind, name: &str, id: u64) {
        if let Ok(mut ids) = self.ids.write() {
            ids.insert(Self::key(kind, name), id);
        }
    }

    pub fn len(&self) -> usize {
        self.ids.read().map(|ids| ids.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get or create the remote ID for a name
    pub async fn resolve(
        &self,
        service: &dyn CatalogService,
        kind: TaxonomyKind,
        name: &str,
    ) -> Result<u64, ServiceError> {
        if let Some(id) = self.get(kind, name) {
            return Ok(id);
        }

        if let Some(id) = service.find_taxonomy(kind, name).await? {
            self.insert(kind, name, id);
            return Ok(id);
        }

        let id = service.create_taxonomy(kind, name).await?;
        info!(kind = %kind, name = %name, id, "Created {}", kind);
        self.insert(kind, name, id);
        Ok(id)
    }

    /// Resolve every name, dropping (and logging) the ones that fail
    pub async fn resolve_all(
        &self,
        service: &dyn CatalogService,
        kind: TaxonomyKind,
        names: &[String],
    ) -> Vec<u64> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            match self.resolve(service, kind, name).await {
                Ok(id) => {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                },
                Err(e) => warn!(kind = %kind, name = %name, error = %e, "Could not resolve {}", kind),
            }
        }
        ids
    }
}
