//! Run-scoped shared state
//!
//! A [`RunContext`] is built once per run and handed to every worker by `Arc`.
//! It owns the tagging region and the taxonomy cache.

use crate::catalog::taxonomy::TaxonomyCache;
use std::future::Future;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug)]
pub struct RunContext {
    pub run_id: Uuid,
    tag_region: Mutex<()>,
    pub taxonomy: TaxonomyCache,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            tag_region: Mutex::new(()),
            taxonomy: TaxonomyCache::new(),
        }
    }

    /// Run `work` while holding the tagging region
    ///
    /// At most one tagging call is in flight across the whole run.
    pub async fn exclusive_tagging<F, T>(&self, work: F) -> T
    where
        F: Future<Output = T>,
    {
        let _guard = self.tag_region.lock().await;
        work.await
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
