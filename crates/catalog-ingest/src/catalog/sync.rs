//! Conflict-retry upsert of catalog entries
//!
//! ```text
//! CheckExisting --found--> Update --> done
//!       | not found
//!       v
//!    Create --ok--> done
//!       | conflict             (other errors fail the entry)
//!       v
//!  ConflictWait --sleep next backoff--> RetryCheck --found--> Update
//!       ^                                  | not found
//!       +----------------------------------+
//!  (schedule spent: one final check, then fail)
//! ```
//!
//! A conflict reported by an update made while retrying sends the entry back
//! to waiting. A failed entry never affects the others.

use super::entry::{CatalogEntry, IdRef};
use super::service::{CatalogService, RemoteProduct, ServiceError, TaxonomyKind};
use crate::context::RunContext;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Created(RemoteProduct),
    Updated {
        product: RemoteProduct,
        /// Backoff waits spent before the update went through
        waits: usize,
    },
    Failed {
        reason: String,
        waits: usize,
    },
}

impl SyncOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, SyncOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

impl SyncReport {
    fn record(&mut self, outcome: &SyncOutcome) {
        match outcome {
            SyncOutcome::Created(_) => self.created += 1,
            SyncOutcome::Updated { .. } => self.updated += 1,
            SyncOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.updated + self.failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    CheckExisting,
    Create,
    /// `retrying` once a create conflict happened; `last_chance` after the schedule is spent
    Update {
        id: u64,
        retrying: bool,
        last_chance: bool,
    },
    ConflictWait,
    RetryCheck {
        last_chance: bool,
    },
}

#[derive(Clone)]
pub struct Synchronizer {
    service: Arc<dyn CatalogService>,
    ctx: Arc<RunContext>,
    backoff: Vec<Duration>,
    concurrency: usize,
}

impl Synchronizer {
    pub fn new(
        service: Arc<dyn CatalogService>,
        ctx: Arc<RunContext>,
        backoff: Vec<Duration>,
        concurrency: usize,
    ) -> Self {
        Self {
            service,
            ctx,
            backoff,
            concurrency: concurrency.max(1),
        }
    }

    /// Resolve taxonomy names, then upsert
    pub async fn sync_entry(&self, mut entry: CatalogEntry) -> SyncOutcome {
        let service = self.service.as_ref();
        let taxonomy = &self.ctx.taxonomy;

        entry.categories = taxonomy
            .resolve_all(service, TaxonomyKind::Category, &entry.category_names)
            .await
            .into_iter()
            .map(|id| IdRef { id })
            .collect();
        entry.tags = taxonomy
            .resolve_all(service, TaxonomyKind::Tag, &entry.tag_names)
            .await
            .into_iter()
            .map(|id| IdRef { id })
            .collect();

        let outcome = self.upsert(&entry).await;
        match &outcome {
            SyncOutcome::Created(product) => {
                info!(row = entry.row, sku = %entry.sku, id = product.id, "Created: {}", entry.name)
            },
            SyncOutcome::Updated { product, waits } => {
                info!(row = entry.row, sku = %entry.sku, id = product.id, waits, "Updated: {}", entry.name)
            },
            SyncOutcome::Failed { reason, waits } => {
                warn!(row = entry.row, sku = %entry.sku, waits, reason = %reason, "Failed for {}", entry.name)
            },
        }
        outcome
    }

    /// Sync entries under the bounded pool, in completion order
    pub async fn sync_all(&self, entries: Vec<CatalogEntry>) -> SyncReport {
        let mut report = SyncReport::default();
        let mut outcomes = stream::iter(entries)
            .map(|entry| self.sync_entry(entry))
            .buffer_unordered(self.concurrency);

        while let Some(outcome) = outcomes.next().await {
            report.record(&outcome);
        }
        report
    }

    /// Drive one entry through the conflict-retry state machine
    pub async fn upsert(&self, entry: &CatalogEntry) -> SyncOutcome {
        let sku = entry.sku.as_str();
        let mut schedule = self.backoff.iter();
        let mut waits = 0;
        let mut state = State::CheckExisting;

        let failed = |reason: String, waits: usize| SyncOutcome::Failed { reason, waits };

        loop {
            state = match state {
                State::CheckExisting => match self.service.find_by_sku(sku).await {
                    Ok(Some(existing)) => State::Update {
                        id: existing.id,
                        retrying: false,
                        last_chance: false,
                    },
                    Ok(None) => State::Create,
                    Err(e) => return failed(check_error(sku, &e), waits),
                },

                State::Create => match self.service.create(entry).await {
                    Ok(product) => return SyncOutcome::Created(product),
                    Err(e) if e.is_conflict() => {
                        warn!(sku = %sku, error = %e, "SKU conflict on create, will retry as update");
                        State::ConflictWait
                    },
                    Err(e) => return failed(e.message, waits),
                },

                State::ConflictWait => match schedule.next() {
                    Some(delay) => {
                        tokio::time::sleep(*delay).await;
                        waits += 1;
                        State::RetryCheck { last_chance: false }
                    },
                    None => State::RetryCheck { last_chance: true },
                },

                State::RetryCheck { last_chance } => match self.service.find_by_sku(sku).await {
                    Ok(Some(existing)) => State::Update {
                        id: existing.id,
                        retrying: true,
                        last_chance,
                    },
                    Ok(None) if last_chance => {
                        return failed(format!("SKU {} is still under processing after retries", sku), waits)
                    },
                    Ok(None) => State::ConflictWait,
                    Err(e) => return failed(check_error(sku, &e), waits),
                },

                State::Update {
                    id,
                    retrying,
                    last_chance,
                } => match self.service.update(id, entry).await {
                    Ok(product) => return SyncOutcome::Updated { product, waits },
                    Err(e) if retrying && !last_chance && e.is_conflict() => State::ConflictWait,
                    Err(e) => return failed(e.message, waits),
                },
            };
        }
    }
}

fn check_error(sku: &str, e: &ServiceError) -> String {
    format!("Existence check for SKU {} failed: {}", sku, e)
}
