//! Catalog synchronization
//!
//! Rows become [`entry::CatalogEntry`] values, which [`sync::Synchronizer`]
//! upserts through a [`service::CatalogService`].

pub mod entry;
pub mod service;
pub mod sync;
pub mod taxonomy;
pub mod woocommerce;

pub use entry::CatalogEntry;
pub use service::{CatalogService, ErrorKind, RemoteProduct, ServiceError, TaxonomyKind};
pub use sync::{SyncOutcome, SyncReport, Synchronizer};
pub use taxonomy::TaxonomyCache;
pub use woocommerce::WooCommerceClient;
