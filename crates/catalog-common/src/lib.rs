//! Catalog Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging setup, and error handling for the catalog ingest workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CatalogError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by `LOG_*` variables
//! - **Rows**: [`row::ProductRow`] and case-insensitive column resolution
//!
//! # Example
//!
//! ```no_run
//! use catalog_common::row::ColumnMap;
//!
//! let headers = vec!["Title".to_string(), "Images".to_string()];
//! let columns = ColumnMap::new(&headers);
//! assert_eq!(columns.find("images"), Some("Images"));
//! ```

pub mod error;
pub mod logging;
pub mod row;

// Re-export commonly used types
pub use error::{CatalogError, Result};
