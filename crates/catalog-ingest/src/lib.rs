//! Catalog Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Concurrent product-image pipeline and catalog synchronizer.
//!
//! # Components
//!
//! - **Pipeline** ([`pipeline`]): reads catalog CSV files, schedules rows and their
//!   images over two bounded pools and exports results in range-labeled windows
//! - **Images** ([`images`]): fetch, normalize to an 800x800 canvas, EXIF tagging
//! - **Upload** ([`upload`]): S3-compatible object storage or FTP
//! - **Catalog** ([`catalog`]): WooCommerce-style product upsert with conflict retry
//!
//! # Example
//!
//! ```no_run
//! use catalog_ingest::{config::IngestConfig, pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let summaries = pipeline::run_process(&config).await?;
//!     println!("{} file(s) processed", summaries.len());
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod context;
pub mod export;
pub mod extract;
pub mod images;
pub mod pipeline;
pub mod scheduler;
pub mod table;
pub mod upload;
