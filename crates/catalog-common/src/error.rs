//! Error types shared across the catalog workspace

use thiserror::Error;

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Main error type for catalog ingestion
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{file} is missing required column(s): {missing}")]
    MissingColumns { file: String, missing: String },
}

impl CatalogError {
    pub fn missing_columns(file: impl Into<String>, missing: &[&str]) -> Self {
        Self::MissingColumns {
            file: file.into(),
            missing: missing.join(", "),
        }
    }
}
