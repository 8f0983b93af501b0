//! Product rows read from catalog CSV files
//!
//! A [`ProductRow`] keeps the source column order so that exported files keep
//! the same layout as the input. Column names are resolved case-insensitively
//! through [`ColumnMap`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Name of the column appended to failed rows
pub const ERROR_COLUMN: &str = "__error";

/// One product row with its absolute source row number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRow {
    /// 1-based source row number (header excluded), offset by the start line
    pub number: usize,
    fields: Vec<(String, String)>,
}

impl ProductRow {
    pub fn new(number: usize, fields: Vec<(String, String)>) -> Self {
        Self { number, fields }
    }

    /// Build a row by pairing headers with a record's values
    ///
    /// Missing trailing values become empty strings.
    pub fn from_record<'a>(
        number: usize,
        headers: &[String],
        values: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut values = values.into_iter();
        let fields = headers
            .iter()
            .map(|h| (h.clone(), values.next().unwrap_or_default().to_string()))
            .collect();
        Self { number, fields }
    }

    /// Exact-name lookup
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Lookup that treats a missing column as empty
    pub fn value(&self, column: &str) -> &str {
        self.get(column).unwrap_or_default()
    }

    /// Case-insensitive lookup, trimming both the key and the column names
    pub fn get_ci(&self, column: &str) -> Option<&str> {
        let wanted = column.trim().to_lowercase();
        self.fields
            .iter()
            .find(|(name, _)| name.trim().to_lowercase() == wanted)
            .map(|(_, value)| value.as_str())
    }

    /// Replace a value, appending the column when it is not present yet
    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column.to_string(), value)),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Copy of this row with the failure reason attached
    pub fn with_error(&self, reason: &str) -> Self {
        let mut row = self.clone();
        row.set(ERROR_COLUMN, reason);
        row
    }
}

/// Case-insensitive header index: lowercased, trimmed name -> original name
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    by_key: HashMap<String, String>,
}

impl ColumnMap {
    pub fn new(headers: &[String]) -> Self {
        let by_key = headers
            .iter()
            .map(|h| (h.trim().to_lowercase(), h.clone()))
            .collect();
        Self { by_key }
    }

    /// Original header for a case-insensitive name
    pub fn find(&self, name: &str) -> Option<&str> {
        self.by_key
            .get(&name.trim().to_lowercase())
            .map(String::as_str)
    }

    /// First of several candidate names that exists
    pub fn find_any(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|n| self.find(n))
    }
}
