//! Catalog CSV reading and writing
//!
//! Input files are header-driven; columns are matched case-insensitively.
//! Output files use the union of all row columns in first-seen order.

use catalog_common::row::{ColumnMap, ProductRow};
use catalog_common::{CatalogError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Inclusive, 1-based sub-range of data rows to read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowRange {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl RowRange {
    pub fn contains(&self, number: usize) -> bool {
        self.start.is_none_or(|s| number >= s) && self.end.is_none_or(|e| number <= e)
    }
}

/// Resolved names of the columns the pipeline works with
#[derive(Debug, Clone)]
pub struct CatalogColumns {
    pub images: String,
    pub title: String,
    pub description: Option<String>,
    pub sku: Option<String>,
}

/// A parsed catalog file
#[derive(Debug, Clone)]
pub struct CatalogFile {
    pub path: PathBuf,
    /// File name including extension, used in logs
    pub name: String,
    /// File name without extension, used for output names
    pub stem: String,
    pub headers: Vec<String>,
    pub columns: ColumnMap,
    pub rows: Vec<ProductRow>,
}

impl CatalogFile {
    /// Resolve the image/title columns, failing when either is absent
    pub fn require_columns(&self) -> Result<CatalogColumns> {
        let images = self.columns.find("images");
        let title = self.columns.find_any(&["title", "name"]);

        match (images, title) {
            (Some(images), Some(title)) => Ok(CatalogColumns {
                images: images.to_string(),
                title: title.to_string(),
                description: self.columns.find("description").map(str::to_string),
                sku: self.columns.find("sku").map(str::to_string),
            }),
            (images, title) => {
                let mut missing = Vec::new();
                if images.is_none() {
                    missing.push("Images");
                }
                if title.is_none() {
                    missing.push("Title/Name");
                }
                Err(CatalogError::missing_columns(&self.name, &missing))
            },
        }
    }
}

/// Read a catalog file, keeping only rows inside `range`
///
/// Row numbers are absolute: the first data row is 1 regardless of the range.
pub fn read_catalog(path: &Path, range: RowRange) -> Result<CatalogFile> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.clone());

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(File::open(path)?);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let columns = ColumnMap::new(&headers);

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let number = index + 1;
        if range.end.is_some_and(|end| number > end) {
            break;
        }
        let record = record?;
        if !range.contains(number) {
            continue;
        }
        if record.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        rows.push(ProductRow::from_record(number, &headers, record.iter()));
    }

    debug!(file = %name, rows = rows.len(), "Catalog file read");

    Ok(CatalogFile {
        path: path.to_path_buf(),
        name,
        stem,
        headers,
        columns,
        rows,
    })
}

/// Union of row columns in first-seen order
pub fn header_union<'a>(rows: impl IntoIterator<Item = &'a ProductRow>) -> Vec<String> {
    let mut header: Vec<String> = Vec::new();
    for row in rows {
        for column in row.columns() {
            if !header.iter().any(|h| h == column) {
                header.push(column.to_string());
            }
        }
    }
    header
}

/// Write rows to `path`, overwriting it
pub fn write_rows(path: &Path, rows: &[ProductRow]) -> Result<()> {
    let header = header_union(rows);
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&header)?;
    for row in rows {
        writer.write_record(header.iter().map(|h| row.value(h)))?;
    }
    writer.flush()?;
    Ok(())
}

/// List `*.csv` files in a directory, sorted by name
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use catalog_common::row::ERROR_COLUMN;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_with_range_keeps_absolute_numbers() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "mugs.csv",
            "Title,Images\nA,a.jpg\nB,b.jpg\nC,c.jpg\nD,d.jpg\n",
        );

        let file = read_catalog(
            &path,
            RowRange {
                start: Some(2),
                end: Some(3),
            },
        )
        .unwrap();

        let numbers: Vec<_> = file.rows.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![2, 3]);
        assert_eq!(file.rows[0].value("Title"), "B");
        assert_eq!(file.stem, "mugs");
    }

    #[test]
    fn test_missing_columns_are_reported() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.csv", "Name,Price\nMug,3\n");
        let file = read_catalog(&path, RowRange::default()).unwrap();

        let err = file.require_columns().unwrap_err();
        assert!(matches!(err, CatalogError::MissingColumns { .. }));
        assert!(err.to_string().contains("Images"));
    }

    #[test]
    fn test_columns_resolve_case_insensitively() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "ok.csv", " name ,IMAGES,sku\nMug,a.jpg,S1\n");
        let file = read_catalog(&path, RowRange::default()).unwrap();

        let columns = file.require_columns().unwrap();
        assert_eq!(columns.images, "IMAGES");
        assert_eq!(columns.title, " name ");
        assert_eq!(columns.sku.as_deref(), Some("sku"));
        assert!(columns.description.is_none());
    }

    #[test]
    fn test_write_uses_header_union() {
        let dir = TempDir::new().unwrap();
        let headers = vec!["Title".to_string(), "Images".to_string()];
        let ok = ProductRow::from_record(1, &headers, ["A", "u"]);
        let failed = ProductRow::from_record(2, &headers, ["B", ""]).with_error("boom");

        let path = dir.path().join("out.csv");
        write_rows(&path, &[ok, failed]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(format!("Title,Images,{}", ERROR_COLUMN).as_str()));
        assert_eq!(lines.next(), Some("A,u,"));
        assert_eq!(lines.next(), Some("B,,boom"));
    }

    #[test]
    fn test_list_csv_files_filters_extension() {
        let dir = TempDir::new().unwrap();
        write(&dir, "b.csv", "");
        write(&dir, "a.CSV", "");
        write(&dir, "notes.txt", "");

        let files = list_csv_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.CSV", "b.csv"]);
    }
}
