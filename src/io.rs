//! Batch spreadsheet reading for mass imports.
//!
//! Batch files carry three columns (`SKU | Título | EANs`) under a header
//! row. Cells are read positionally so header spelling variants do not
//! matter; unreadable rows are logged and skipped rather than failing the
//! whole file.

use std::path::Path;

use crate::error::Result;
use crate::models::{NO_DESC, NO_EAN};

/// One raw row of an import batch, sentinels already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRow {
    pub sku: String,
    pub title: String,
    pub eans: String,
}

/// Reads every data row of a batch file. The first row is the header and is
/// skipped; fully empty rows are ignored.
pub fn read_batch(path: &Path) -> Result<Vec<BatchRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Skipping unreadable batch row {}: {}", i + 2, e);
                continue;
            }
        };
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        rows.push(BatchRow {
            sku: record.get(0).unwrap_or("").trim().to_string(),
            title: non_empty_or(record.get(1), NO_DESC),
            eans: non_empty_or(record.get(2), NO_EAN),
        });
    }
    log::info!("Read {} batch rows from {}", rows.len(), path.display());
    Ok(rows)
}

fn non_empty_or(cell: Option<&str>, sentinel: &str) -> String {
    match cell.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => sentinel.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_batch(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "{}", content).unwrap();
        f
    }

    #[test]
    fn reads_rows_and_applies_sentinels() {
        let f = write_batch("SKU,Título,EANs\nA,Alpha,111\nB,,\n");
        let rows = read_batch(f.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sku, "A");
        assert_eq!(rows[0].eans, "111");
        assert_eq!(rows[1].title, NO_DESC);
        assert_eq!(rows[1].eans, NO_EAN);
    }

    #[test]
    fn skips_fully_empty_rows() {
        let f = write_batch("SKU,Título,EANs\nA,Alpha,111\n,,\nB,Beta,222\n");
        let rows = read_batch(f.path()).unwrap();
        let skus: Vec<&str> = rows.iter().map(|r| r.sku.as_str()).collect();
        assert_eq!(skus, vec!["A", "B"]);
    }

    #[test]
    fn keeps_rows_with_missing_sku_cell() {
        // empty-SKU rows are kept so the import report can count them failed
        let f = write_batch("SKU,Título,EANs\n,Beta,222\n");
        let rows = read_batch(f.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sku, "");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(read_batch(Path::new("/does/not/exist.csv")).is_err());
    }

    #[test]
    fn header_only_file_yields_no_rows() {
        let f = write_batch("SKU,Título,EANs\n");
        assert!(read_batch(f.path()).unwrap().is_empty());
    }
}
