//! Append-only, date-partitioned ledger of review decisions.
//!
//! One CSV file per calendar day (`REV-DD-MM-YYYY.csv`) with a fixed
//! 18-column header. Rows are appended in commit order and never rewritten;
//! the same SKU may appear any number of times. Appends go through an
//! in-memory buffer and a single append-mode write, so a failed call never
//! leaves a partial row behind.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::{Result, TrackerError};
use crate::models::{ReviewStatus, RevisionEntry};

/// Fixed header row of every ledger partition.
pub const LEDGER_HEADER: [&str; 18] = [
    "EAN/SKU/ID",
    "MARCA/TITULO",
    "Tipo",
    "Tiene PT",
    "Tiene ES",
    "Tiene IT",
    "Cantidad Neta",
    "UND/ML/GR",
    "Composición de Lote",
    "Estado",
    "DescripcionPT",
    "Modo de EmpleoPT",
    "PrecaucionesPT",
    "Más InformacionesPT",
    "DescripcionIT",
    "Modo de EmpleoIT",
    "PrecaucionesIT",
    "Más InformacionesIT",
];

/// A ledger partition key: one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionDay(NaiveDate);

impl PartitionDay {
    /// Today's partition, using local system time.
    pub fn today() -> Self {
        PartitionDay(chrono::Local::now().date_naive())
    }

    pub fn from_date(date: NaiveDate) -> Self {
        PartitionDay(date)
    }

    /// Parses the `DD-MM-YYYY` day label.
    pub fn parse(s: &str) -> Result<Self> {
        NaiveDate::parse_from_str(s.trim(), "%d-%m-%Y")
            .map(PartitionDay)
            .map_err(|_| {
                TrackerError::Validation(format!("\"{}\" is not a DD-MM-YYYY day", s.trim()))
            })
    }

    /// The `DD-MM-YYYY` label used in filenames.
    pub fn label(&self) -> String {
        self.0.format("%d-%m-%Y").to_string()
    }

    pub fn file_name(&self) -> String {
        format!("REV-{}.csv", self.label())
    }
}

impl std::fmt::Display for PartitionDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Per-day counters shown by the `stats` command. A translated entry counts
/// as reviewed too.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DayStats {
    pub reviewed: usize,
    pub translated: usize,
}

pub struct RevisionLedger {
    revs_dir: PathBuf,
}

impl RevisionLedger {
    pub fn new(revs_dir: impl Into<PathBuf>) -> Self {
        RevisionLedger {
            revs_dir: revs_dir.into(),
        }
    }

    pub fn partition_path(&self, day: PartitionDay) -> PathBuf {
        self.revs_dir.join(day.file_name())
    }

    /// Appends one entry to the day's partition, creating it (header
    /// included) on first use.
    pub fn append(&self, day: PartitionDay, entry: &RevisionEntry) -> Result<()> {
        self.append_batch(day, std::slice::from_ref(entry))?;
        Ok(())
    }

    /// Appends a whole batch with a single open and flush. Returns the
    /// number of rows written. The header is written exactly once, when the
    /// partition is created.
    pub fn append_batch(&self, day: PartitionDay, entries: &[RevisionEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }
        fs::create_dir_all(&self.revs_dir)?;
        let path = self.partition_path(day);
        let is_new = !path.exists();
        if !is_new {
            self.validate_header(&path)?;
        }

        // Serialize everything first; only complete rows reach the file.
        let mut buf = Vec::new();
        {
            let mut w = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(&mut buf);
            if is_new {
                w.write_record(LEDGER_HEADER)?;
            }
            for entry in entries {
                w.write_record(&entry.to_record())?;
            }
            w.flush()?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(&buf)?;
        file.flush()?;
        log::info!(
            "Appended {} entr{} to {}",
            entries.len(),
            if entries.len() == 1 { "y" } else { "ies" },
            path.display()
        );
        Ok(entries.len())
    }

    /// All entries of a day, in insertion order. An absent partition yields
    /// an empty list.
    pub fn list_entries(&self, day: PartitionDay) -> Result<Vec<RevisionEntry>> {
        let path = self.partition_path(day);
        if !path.exists() {
            return Ok(Vec::new());
        }
        self.validate_header(&path)?;
        let mut out = Vec::new();
        for record in self.data_records(&path)? {
            let record = record?;
            let cells: Vec<&str> = record.iter().collect();
            out.push(RevisionEntry::from_cells(&cells)?);
        }
        Ok(out)
    }

    /// Whether `sku` was already committed to the day's partition. Backs the
    /// "already reviewed today" banner.
    pub fn exists_sku(&self, day: PartitionDay, sku: &str) -> Result<bool> {
        let path = self.partition_path(day);
        if !path.exists() {
            return Ok(false);
        }
        self.validate_header(&path)?;
        let sku = sku.trim();
        for record in self.data_records(&path)? {
            let record = record?;
            if record.get(0).map(str::trim) == Some(sku) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Reviewed/translated counters for one day.
    pub fn day_stats(&self, day: PartitionDay) -> Result<DayStats> {
        let path = self.partition_path(day);
        let mut stats = DayStats::default();
        if !path.exists() {
            return Ok(stats);
        }
        self.validate_header(&path)?;
        for record in self.data_records(&path)? {
            let record = record?;
            match record.get(9).and_then(ReviewStatus::parse) {
                Some(ReviewStatus::OnlyReviewed) => stats.reviewed += 1,
                Some(ReviewStatus::ReviewedAndTranslated) => {
                    stats.reviewed += 1;
                    stats.translated += 1;
                }
                None => {}
            }
        }
        Ok(stats)
    }

    /// An externally edited partition with a wrong or missing header is
    /// corrupt; it is reported, never silently repaired.
    fn validate_header(&self, path: &Path) -> Result<()> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;
        let mut record = csv::StringRecord::new();
        let file = path.display().to_string();
        if !rdr.read_record(&mut record)? {
            return Err(TrackerError::CorruptPartition {
                file,
                reason: "missing header row".to_string(),
            });
        }
        let matches = record.len() == LEDGER_HEADER.len()
            && record.iter().zip(LEDGER_HEADER.iter()).all(|(a, b)| a == *b);
        if !matches {
            return Err(TrackerError::CorruptPartition {
                file,
                reason: "header row does not match the ledger format".to_string(),
            });
        }
        Ok(())
    }

    /// Iterator over the data rows of a partition (header skipped).
    fn data_records(
        &self,
        path: &Path,
    ) -> Result<impl Iterator<Item = std::result::Result<csv::StringRecord, csv::Error>>> {
        let rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;
        Ok(rdr.into_records().skip(1))
    }
}
