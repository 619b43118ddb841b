//! Unified error type for catalog, ledger and import operations.
//!
//! "Database is locked" and file-busy conditions surface as the retryable
//! [`TrackerError::Locked`] variant instead of being thrown through; callers
//! decide whether to retry or report.

use std::fmt;
use std::io;

/// Unified error type for all tracker operations
#[derive(Debug)]
pub enum TrackerError {
    /// Empty or malformed caller input; nothing was written
    Validation(String),
    /// SKU not present in the catalog
    NotFound(String),
    /// SKU already present; the insert was rejected and the record unchanged
    DuplicateKey(String),
    /// Underlying store or partition file held by another process; retryable
    Locked(String),
    /// A partition file exists but its header does not match the ledger format
    CorruptPartition { file: String, reason: String },
    /// Catalog database operation failed
    Database(rusqlite::Error),
    /// Spreadsheet read/write failed
    Csv(csv::Error),
    /// File I/O error
    Io(io::Error),
}

/// Result alias for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

impl TrackerError {
    /// True for failures the user can resolve by closing the other process
    /// and retrying; the operation left no partial state behind.
    pub fn is_retryable(&self) -> bool {
        match self {
            TrackerError::Locked(_) => true,
            TrackerError::Io(e) => e.kind() == io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::Validation(msg) => write!(f, "Invalid input: {}", msg),
            TrackerError::NotFound(sku) => write!(f, "Product not found: {}", sku),
            TrackerError::DuplicateKey(sku) => {
                write!(f, "SKU \"{}\" already exists in the catalog", sku)
            }
            TrackerError::Locked(what) => {
                write!(f, "Resource is in use by another process: {}", what)
            }
            TrackerError::CorruptPartition { file, reason } => {
                write!(f, "Corrupt ledger partition {}: {}", file, reason)
            }
            TrackerError::Database(e) => write!(f, "Database error: {}", e),
            TrackerError::Csv(e) => write!(f, "Spreadsheet error: {}", e),
            TrackerError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for TrackerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrackerError::Database(e) => Some(e),
            TrackerError::Csv(e) => Some(e),
            TrackerError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for TrackerError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode::{DatabaseBusy, DatabaseLocked};
        if let rusqlite::Error::SqliteFailure(e, ref msg) = err {
            if matches!(e.code, DatabaseBusy | DatabaseLocked) {
                let what = msg
                    .clone()
                    .unwrap_or_else(|| "catalog database".to_string());
                return TrackerError::Locked(what);
            }
        }
        TrackerError::Database(err)
    }
}

impl From<csv::Error> for TrackerError {
    fn from(err: csv::Error) -> Self {
        TrackerError::Csv(err)
    }
}

impl From<io::Error> for TrackerError {
    fn from(err: io::Error) -> Self {
        TrackerError::Io(err)
    }
}
