//! Product catalog and daily revision ledger engine.
//!
//! Looks up warehouse products by SKU or EAN against a SQLite catalog,
//! records review/translation decisions in date-partitioned ledger files,
//! and reconciles bulk-imported batches against the catalog before replaying
//! them into the ledger.

pub mod catalog;
pub mod error;
pub mod import;
pub mod io;
pub mod ledger;
pub mod models;
pub mod query;

// Re-export commonly used items
pub use catalog::{CatalogStore, CatalogWrite, DuplicateEanGroup, EanCollision};
pub use error::{Result, TrackerError};
pub use import::{
    reconcile, register_missing, replay, run_import, ImportOptions, ImportOutcome, ImportReport,
    Reconciliation, RegisterStats,
};
pub use io::{read_batch, BatchRow};
pub use ledger::{DayStats, PartitionDay, RevisionLedger, LEDGER_HEADER};
pub use models::{
    Category, FormStamp, Locale, LocaleText, Product, ReviewStatus, RevisionEntry, Unit, NO_DESC,
    NO_EAN,
};
pub use query::{
    export, parse_query, total_count, QueryMode, ResultPager, ALL_PRODUCTS_KEYWORD,
    DUPLICATE_EAN_KEYWORD, RESULTS_BLOCK_SIZE,
};
