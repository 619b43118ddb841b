//! Batch import reconciliation: diff a batch against the catalog, optionally
//! register what is missing, then replay every row into the ledger.
//!
//! Row failures never abort the batch; they are logged, counted and the
//! remaining rows continue. Re-running the same batch appends a second set
//! of ledger rows (the ledger is additive) while catalog registration stays
//! idempotent (duplicate SKUs are skipped, never overwritten).

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::catalog::{CatalogStore, EanCollision};
use crate::error::Result;
use crate::io::{read_batch, BatchRow};
use crate::ledger::{PartitionDay, RevisionLedger};
use crate::models::{split_ean_tokens, FormStamp, ReviewStatus};

/// Batch rows split by catalog membership.
#[derive(Debug, Default)]
pub struct Reconciliation {
    pub known: Vec<BatchRow>,
    pub missing: Vec<BatchRow>,
}

/// Counters from registering missing rows into the catalog.
#[derive(Debug, Default)]
pub struct RegisterStats {
    pub registered: usize,
    pub skipped: usize,
    pub collisions: Vec<EanCollision>,
}

/// Counters from replaying a batch into the ledger. The three always sum to
/// the batch row count.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Caller choices for one import run.
#[derive(Debug, Default)]
pub struct ImportOptions {
    pub stamp: FormStamp,
    pub status: ReviewStatus,
    pub register_missing: bool,
}

/// Combined result of [`run_import`].
#[derive(Debug)]
pub struct ImportOutcome {
    pub total: usize,
    pub missing: usize,
    pub register: Option<RegisterStats>,
    pub report: ImportReport,
}

/// Splits batch rows into those whose SKU exists in the catalog and those
/// absent from it.
pub fn reconcile(store: &CatalogStore, rows: &[BatchRow]) -> Result<Reconciliation> {
    let mut recon = Reconciliation::default();
    for row in rows {
        if store.lookup_by_sku(&row.sku)?.is_some() {
            recon.known.push(row.clone());
        } else {
            recon.missing.push(row.clone());
        }
    }
    log::info!(
        "Reconciled batch: {} known, {} missing",
        recon.known.len(),
        recon.missing.len()
    );
    Ok(recon)
}

/// Bulk-registers missing rows, skipping duplicates and malformed rows.
/// Existing products are never overwritten.
pub fn register_missing(store: &mut CatalogStore, rows: &[BatchRow]) -> RegisterStats {
    let mut stats = RegisterStats::default();
    for row in rows {
        let tokens = split_ean_tokens(&row.eans);
        match store.insert(&row.sku, &row.title, &tokens) {
            Ok(write) => {
                stats.registered += 1;
                stats.collisions.extend(write.collisions);
            }
            Err(e) => {
                log::warn!("Could not register SKU \"{}\": {}", row.sku, e);
                stats.skipped += 1;
            }
        }
    }
    log::info!(
        "Registered {} products ({} skipped)",
        stats.registered,
        stats.skipped
    );
    stats
}

/// Replays every batch row into the day's partition as one entry under the
/// uniform stamp. Entries are buffered and flushed once. `cancel` is checked
/// at each row boundary; rows not reached count as skipped.
pub fn replay(
    ledger: &RevisionLedger,
    day: PartitionDay,
    rows: &[BatchRow],
    stamp: &FormStamp,
    status: ReviewStatus,
    cancel: Option<&AtomicBool>,
) -> ImportReport {
    let mut report = ImportReport::default();
    let mut entries = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        if let Some(flag) = cancel {
            if flag.load(Ordering::Relaxed) {
                report.skipped = rows.len() - i;
                log::warn!("Import cancelled; {} rows skipped", report.skipped);
                break;
            }
        }
        if row.sku.trim().is_empty() {
            log::warn!("Batch row {} has no SKU; skipping", i + 1);
            report.failed += 1;
            continue;
        }
        entries.push(stamp.entry(&row.sku, &row.title, status));
    }

    match ledger.append_batch(day, &entries) {
        Ok(written) => report.succeeded = written,
        Err(e) => {
            log::error!("Ledger write failed, {} rows not committed: {}", entries.len(), e);
            report.failed += entries.len();
        }
    }
    report
}

/// The full import pipeline: read the batch file, reconcile against the
/// catalog, optionally register missing products, replay into the ledger.
pub fn run_import(
    store: &mut CatalogStore,
    ledger: &RevisionLedger,
    day: PartitionDay,
    path: &Path,
    options: &ImportOptions,
    cancel: Option<&AtomicBool>,
) -> Result<ImportOutcome> {
    options.stamp.validate()?;
    let rows = read_batch(path)?;
    let recon = reconcile(store, &rows)?;

    let register = if options.register_missing && !recon.missing.is_empty() {
        Some(register_missing(store, &recon.missing))
    } else {
        if !recon.missing.is_empty() {
            log::warn!(
                "{} batch rows are not in the catalog and were not registered",
                recon.missing.len()
            );
        }
        None
    };

    let report = replay(ledger, day, &rows, &options.stamp, options.status, cancel);
    Ok(ImportOutcome {
        total: rows.len(),
        missing: recon.missing.len(),
        register,
        report,
    })
}
