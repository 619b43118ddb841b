use std::io::Write;

use revision_tracker::{
    parse_query, run_import, CatalogStore, FormStamp, ImportOptions, PartitionDay, ResultPager,
    ReviewStatus, RevisionLedger, TrackerError,
};

fn day() -> PartitionDay {
    PartitionDay::parse("05-08-2026").unwrap()
}

fn write_batch_file(dir: &std::path::Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("batch.csv");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(f, "{}", content).unwrap();
    path
}

#[test]
fn test_full_import_pipeline_with_registration() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = CatalogStore::open(&dir.path().join("db.db")).unwrap();
    let ledger = RevisionLedger::new(dir.path().join("REVs"));

    // only B preexists
    store.insert("B", "Beta", &["2".to_string()]).unwrap();

    let batch = write_batch_file(
        dir.path(),
        "SKU,Título,EANs\nA,Alpha,1\nB,Beta,2\nC,Gamma,3\n",
    );
    let options = ImportOptions {
        stamp: FormStamp::default(),
        status: ReviewStatus::OnlyReviewed,
        register_missing: true,
    };

    let outcome = run_import(&mut store, &ledger, day(), &batch, &options, None).unwrap();

    assert_eq!(outcome.total, 3);
    assert_eq!(outcome.missing, 2);
    let reg = outcome.register.as_ref().unwrap();
    assert_eq!(reg.registered, 2);
    assert_eq!(reg.skipped, 0);

    // catalog now contains A, B and C
    for sku in ["A", "B", "C"] {
        assert!(store.lookup_by_sku(sku).unwrap().is_some(), "missing {}", sku);
    }

    // exactly 3 ledger rows, all OnlyReviewed
    assert_eq!(outcome.report.succeeded, 3);
    assert_eq!(outcome.report.failed + outcome.report.skipped, 0);
    let entries = ledger.list_entries(day()).unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries
        .iter()
        .all(|e| e.status == ReviewStatus::OnlyReviewed));
}

#[test]
fn test_import_without_registration_still_replays_all_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = CatalogStore::open(&dir.path().join("db.db")).unwrap();
    let ledger = RevisionLedger::new(dir.path().join("REVs"));

    let batch = write_batch_file(dir.path(), "SKU,Título,EANs\nA,Alpha,1\nB,Beta,2\n");
    let options = ImportOptions {
        register_missing: false,
        ..ImportOptions::default()
    };

    let outcome = run_import(&mut store, &ledger, day(), &batch, &options, None).unwrap();
    assert_eq!(outcome.missing, 2);
    assert!(outcome.register.is_none());
    // nothing registered, but the replay still appends every row
    assert_eq!(store.product_count().unwrap(), 0);
    assert_eq!(outcome.report.succeeded, 2);
    assert_eq!(ledger.list_entries(day()).unwrap().len(), 2);
}

#[test]
fn test_rerunning_an_import_is_additive_in_ledger_only() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = CatalogStore::open(&dir.path().join("db.db")).unwrap();
    let ledger = RevisionLedger::new(dir.path().join("REVs"));

    let batch = write_batch_file(dir.path(), "SKU,Título,EANs\nA,Alpha,1\n");
    let options = ImportOptions {
        register_missing: true,
        ..ImportOptions::default()
    };

    run_import(&mut store, &ledger, day(), &batch, &options, None).unwrap();
    let second = run_import(&mut store, &ledger, day(), &batch, &options, None).unwrap();

    // catalog registration is idempotent; the ledger is additive
    assert_eq!(second.register.as_ref().unwrap().registered, 0);
    assert_eq!(second.register.as_ref().unwrap().skipped, 1);
    assert_eq!(store.product_count().unwrap(), 1);
    assert_eq!(ledger.list_entries(day()).unwrap().len(), 2);
}

#[test]
fn test_import_rejects_zero_quantity_stamp_before_any_write() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = CatalogStore::open(&dir.path().join("db.db")).unwrap();
    let ledger = RevisionLedger::new(dir.path().join("REVs"));

    let batch = write_batch_file(dir.path(), "SKU,Título,EANs\nA,Alpha,1\n");
    let options = ImportOptions {
        stamp: FormStamp {
            quantity: 0,
            ..FormStamp::default()
        },
        ..ImportOptions::default()
    };

    let err = run_import(&mut store, &ledger, day(), &batch, &options, None).unwrap_err();
    assert!(matches!(err, TrackerError::Validation(_)));
    assert!(!ledger.partition_path(day()).exists());
}

// The end-to-end lookup/merge scenario: insert, find by EAN, merge, re-insert.
#[test]
fn test_catalog_scenario_producto_a() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = CatalogStore::open(&dir.path().join("db.db")).unwrap();

    store
        .insert(
            "123456",
            "Producto A",
            &["111".to_string(), "222".to_string()],
        )
        .unwrap();

    let hits = store.lookup_by_ean("111").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Producto A");

    let merged = store
        .merge_eans("123456", &["222".to_string(), "333".to_string()])
        .unwrap();
    assert_eq!(merged.product.eans, "111,222,333");

    let err = store.insert("123456", "Otro", &[]).unwrap_err();
    assert!(matches!(err, TrackerError::DuplicateKey(_)));
    let p = store.lookup_by_sku("123456").unwrap().unwrap();
    assert_eq!(p.title, "Producto A");
    assert_eq!(p.eans, "111,222,333");
}

#[test]
fn test_search_pagination_and_export_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = CatalogStore::open(&dir.path().join("db.db")).unwrap();
    for i in 0..7 {
        store
            .insert(
                &format!("SKU{}", i),
                &format!("Crema Facial {}", i),
                &[format!("90{}", i)],
            )
            .unwrap();
    }
    store.insert("X", "Gel de Baño", &[]).unwrap();

    let mode = parse_query("crema facial").unwrap();
    let mut pager = ResultPager::new(mode.clone(), 3);
    let mut collected = Vec::new();
    while !pager.exhausted() {
        collected.extend(pager.next_block(&store).unwrap());
    }
    assert_eq!(collected.len(), 7);

    let out = revision_tracker::export(&store, &mode, &dir.path().join("OUTPUT"), Some("cremas"))
        .unwrap();
    let content = std::fs::read_to_string(out).unwrap();
    assert_eq!(content.lines().count(), 8);
    assert!(content.starts_with("SKU,TITULO,EANs"));
}
