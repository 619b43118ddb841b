//! Catalog queries: reserved-token dumps, keyword title search, block
//! pagination and spreadsheet export.
//!
//! Results are delivered in fixed-size blocks behind a monotonically
//! advancing offset cursor; once a short block arrives the pager is
//! exhausted and further loads return nothing. `reset` restarts the
//! sequence from the beginning.

use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::CatalogStore;
use crate::error::{Result, TrackerError};
use crate::models::Product;

/// Reserved query token: dump the whole catalog.
pub const ALL_PRODUCTS_KEYWORD: &str = "ALLIN";
/// Reserved query token: products involved in duplicate-EAN groups.
pub const DUPLICATE_EAN_KEYWORD: &str = "ALLDUPE";
/// Default pagination block size.
pub const RESULTS_BLOCK_SIZE: usize = 50;

/// How a raw query string is interpreted, in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryMode {
    All,
    DuplicateEans,
    Keywords(Vec<String>),
}

/// Parses the raw query string. Reserved tokens are checked first; anything
/// else becomes whitespace-delimited keywords, all of which must match.
pub fn parse_query(raw: &str) -> Result<QueryMode> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(TrackerError::Validation(
            "the search field cannot be empty".to_string(),
        ));
    }
    match raw {
        ALL_PRODUCTS_KEYWORD => Ok(QueryMode::All),
        DUPLICATE_EAN_KEYWORD => Ok(QueryMode::DuplicateEans),
        _ => Ok(QueryMode::Keywords(
            raw.split_whitespace().map(str::to_string).collect(),
        )),
    }
}

/// Block-paginated delivery of one query's results.
pub struct ResultPager {
    mode: QueryMode,
    block_size: usize,
    offset: usize,
    exhausted: bool,
    // duplicate-EAN results come from the index, not SQL; materialised once
    dupes: Option<Vec<Product>>,
}

impl ResultPager {
    pub fn new(mode: QueryMode, block_size: usize) -> Self {
        ResultPager {
            mode,
            block_size: block_size.max(1),
            offset: 0,
            exhausted: false,
            dupes: None,
        }
    }

    /// Loads the next block and advances the cursor. Returns an empty block
    /// once the sequence is exhausted.
    pub fn next_block(&mut self, store: &CatalogStore) -> Result<Vec<Product>> {
        if self.exhausted {
            return Ok(Vec::new());
        }
        let block = match &self.mode {
            QueryMode::All => store.products_page(self.block_size, self.offset)?,
            QueryMode::Keywords(keywords) => {
                store.search_titles_page(keywords, self.block_size, self.offset)?
            }
            QueryMode::DuplicateEans => {
                if self.dupes.is_none() {
                    self.dupes = Some(duplicate_products(store)?);
                }
                let all = self.dupes.as_deref().unwrap_or(&[]);
                all.iter()
                    .skip(self.offset)
                    .take(self.block_size)
                    .cloned()
                    .collect()
            }
        };
        self.offset += block.len();
        if block.len() < self.block_size {
            self.exhausted = true;
        }
        Ok(block)
    }

    pub fn exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Restarts the sequence from the first block.
    pub fn reset(&mut self) {
        self.offset = 0;
        self.exhausted = false;
    }
}

/// The full, unpaginated result set for a query mode.
pub fn fetch_all(store: &CatalogStore, mode: &QueryMode) -> Result<Vec<Product>> {
    match mode {
        QueryMode::All => store.all_products(),
        QueryMode::Keywords(keywords) => store.search_titles(keywords),
        QueryMode::DuplicateEans => duplicate_products(store),
    }
}

/// Total result count for the "Total N productos" banner.
pub fn total_count(store: &CatalogStore, mode: &QueryMode) -> Result<usize> {
    match mode {
        QueryMode::All => store.product_count(),
        QueryMode::Keywords(keywords) => store.count_search_titles(keywords),
        QueryMode::DuplicateEans => Ok(duplicate_products(store)?.len()),
    }
}

/// Products that belong to at least one duplicate-EAN group, ordered by the
/// group token and deduplicated (a product sharing several tokens appears
/// once, at its first group).
fn duplicate_products(store: &CatalogStore) -> Result<Vec<Product>> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for group in store.find_duplicate_ean_groups() {
        for sku in &group.skus {
            if seen.insert(sku.clone()) {
                if let Some(p) = store.lookup_by_sku(sku)? {
                    out.push(p);
                }
            }
        }
    }
    Ok(out)
}

/// Default export file stem: `EXPORT-DDMMYYYY-HHMM`.
pub fn default_export_name() -> String {
    format!("EXPORT-{}", chrono::Local::now().format("%d%m%Y-%H%M"))
}

/// Writes the full result set of `mode` to `<output_dir>/<name>.csv` with
/// the `SKU, TITULO, EANs` header. An empty result set is an error; no file
/// is created for it.
pub fn export(
    store: &CatalogStore,
    mode: &QueryMode,
    output_dir: &Path,
    name: Option<&str>,
) -> Result<PathBuf> {
    let products = fetch_all(store, mode)?;
    if products.is_empty() {
        return Err(TrackerError::Validation(
            "no results to export".to_string(),
        ));
    }

    fs::create_dir_all(output_dir)?;
    let stem = match name.map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => default_export_name(),
    };
    let path = output_dir.join(format!("{}.csv", stem));

    let mut writer = csv::Writer::from_path(&path)?;
    for product in &products {
        writer.serialize(product)?;
    }
    writer.flush()?;
    log::info!("Exported {} products to {}", products.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store(n: usize) -> CatalogStore {
        let mut store = CatalogStore::open_in_memory().unwrap();
        for i in 0..n {
            store
                .insert(
                    &format!("SKU{:03}", i),
                    &format!("Producto {}", i),
                    &[format!("9{:03}", i)],
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn parse_reserved_tokens_first() {
        assert_eq!(parse_query("ALLIN").unwrap(), QueryMode::All);
        assert_eq!(parse_query("ALLDUPE").unwrap(), QueryMode::DuplicateEans);
        assert_eq!(
            parse_query("crema facial").unwrap(),
            QueryMode::Keywords(vec!["crema".to_string(), "facial".to_string()])
        );
        assert!(parse_query("   ").is_err());
    }

    #[test]
    fn reserved_tokens_are_exact() {
        // a keyword containing the reserved token is still a keyword search
        assert_eq!(
            parse_query("ALLIN extra").unwrap(),
            QueryMode::Keywords(vec!["ALLIN".to_string(), "extra".to_string()])
        );
    }

    #[test]
    fn pages_reconstruct_the_full_set_without_dupes() {
        let store = seeded_store(23);
        for block_size in [1usize, 50, 23] {
            let mut pager = ResultPager::new(QueryMode::All, block_size);
            let mut collected = Vec::new();
            while !pager.exhausted() {
                collected.extend(pager.next_block(&store).unwrap());
            }
            assert_eq!(collected.len(), 23, "block size {}", block_size);
            let mut skus: Vec<String> = collected.iter().map(|p| p.sku.clone()).collect();
            let total = skus.len();
            skus.dedup();
            assert_eq!(skus.len(), total, "block size {}", block_size);
        }
    }

    #[test]
    fn exhausted_pager_stays_empty() {
        let store = seeded_store(3);
        let mut pager = ResultPager::new(QueryMode::All, 50);
        assert_eq!(pager.next_block(&store).unwrap().len(), 3);
        assert!(pager.exhausted());
        assert!(pager.next_block(&store).unwrap().is_empty());
    }

    #[test]
    fn reset_restarts_the_sequence() {
        let store = seeded_store(5);
        let mut pager = ResultPager::new(QueryMode::All, 2);
        let first = pager.next_block(&store).unwrap();
        while !pager.exhausted() {
            pager.next_block(&store).unwrap();
        }
        pager.reset();
        assert_eq!(pager.next_block(&store).unwrap(), first);
    }

    #[test]
    fn exact_block_boundary_needs_one_more_load() {
        let store = seeded_store(4);
        let mut pager = ResultPager::new(QueryMode::All, 2);
        assert_eq!(pager.next_block(&store).unwrap().len(), 2);
        assert_eq!(pager.next_block(&store).unwrap().len(), 2);
        assert!(!pager.exhausted());
        assert!(pager.next_block(&store).unwrap().is_empty());
        assert!(pager.exhausted());
    }

    #[test]
    fn keyword_mode_paginates_matches_only() {
        let mut store = seeded_store(0);
        store.insert("A", "Crema Facial", &[]).unwrap();
        store.insert("B", "Crema de Manos", &[]).unwrap();
        store.insert("C", "Gel de Baño", &[]).unwrap();

        let mode = parse_query("crema").unwrap();
        assert_eq!(total_count(&store, &mode).unwrap(), 2);
        let mut pager = ResultPager::new(mode, 1);
        let mut collected = Vec::new();
        while !pager.exhausted() {
            collected.extend(pager.next_block(&store).unwrap());
        }
        let skus: Vec<&str> = collected.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus, vec!["A", "B"]);
    }

    #[test]
    fn duplicate_mode_lists_each_product_once() {
        let mut store = seeded_store(0);
        store
            .insert("A", "Alpha", &["111".to_string(), "222".to_string()])
            .unwrap();
        store
            .insert("B", "Beta", &["111".to_string(), "222".to_string()])
            .unwrap();
        store.insert("C", "Gamma", &["333".to_string()]).unwrap();

        let mode = QueryMode::DuplicateEans;
        assert_eq!(total_count(&store, &mode).unwrap(), 2);
        let all = fetch_all(&store, &mode).unwrap();
        let skus: Vec<&str> = all.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus, vec!["A", "B"]);
    }

    #[test]
    fn export_writes_header_and_rows() {
        let store = seeded_store(2);
        let dir = tempfile::tempdir().unwrap();
        let path = export(&store, &QueryMode::All, dir.path(), Some("listado")).unwrap();
        assert_eq!(path.file_name().unwrap(), "listado.csv");

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "SKU,TITULO,EANs");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("SKU000,Producto 0,"));
    }

    #[test]
    fn export_empty_result_is_an_error_and_writes_nothing() {
        let store = seeded_store(0);
        let dir = tempfile::tempdir().unwrap();
        let err = export(&store, &QueryMode::All, dir.path(), Some("vacio")).unwrap_err();
        assert!(matches!(err, TrackerError::Validation(_)));
        assert!(!dir.path().join("vacio.csv").exists());
    }

    #[test]
    fn default_export_name_carries_timestamp() {
        let name = default_export_name();
        assert!(name.starts_with("EXPORT-"));
        // EXPORT-DDMMYYYY-HHMM
        assert_eq!(name.len(), "EXPORT-".len() + 13);
    }
}
