//! SQLite-backed product catalog keyed by SKU.
//!
//! EAN lookup is exact-token: the stored comma-joined list is split and the
//! query token tested for membership, never substring containment. An
//! in-memory inverted index (`ean -> {sku}`) is built on open and kept in
//! step with every write, so token lookup does not scan the table.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use rusqlite::{params, params_from_iter, Connection, Row};

use crate::error::{Result, TrackerError};
use crate::models::{canonical_ean_list, Product, NO_EAN};

/// A non-fatal warning: an EAN being attached to one SKU already belongs to
/// another. Duplicate assignment is allowed but always reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EanCollision {
    pub ean: String,
    pub sku: String,
    pub title: String,
}

/// Result of a catalog write: the stored product plus any EAN collision
/// warnings for the caller to surface.
#[derive(Debug)]
pub struct CatalogWrite {
    pub product: Product,
    pub collisions: Vec<EanCollision>,
}

/// One group of the duplicate-EAN report: a token shared by several SKUs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateEanGroup {
    pub ean: String,
    pub skus: Vec<String>,
}

pub struct CatalogStore {
    conn: Connection,
    ean_index: BTreeMap<String, BTreeSet<String>>,
}

impl CatalogStore {
    /// Opens (or creates) the catalog database at `path` and builds the EAN
    /// index.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        log::info!("Catalog DB: {}", path.display());
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory catalog, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        let ean_index = build_index(&conn)?;
        log::debug!("EAN index: {} distinct tokens", ean_index.len());
        Ok(CatalogStore { conn, ean_index })
    }

    /// Exact-key lookup by SKU.
    pub fn lookup_by_sku(&self, sku: &str) -> Result<Option<Product>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT sku, titulo, eans FROM productos WHERE sku = ?1")?;
        let mut rows = stmt.query(params![sku.trim()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_product(row)?)),
            None => Ok(None),
        }
    }

    /// Every product whose EAN set contains `token` as an exact element.
    /// Multiplicity is preserved: a token shared by several SKUs returns all
    /// of them, sorted by SKU.
    pub fn lookup_by_ean(&self, token: &str) -> Result<Vec<Product>> {
        let token = token.trim();
        let mut out = Vec::new();
        if let Some(skus) = self.ean_index.get(token) {
            for sku in skus {
                if let Some(p) = self.lookup_by_sku(sku)? {
                    out.push(p);
                }
            }
        }
        Ok(out)
    }

    /// Resolves a raw scanner input: exact SKU first, then EAN membership.
    pub fn resolve(&self, input: &str) -> Result<Vec<Product>> {
        let input = input.trim();
        if input.is_empty() {
            return Err(TrackerError::Validation(
                "the EAN/SKU/ID field cannot be empty".to_string(),
            ));
        }
        if let Some(p) = self.lookup_by_sku(input)? {
            return Ok(vec![p]);
        }
        self.lookup_by_ean(input)
    }

    /// Inserts a new product. Fails closed on a duplicate SKU; a supplied
    /// EAN already owned by another SKU does not block the insert but is
    /// returned as a collision warning.
    pub fn insert(&mut self, sku: &str, title: &str, eans: &[String]) -> Result<CatalogWrite> {
        let sku = sku.trim();
        if sku.is_empty() {
            return Err(TrackerError::Validation("SKU is required".to_string()));
        }
        if self.lookup_by_sku(sku)?.is_some() {
            return Err(TrackerError::DuplicateKey(sku.to_string()));
        }
        let product = Product::new(sku, title, eans);
        let tokens: Vec<String> = product.ean_tokens().iter().map(|t| t.to_string()).collect();
        let collisions = self.collisions_for(sku, &tokens)?;
        self.conn.execute(
            "INSERT INTO productos (sku, titulo, eans) VALUES (?1, ?2, ?3)",
            params![product.sku, product.title, product.eans],
        )?;
        self.index_product(&product);
        log::info!("Inserted product {} ({})", product.sku, product.title);
        Ok(CatalogWrite {
            product,
            collisions,
        })
    }

    /// Merges `new_tokens` into the product's EAN set (set union) and stores
    /// the canonical lexicographic joining. Applying the same tokens twice
    /// leaves the stored set unchanged.
    pub fn merge_eans(&mut self, sku: &str, new_tokens: &[String]) -> Result<CatalogWrite> {
        let sku = sku.trim();
        let existing = self
            .lookup_by_sku(sku)?
            .ok_or_else(|| TrackerError::NotFound(sku.to_string()))?;

        let added: Vec<String> = new_tokens
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        let mut union: Vec<String> = existing
            .ean_tokens()
            .into_iter()
            .map(str::to_string)
            .collect();
        union.extend(added.iter().cloned());
        let merged = canonical_ean_list(&union);

        let product = Product {
            sku: existing.sku.clone(),
            title: existing.title.clone(),
            eans: merged,
        };
        // warn only about the tokens being attached now
        let collisions = self.collisions_for(sku, &added)?;
        self.conn.execute(
            "UPDATE productos SET eans = ?1 WHERE sku = ?2",
            params![product.eans, product.sku],
        )?;
        self.index_product(&product);
        log::info!("Updated EANs for product {}: {}", product.sku, product.eans);
        Ok(CatalogWrite {
            product,
            collisions,
        })
    }

    /// All non-sentinel EAN tokens shared by more than one SKU, sorted by
    /// token; SKUs sorted within each group.
    pub fn find_duplicate_ean_groups(&self) -> Vec<DuplicateEanGroup> {
        self.ean_index
            .iter()
            .filter(|(_, skus)| skus.len() > 1)
            .map(|(ean, skus)| DuplicateEanGroup {
                ean: ean.clone(),
                skus: skus.iter().cloned().collect(),
            })
            .collect()
    }

    /// Full catalog dump, ordered by SKU.
    pub fn all_products(&self) -> Result<Vec<Product>> {
        self.select_products("SELECT sku, titulo, eans FROM productos ORDER BY sku", &[])
    }

    /// One pagination block of the full dump.
    pub fn products_page(&self, limit: usize, offset: usize) -> Result<Vec<Product>> {
        let sql = format!(
            "SELECT sku, titulo, eans FROM productos ORDER BY sku LIMIT {} OFFSET {}",
            limit, offset
        );
        self.select_products(&sql, &[])
    }

    /// Products whose title contains every keyword, case-insensitively.
    pub fn search_titles(&self, keywords: &[String]) -> Result<Vec<Product>> {
        let (sql, patterns) = title_query(keywords, None)?;
        self.select_products(&sql, &patterns)
    }

    /// One pagination block of a title search.
    pub fn search_titles_page(
        &self,
        keywords: &[String],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Product>> {
        let (sql, patterns) = title_query(keywords, Some((limit, offset)))?;
        self.select_products(&sql, &patterns)
    }

    /// Total number of title-search matches.
    pub fn count_search_titles(&self, keywords: &[String]) -> Result<usize> {
        let (clause, patterns) = title_clause(keywords)?;
        let sql = format!("SELECT COUNT(*) FROM productos WHERE {}", clause);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(patterns.iter()), |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Total number of products in the catalog.
    pub fn product_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM productos", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn select_products(&self, sql: &str, string_params: &[String]) -> Result<Vec<Product>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(string_params.iter()), |row| {
            row_to_product(row)
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Collision warnings for every listed token owned by a different SKU.
    fn collisions_for(&self, sku: &str, tokens: &[String]) -> Result<Vec<EanCollision>> {
        let mut collisions = Vec::new();
        for token in tokens {
            if let Some(owners) = self.ean_index.get(token.as_str()) {
                for owner in owners {
                    if owner != sku {
                        let title = self
                            .lookup_by_sku(owner)?
                            .map(|p| p.title)
                            .unwrap_or_default();
                        collisions.push(EanCollision {
                            ean: token.to_string(),
                            sku: owner.clone(),
                            title,
                        });
                    }
                }
            }
        }
        Ok(collisions)
    }

    fn index_product(&mut self, product: &Product) {
        for token in product.ean_tokens() {
            self.ean_index
                .entry(token.to_string())
                .or_default()
                .insert(product.sku.clone());
        }
    }
}

/// Creates the `productos` table if it does not already exist.
fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS productos (
            sku    TEXT PRIMARY KEY,
            titulo TEXT,
            eans   TEXT
        );",
    )
}

/// Full-scan index build, done once per open.
fn build_index(conn: &Connection) -> Result<BTreeMap<String, BTreeSet<String>>> {
    let mut index: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut stmt = conn.prepare("SELECT sku, eans FROM productos")?;
    let rows = stmt.query_map([], |row| {
        let sku: String = row.get(0)?;
        let eans: Option<String> = row.get(1)?;
        Ok((sku, eans.unwrap_or_else(|| NO_EAN.to_string())))
    })?;
    for row in rows {
        let (sku, eans) = row?;
        if eans == NO_EAN {
            continue;
        }
        for token in eans.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            index.entry(token.to_string()).or_default().insert(sku.clone());
        }
    }
    Ok(index)
}

fn row_to_product(row: &Row<'_>) -> rusqlite::Result<Product> {
    let sku: String = row.get(0)?;
    let title: Option<String> = row.get(1)?;
    let eans: Option<String> = row.get(2)?;
    Ok(Product {
        sku,
        title: title.unwrap_or_else(|| crate::models::NO_DESC.to_string()),
        eans: eans.unwrap_or_else(|| NO_EAN.to_string()),
    })
}

fn title_clause(keywords: &[String]) -> Result<(String, Vec<String>)> {
    if keywords.is_empty() {
        return Err(TrackerError::Validation(
            "at least one search keyword is required".to_string(),
        ));
    }
    let clause = keywords
        .iter()
        .map(|_| "titulo LIKE ? COLLATE NOCASE")
        .collect::<Vec<_>>()
        .join(" AND ");
    let patterns = keywords.iter().map(|kw| format!("%{}%", kw)).collect();
    Ok((clause, patterns))
}

fn title_query(
    keywords: &[String],
    page: Option<(usize, usize)>,
) -> Result<(String, Vec<String>)> {
    let (clause, patterns) = title_clause(keywords)?;
    let mut sql = format!(
        "SELECT sku, titulo, eans FROM productos WHERE {} ORDER BY sku",
        clause
    );
    if let Some((limit, offset)) = page {
        sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
    }
    Ok((sql, patterns))
}
