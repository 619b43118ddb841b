//! Core domain types for the product catalog and revision ledger.
//!
//! String cells follow the legacy spreadsheet conventions: `NO-EAN` and
//! `NO-DESC` sentinels for absent values, comma-joined EAN lists, and the
//! fixed Spanish wording for locale flags and review states.

use serde::Serialize;

use crate::error::{Result, TrackerError};

/// Sentinel stored when a product has no EAN tokens.
pub const NO_EAN: &str = "NO-EAN";
/// Sentinel stored when a product has no title.
pub const NO_DESC: &str = "NO-DESC";

/// A catalog product. `sku` is the unique primary key; `eans` is the
/// canonical comma-joined token list (lexicographic, deduplicated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    #[serde(rename = "SKU")]
    pub sku: String,
    #[serde(rename = "TITULO")]
    pub title: String,
    #[serde(rename = "EANs")]
    pub eans: String,
}

impl Product {
    /// Builds a product from raw input, applying sentinels and canonical
    /// EAN ordering.
    pub fn new(sku: &str, title: &str, eans: &[String]) -> Self {
        let title = title.trim();
        Product {
            sku: sku.trim().to_string(),
            title: if title.is_empty() {
                NO_DESC.to_string()
            } else {
                title.to_string()
            },
            eans: canonical_ean_list(eans),
        }
    }

    /// The individual EAN tokens; empty when the sentinel is stored.
    pub fn ean_tokens(&self) -> Vec<&str> {
        if self.eans == NO_EAN {
            return Vec::new();
        }
        self.eans
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Exact-token membership test (never substring containment).
    pub fn has_ean(&self, token: &str) -> bool {
        let token = token.trim();
        self.ean_tokens().iter().any(|t| *t == token)
    }
}

/// Splits a raw comma-joined EAN cell into cleaned tokens, dropping empties
/// and the `NO-EAN` sentinel.
pub fn split_ean_tokens(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != NO_EAN)
        .map(str::to_string)
        .collect()
}

/// Joins tokens into the canonical stored form: deduplicated, sorted
/// lexicographically, comma-separated. Two runs over the same input always
/// produce the same string.
pub fn canonical_ean_list(tokens: &[String]) -> String {
    let set: std::collections::BTreeSet<&str> = tokens
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty() && *t != NO_EAN)
        .collect();
    if set.is_empty() {
        NO_EAN.to_string()
    } else {
        set.into_iter().collect::<Vec<_>>().join(",")
    }
}

/// Product category recorded with a revision. The first six are the
/// special-handling classes; everything else is a free-form catalog type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    Zz,
    Lote,
    SetPack,
    Consumo,
    EdtEdp,
    MakeUp,
    Catalog(String),
}

impl Category {
    pub fn label(&self) -> &str {
        match self {
            Category::Zz => "ZZ",
            Category::Lote => "LOTE",
            Category::SetPack => "Set & Pack",
            Category::Consumo => "Consumo",
            Category::EdtEdp => "EDT & EDP",
            Category::MakeUp => "MakeUP",
            Category::Catalog(s) => s,
        }
    }

    /// Parses a category cell. Empty input means "no category selected".
    pub fn parse(s: &str) -> Option<Category> {
        let s = s.trim();
        match s {
            "" => None,
            "ZZ" => Some(Category::Zz),
            "LOTE" => Some(Category::Lote),
            "Set & Pack" => Some(Category::SetPack),
            "Consumo" => Some(Category::Consumo),
            "EDT & EDP" => Some(Category::EdtEdp),
            "MakeUP" => Some(Category::MakeUp),
            other => Some(Category::Catalog(other.to_string())),
        }
    }

    /// Lot-shaped categories carry a lot composition column.
    pub fn is_lot(&self) -> bool {
        matches!(self, Category::Lote | Category::SetPack)
    }
}

/// Net quantity unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Und,
    Ml,
    Gr,
}

impl Unit {
    pub fn label(&self) -> &'static str {
        match self {
            Unit::Und => "UND",
            Unit::Ml => "ML",
            Unit::Gr => "GR",
        }
    }

    pub fn parse(s: &str) -> Option<Unit> {
        match s.trim().to_uppercase().as_str() {
            "UND" => Some(Unit::Und),
            "ML" => Some(Unit::Ml),
            "GR" => Some(Unit::Gr),
            _ => None,
        }
    }
}

/// Review decision recorded in the ledger's `Estado` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStatus {
    OnlyReviewed,
    ReviewedAndTranslated,
}

impl Default for ReviewStatus {
    fn default() -> Self {
        ReviewStatus::OnlyReviewed
    }
}

impl ReviewStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ReviewStatus::OnlyReviewed => "Solo Revisión",
            ReviewStatus::ReviewedAndTranslated => "Revisado y Traducido",
        }
    }

    pub fn parse(s: &str) -> Option<ReviewStatus> {
        match s.trim() {
            "Solo Revisión" => Some(ReviewStatus::OnlyReviewed),
            "Revisado y Traducido" => Some(ReviewStatus::ReviewedAndTranslated),
            _ => None,
        }
    }
}

/// Supported translation locales. ES only carries a presence flag; PT and IT
/// additionally carry text columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    Pt,
    Es,
    It,
}

impl Locale {
    /// The fixed wording written to the `Tiene XX` columns.
    pub fn presence_label(self, has: bool) -> &'static str {
        match (self, has) {
            (Locale::Pt, true) => "Tiene PT",
            (Locale::Pt, false) => "No Tiene PT - TRADUZIDO",
            (Locale::Es, true) => "Tiene ES",
            (Locale::Es, false) => "No Tiene ES - TRADUCIDO",
            (Locale::It, true) => "Tiene IT",
            (Locale::It, false) => "No Tiene IT - TRADOTTO",
        }
    }

    /// Reads a presence flag back from its cell wording.
    pub fn presence_from_label(cell: &str) -> bool {
        cell.trim().starts_with("Tiene")
    }
}

/// One locale's translation text block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocaleText {
    pub description: String,
    pub usage: String,
    pub precautions: String,
    pub extra: String,
}

/// The form metadata applied to a commit or uniformly to every row of an
/// import batch. A caller can hold a stamp and reapply it across commits
/// (lock mode).
#[derive(Debug, Clone)]
pub struct FormStamp {
    pub category: Option<Category>,
    pub has_pt: bool,
    pub has_es: bool,
    pub has_it: bool,
    pub quantity: u32,
    pub unit: Option<Unit>,
    pub lot_composition: Vec<String>,
    pub pt: LocaleText,
    pub it: LocaleText,
}

impl Default for FormStamp {
    fn default() -> Self {
        FormStamp {
            category: None,
            has_pt: false,
            has_es: false,
            has_it: false,
            quantity: 1,
            unit: None,
            lot_composition: Vec::new(),
            pt: LocaleText::default(),
            it: LocaleText::default(),
        }
    }
}

impl FormStamp {
    pub fn validate(&self) -> Result<()> {
        if self.quantity == 0 {
            return Err(TrackerError::Validation(
                "quantity must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    /// Produces the ledger entry for one product under this stamp. The lot
    /// composition is only emitted for lot-shaped categories.
    pub fn entry(&self, sku: &str, title: &str, status: ReviewStatus) -> RevisionEntry {
        let lot_composition = if self.category.as_ref().is_some_and(Category::is_lot) {
            self.lot_composition.clone()
        } else {
            Vec::new()
        };
        RevisionEntry {
            sku: sku.trim().to_string(),
            title: title.trim().to_string(),
            category: self.category.clone(),
            has_pt: self.has_pt,
            has_es: self.has_es,
            has_it: self.has_it,
            quantity: self.quantity,
            unit: self.unit,
            lot_composition,
            status,
            pt: self.pt.clone(),
            it: self.it.clone(),
        }
    }
}

/// One immutable ledger row. `sku` and `title` are copies taken at commit
/// time, not live references into the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionEntry {
    pub sku: String,
    pub title: String,
    pub category: Option<Category>,
    pub has_pt: bool,
    pub has_es: bool,
    pub has_it: bool,
    pub quantity: u32,
    pub unit: Option<Unit>,
    pub lot_composition: Vec<String>,
    pub status: ReviewStatus,
    pub pt: LocaleText,
    pub it: LocaleText,
}

impl RevisionEntry {
    /// The 18 cells of this entry, in ledger column order.
    pub fn to_record(&self) -> Vec<String> {
        vec![
            self.sku.clone(),
            self.title.clone(),
            self.category
                .as_ref()
                .map(|c| c.label().to_string())
                .unwrap_or_default(),
            Locale::Pt.presence_label(self.has_pt).to_string(),
            Locale::Es.presence_label(self.has_es).to_string(),
            Locale::It.presence_label(self.has_it).to_string(),
            self.quantity.to_string(),
            self.unit.map(|u| u.label().to_string()).unwrap_or_default(),
            format_lot_cell(&self.lot_composition),
            self.status.label().to_string(),
            self.pt.description.clone(),
            self.pt.usage.clone(),
            self.pt.precautions.clone(),
            self.pt.extra.clone(),
            self.it.description.clone(),
            self.it.usage.clone(),
            self.it.precautions.clone(),
            self.it.extra.clone(),
        ]
    }

    /// Parses a ledger row back into an entry. Rows from older partitions
    /// may lack the translation columns; those default to empty.
    pub fn from_cells(cells: &[&str]) -> Result<RevisionEntry> {
        if cells.len() < 10 {
            return Err(TrackerError::Validation(format!(
                "ledger row has {} columns, expected at least 10",
                cells.len()
            )));
        }
        let cell = |i: usize| cells.get(i).map(|s| s.trim()).unwrap_or("");
        let status = ReviewStatus::parse(cell(9)).ok_or_else(|| {
            TrackerError::Validation(format!("unknown review status \"{}\"", cell(9)))
        })?;
        Ok(RevisionEntry {
            sku: cell(0).to_string(),
            title: cell(1).to_string(),
            category: Category::parse(cell(2)),
            has_pt: Locale::presence_from_label(cell(3)),
            has_es: Locale::presence_from_label(cell(4)),
            has_it: Locale::presence_from_label(cell(5)),
            quantity: cell(6).parse().unwrap_or(0),
            unit: Unit::parse(cell(7)),
            lot_composition: parse_lot_cell(cell(8)),
            status,
            pt: LocaleText {
                description: cell(10).to_string(),
                usage: cell(11).to_string(),
                precautions: cell(12).to_string(),
                extra: cell(13).to_string(),
            },
            it: LocaleText {
                description: cell(14).to_string(),
                usage: cell(15).to_string(),
                precautions: cell(16).to_string(),
                extra: cell(17).to_string(),
            },
        })
    }
}

/// Formats the `Composición de Lote` cell: each token quoted, comma-joined.
pub fn format_lot_cell(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t))
        .collect::<Vec<_>>()
        .join(",")
}

/// Inverse of [`format_lot_cell`].
pub fn parse_lot_cell(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(|t| t.trim().trim_matches('"').trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
