//! Revision tracker - warehouse product catalog with a daily revision ledger.
//!
//! Looks up products by SKU/EAN, records review/translation decisions into
//! per-day ledger files and runs mass imports reconciled against the catalog.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args as ClapArgs, Parser, Subcommand};
use revision_tracker::{
    parse_query, run_import, CatalogStore, FormStamp, ImportOptions, PartitionDay, ResultPager,
    ReviewStatus, RevisionLedger, TrackerError, Unit, NO_DESC, RESULTS_BLOCK_SIZE,
};

/// Warehouse product catalog with daily revision ledger and mass import
#[derive(Parser, Debug)]
#[command(name = "revision_tracker")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the SQLite catalog database
    #[arg(short, long, default_value_t = default_db_path())]
    database: String,

    /// Directory holding the per-day ledger partitions
    #[arg(long, default_value = "REVs")]
    revs_dir: PathBuf,

    /// Directory for exported result files
    #[arg(long, default_value = "OUTPUT")]
    output_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a scanner input (exact SKU, then exact EAN token)
    Lookup {
        /// The EAN/SKU/ID to look up
        input: String,
    },
    /// Keyword search over product titles (reserved tokens: ALLIN, ALLDUPE)
    Search {
        /// Whitespace-delimited keywords; all must match
        keywords: Vec<String>,
        /// Block size for paginated delivery
        #[arg(long, default_value_t = RESULTS_BLOCK_SIZE)]
        block: usize,
        /// Zero-based block to show
        #[arg(long, default_value_t = 0)]
        page: usize,
    },
    /// Add a product to the catalog
    Add {
        sku: String,
        #[arg(long)]
        title: Option<String>,
        /// Comma-separated EAN list
        #[arg(long)]
        eans: Option<String>,
    },
    /// Merge additional EANs into an existing product
    Merge {
        sku: String,
        /// EAN tokens to add
        eans: Vec<String>,
    },
    /// Commit one review decision to today's ledger partition
    Review {
        sku: String,
        /// Record as "Revisado y Traducido" instead of "Solo Revisión"
        #[arg(long)]
        translated: bool,
        #[command(flatten)]
        stamp: StampArgs,
    },
    /// Mass-import a batch file, reconciling it against the catalog first
    Import {
        /// Batch file with SKU | Título | EANs columns
        file: PathBuf,
        /// Register batch rows missing from the catalog before replaying
        #[arg(long)]
        register_missing: bool,
        /// Record every row as "Revisado y Traducido"
        #[arg(long)]
        translated: bool,
        #[command(flatten)]
        stamp: StampArgs,
    },
    /// Export the full result set of a query to a spreadsheet file
    Export {
        /// Query string (keywords or a reserved token)
        query: Vec<String>,
        /// File name without extension (default: EXPORT-<timestamp>)
        #[arg(long)]
        output: Option<String>,
    },
    /// Report EANs shared by more than one SKU
    Dupes,
    /// Show a day's ledger entries, newest first
    History {
        /// Day as DD-MM-YYYY (default: today)
        #[arg(long)]
        day: Option<String>,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Show a day's reviewed/translated counters
    Stats {
        /// Day as DD-MM-YYYY (default: today)
        #[arg(long)]
        day: Option<String>,
    },
}

/// The uniform form metadata applied to a commit or to every imported row.
#[derive(ClapArgs, Debug)]
struct StampArgs {
    /// Category tag (ZZ, LOTE, Set & Pack, Consumo, EDT & EDP, MakeUP or a
    /// free-form catalog type)
    #[arg(long)]
    category: Option<String>,

    /// Net quantity
    #[arg(long, default_value_t = 1)]
    quantity: u32,

    /// Quantity unit: UND, ML or GR
    #[arg(long)]
    unit: Option<String>,

    /// Product already has Portuguese text
    #[arg(long)]
    pt: bool,
    /// Product already has Spanish text
    #[arg(long)]
    es: bool,
    /// Product already has Italian text
    #[arg(long)]
    it: bool,

    /// Lot composition: comma-separated EANs (lot categories only)
    #[arg(long)]
    lot: Option<String>,
}

impl StampArgs {
    fn to_stamp(&self) -> Result<FormStamp, TrackerError> {
        let unit = match self.unit.as_deref() {
            None => None,
            Some(raw) => Some(Unit::parse(raw).ok_or_else(|| {
                TrackerError::Validation(format!("unknown unit \"{}\" (UND, ML or GR)", raw))
            })?),
        };
        let stamp = FormStamp {
            category: self
                .category
                .as_deref()
                .and_then(revision_tracker::Category::parse),
            has_pt: self.pt,
            has_es: self.es,
            has_it: self.it,
            quantity: self.quantity,
            unit,
            lot_composition: self
                .lot
                .as_deref()
                .map(revision_tracker::models::split_ean_tokens)
                .unwrap_or_default(),
            ..FormStamp::default()
        };
        stamp.validate()?;
        Ok(stamp)
    }
}

/// Returns the default database path: ~/.local/share/revision_tracker/db.db
fn default_db_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("revision_tracker")
        .join("db.db")
        .to_string_lossy()
        .to_string()
}

fn parse_day(day: &Option<String>) -> Result<PartitionDay, TrackerError> {
    match day {
        Some(s) => PartitionDay::parse(s),
        None => Ok(PartitionDay::today()),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if e.is_retryable() {
                eprintln!("The resource is busy; close the other program and retry.");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), TrackerError> {
    let mut store = CatalogStore::open(&PathBuf::from(&cli.database))?;
    let ledger = RevisionLedger::new(&cli.revs_dir);

    match cli.command {
        Command::Lookup { input } => {
            let hits = store.resolve(&input)?;
            if hits.is_empty() {
                println!("No product found for \"{}\".", input.trim());
                println!("Use `add` to register it in the catalog.");
                return Ok(());
            }
            let today = PartitionDay::today();
            println!("{} product(s) found:", hits.len());
            for p in &hits {
                let banner = if ledger.exists_sku(today, &p.sku)? {
                    "  [already reviewed today]"
                } else {
                    ""
                };
                println!("{} - {} - {}{}", p.sku, p.title, p.eans, banner);
            }
        }
        Command::Search {
            keywords,
            block,
            page,
        } => {
            let mode = parse_query(&keywords.join(" "))?;
            let total = revision_tracker::total_count(&store, &mode)?;
            println!("Total {} products found", total);

            let mut pager = ResultPager::new(mode, block);
            for _ in 0..page {
                if pager.exhausted() {
                    break;
                }
                pager.next_block(&store)?;
            }
            let results = pager.next_block(&store)?;
            if results.is_empty() {
                println!("(no results on page {})", page);
            }
            for p in &results {
                println!("{} - {} - {}", p.sku, p.title, p.eans);
            }
            if !pager.exhausted() {
                println!("… more results; use --page {}", page + 1);
            }
        }
        Command::Add { sku, title, eans } => {
            let tokens = eans
                .as_deref()
                .map(revision_tracker::models::split_ean_tokens)
                .unwrap_or_default();
            let write = store.insert(&sku, title.as_deref().unwrap_or(""), &tokens)?;
            println!(
                "Added {} - {} - {}",
                write.product.sku, write.product.title, write.product.eans
            );
            print_collisions(&write.collisions);
        }
        Command::Merge { sku, eans } => {
            let write = store.merge_eans(&sku, &eans)?;
            println!("EANs for {} are now: {}", write.product.sku, write.product.eans);
            print_collisions(&write.collisions);
        }
        Command::Review {
            sku,
            translated,
            stamp,
        } => {
            let stamp = stamp.to_stamp()?;
            let status = if translated {
                ReviewStatus::ReviewedAndTranslated
            } else {
                ReviewStatus::OnlyReviewed
            };
            let title = store
                .lookup_by_sku(&sku)?
                .map(|p| p.title)
                .unwrap_or_else(|| NO_DESC.to_string());

            let today = PartitionDay::today();
            if ledger.exists_sku(today, &sku)? {
                println!("Note: {} was already reviewed today.", sku.trim());
            }
            let entry = stamp.entry(&sku, &title, status);
            ledger.append(today, &entry)?;
            println!("Recorded \"{}\" for {} ({})", status.label(), entry.sku, today);
        }
        Command::Import {
            file,
            register_missing,
            translated,
            stamp,
        } => {
            let options = ImportOptions {
                stamp: stamp.to_stamp()?,
                status: if translated {
                    ReviewStatus::ReviewedAndTranslated
                } else {
                    ReviewStatus::OnlyReviewed
                },
                register_missing,
            };
            let day = PartitionDay::today();
            let outcome = run_import(&mut store, &ledger, day, &file, &options, None)?;

            println!("Batch: {} rows, {} missing from catalog", outcome.total, outcome.missing);
            if let Some(reg) = &outcome.register {
                println!(
                    "Registered {} products ({} skipped)",
                    reg.registered, reg.skipped
                );
                print_collisions(&reg.collisions);
            } else if outcome.missing > 0 {
                println!("Missing rows were not registered (pass --register-missing).");
            }
            println!(
                "Import finished: {} succeeded, {} failed, {} skipped",
                outcome.report.succeeded, outcome.report.failed, outcome.report.skipped
            );
        }
        Command::Export { query, output } => {
            let mode = parse_query(&query.join(" "))?;
            let path = revision_tracker::export(
                &store,
                &mode,
                &cli.output_dir,
                output.as_deref(),
            )?;
            println!("Results exported to {}", path.display());
        }
        Command::Dupes => {
            let groups = store.find_duplicate_ean_groups();
            if groups.is_empty() {
                println!("No duplicate EANs found.");
            } else {
                println!("{} duplicated EAN(s):", groups.len());
                for g in &groups {
                    println!("{}: {}", g.ean, g.skus.join(", "));
                }
            }
        }
        Command::History { day, limit } => {
            let day = parse_day(&day)?;
            let entries = ledger.list_entries(day)?;
            if entries.is_empty() {
                println!("No revisions recorded on {}.", day);
                return Ok(());
            }
            println!("{} revision(s) on {}:", entries.len(), day);
            for e in entries.iter().rev().take(limit) {
                let tipo = e
                    .category
                    .as_ref()
                    .map(|c| c.label().to_string())
                    .unwrap_or_default();
                println!("{}-{}-{} / {}", e.sku, e.title, tipo, e.status.label());
            }
        }
        Command::Stats { day } => {
            let day = parse_day(&day)?;
            let stats = ledger.day_stats(day)?;
            println!("{}: REV: {} / RYT: {}", day, stats.reviewed, stats.translated);
        }
    }
    Ok(())
}

fn print_collisions(collisions: &[revision_tracker::EanCollision]) {
    for c in collisions {
        println!(
            "Warning: EAN \"{}\" already belongs to SKU \"{}\" ({})",
            c.ean, c.sku, c.title
        );
    }
}
