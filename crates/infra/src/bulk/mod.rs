//! Bulk import/export through CSV tables.
//!
//! Import reconciles rows against existing records by product name; export
//! writes the per-branch listing. A table exported here imports back into an
//! empty store with the same branches.

pub mod export;
pub mod import;

pub use export::ExportTable;
pub use import::{ImportOptions, ImportReport, RowError};

/// Header of the product name column.
pub const NAME: &str = "Name";
pub const PRICE: &str = "Price";
pub const STOCK: &str = "Stock";
pub const CATEGORY: &str = "Category";
/// Optional on import. Blank cells mean the import's target branch.
pub const BRANCH: &str = "Branch";

/// Column order of exported tables.
pub const EXPORT_COLUMNS: [&str; 5] = [NAME, CATEGORY, BRANCH, STOCK, PRICE];
