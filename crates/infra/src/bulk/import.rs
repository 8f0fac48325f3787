use std::io::Read;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use inventario_core::{BranchId, CategoryId, DomainError};
use inventario_inventory::{StockChange, parse_quantity};
use inventario_products::{Category, Product, ProductDetails, ProductDraft, category_cell};

use super::{BRANCH, CATEGORY, NAME, PRICE, STOCK};
use crate::service::{
    InventoryError, InventoryResult, InventoryService, apply_stock_change, ensure_branch,
};
use crate::store::{InventoryStore, StoreTx};

/// Where imported stock lands when a row does not name a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    pub target_branch: BranchId,
}

impl ImportOptions {
    pub fn new(target_branch: BranchId) -> Self {
        Self { target_branch }
    }
}

/// A row that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// 1-based line in the file (the header is line 1).
    pub line: u64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub products_created: usize,
    pub products_updated: usize,
    pub categories_created: usize,
    pub errors: Vec<RowError>,
}

impl ImportReport {
    pub fn rows_failed(&self) -> usize {
        self.errors.len()
    }
}

/// Column positions found in the header row.
#[derive(Debug, Clone, Copy)]
struct Columns {
    name: usize,
    price: usize,
    stock: usize,
    category: usize,
    branch: Option<usize>,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> InventoryResult<Self> {
        let find = |column: &str| headers.iter().position(|h| h.trim() == column);
        let required = |column: &'static str| {
            find(column).ok_or_else(|| InventoryError::MissingColumn(column.to_string()))
        };

        Ok(Self {
            name: required(NAME)?,
            price: required(PRICE)?,
            stock: required(STOCK)?,
            category: required(CATEGORY)?,
            branch: find(BRANCH),
        })
    }
}

/// Raw cells of one data row.
#[derive(Debug, Clone)]
struct RawRow {
    line: u64,
    name: String,
    price: String,
    stock: String,
    category: String,
    branch: String,
}

impl RawRow {
    fn from_record(record: &csv::StringRecord, columns: &Columns) -> Self {
        let cell = |i: usize| record.get(i).unwrap_or_default().to_string();
        Self {
            line: record.position().map(|p| p.line()).unwrap_or_default(),
            name: cell(columns.name),
            price: cell(columns.price),
            stock: cell(columns.stock),
            category: cell(columns.category),
            branch: columns.branch.map(cell).unwrap_or_default(),
        }
    }
}

/// Read the header and every record up front, so no reader is held across
/// store calls.
fn read_rows<R: Read>(reader: R) -> InventoryResult<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let columns = Columns::locate(&headers)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        rows.push(RawRow::from_record(&record, &columns));
    }
    Ok(rows)
}

impl<S: InventoryStore> InventoryService<S> {
    /// Reconcile a CSV table into the inventory.
    ///
    /// Rows that fail validation are reported and skipped. Everything else is
    /// applied in one transaction; a store failure aborts the whole import.
    /// A zero-stock row with a blank Branch cell only zeroes an existing entry
    /// at the target branch and never creates one.
    #[instrument(skip(self, reader), fields(target_branch = %options.target_branch))]
    pub async fn import_csv<R: Read>(
        &self,
        reader: R,
        options: &ImportOptions,
    ) -> InventoryResult<ImportReport> {
        let rows = read_rows(reader)?;
        let mut report = ImportReport::default();

        let mut tx = self.store().begin().await?;
        ensure_branch(&mut tx, options.target_branch).await?;

        for row in rows {
            let validated = match self.validate_row(&mut tx, &row, options).await? {
                Ok(validated) => validated,
                Err(err) => {
                    warn!(line = row.line, error = %err, "import row skipped");
                    report.errors.push(RowError {
                        line: row.line,
                        message: err.to_string(),
                    });
                    continue;
                }
            };
            self.reconcile_row(&mut tx, validated, &mut report).await?;
        }

        tx.commit().await?;
        info!(
            products_created = report.products_created,
            products_updated = report.products_updated,
            categories_created = report.categories_created,
            rows_failed = report.rows_failed(),
            "import finished"
        );
        Ok(report)
    }

    /// Row-level checks. The outer error is a store failure, the inner one a
    /// reason to skip the row.
    async fn validate_row<T: StoreTx>(
        &self,
        tx: &mut T,
        row: &RawRow,
        options: &ImportOptions,
    ) -> InventoryResult<Result<ValidatedRow, DomainError>> {
        let details = match ProductDraft::new(row.name.as_str(), row.price.as_str()).validate() {
            Ok(details) => details,
            Err(err) => return Ok(Err(err)),
        };
        let stock = match parse_quantity(&row.stock).and_then(|q| self.policy().check(q).map(|_| q)) {
            Ok(stock) => stock,
            Err(err) => return Ok(Err(err)),
        };

        let (branch_id, branch_named) = match row.branch.trim() {
            "" => (options.target_branch, false),
            name => match tx.find_branch_by_name(name).await? {
                Some(branch) => (branch.id, true),
                None => {
                    return Ok(Err(DomainError::not_found("branch", name)));
                }
            },
        };

        Ok(Ok(ValidatedRow {
            details,
            stock,
            category: category_cell(&row.category).map(str::to_string),
            branch_id,
            branch_named,
        }))
    }

    async fn reconcile_row<T: StoreTx>(
        &self,
        tx: &mut T,
        row: ValidatedRow,
        report: &mut ImportReport,
    ) -> InventoryResult<()> {
        let category_id = match row.category.as_deref() {
            Some(name) => Some(resolve_category(tx, name, report).await?),
            None => None,
        };

        // Name is the natural key; with duplicates the earliest product wins.
        let existing = tx
            .find_products_by_name(&row.details.name)
            .await?
            .into_iter()
            .next();

        let product_id = match existing {
            Some(mut product) => {
                product.price = row.details.price;
                product.category_id = category_id;
                tx.update_product(&product).await?;
                report.products_updated += 1;
                debug!(product_id = %product.id, "import updated product");
                product.id
            }
            None => {
                let product = Product::create(ProductDetails {
                    category_id,
                    ..row.details
                });
                tx.insert_product(&product).await?;
                report.products_created += 1;
                debug!(product_id = %product.id, "import created product");
                product.id
            }
        };

        // Export writes a product without stock entries as a blank Branch
        // cell with zero stock; reading it back must not invent an entry.
        if !row.branch_named
            && row.stock == 0
            && tx.find_stock(product_id, row.branch_id).await?.is_none()
        {
            return Ok(());
        }

        apply_stock_change(
            tx,
            product_id,
            row.branch_id,
            StockChange::Set(row.stock),
            self.policy(),
            None,
        )
        .await?;
        Ok(())
    }
}

#[derive(Debug)]
struct ValidatedRow {
    details: ProductDetails,
    stock: i64,
    category: Option<String>,
    branch_id: BranchId,
    /// The row named its branch instead of falling back to the target.
    branch_named: bool,
}

async fn resolve_category<T: StoreTx>(
    tx: &mut T,
    name: &str,
    report: &mut ImportReport,
) -> InventoryResult<CategoryId> {
    if let Some(category) = tx.find_category_by_name(name).await? {
        return Ok(category.id);
    }
    let category = Category::new(name, None)?;
    tx.insert_category(&category).await?;
    report.categories_created += 1;
    debug!(category_id = %category.id, name = %category.name, "import created category");
    Ok(category.id)
}
