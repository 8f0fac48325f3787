use serde::Serialize;
use tracing::info;

use inventario_products::NO_CATEGORY;

use super::EXPORT_COLUMNS;
use crate::query::{ListingShape, ProductFilter, ProductListing};
use crate::service::{InventoryError, InventoryResult, InventoryService};
use crate::store::InventoryStore;

/// A rendered inventory table, ready to be handed out as a download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportTable {
    pub sheet_name: &'static str,
    pub file_name: &'static str,
    pub content_type: &'static str,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExportTable {
    pub const SHEET_NAME: &'static str = "Inventario";
    pub const FILE_NAME: &'static str = "inventario.csv";
    pub const CONTENT_TYPE: &'static str = "text/csv";

    /// One line per listing row: name, category, branch, stock, price.
    pub fn from_listing(listing: &ProductListing) -> Self {
        let rows = listing
            .rows
            .iter()
            .map(|row| {
                vec![
                    row.product.name.clone(),
                    row.category_name().unwrap_or(NO_CATEGORY).to_string(),
                    row.branch_name().unwrap_or_default().to_string(),
                    row.stock.to_string(),
                    row.product.price.to_string(),
                ]
            })
            .collect();

        Self {
            sheet_name: Self::SHEET_NAME,
            file_name: Self::FILE_NAME,
            content_type: Self::CONTENT_TYPE,
            headers: EXPORT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    pub fn to_csv(&self) -> InventoryResult<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| InventoryError::Spreadsheet(e.to_string()))
    }
}

impl<S: InventoryStore> InventoryService<S> {
    /// Export the products matching `filter`, one row per stock entry.
    ///
    /// The filter's shape is ignored; exports are always per branch.
    pub async fn export_table(&self, filter: &ProductFilter) -> InventoryResult<ExportTable> {
        let filter = ProductFilter {
            shape: ListingShape::PerBranch,
            ..filter.clone()
        };
        let listing = self.list_products(&filter).await?;
        let table = ExportTable::from_listing(&listing);
        info!(rows = table.rows.len(), "inventory exported");
        Ok(table)
    }
}
