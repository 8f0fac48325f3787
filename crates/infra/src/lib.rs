//! Infrastructure layer: stores, inventory operations, bulk files, config.

pub mod bulk;
pub mod config;
pub mod query;
pub mod service;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use bulk::{ExportTable, ImportOptions, ImportReport, RowError};
pub use config::{ConfigError, InventoryConfig};
pub use query::{ListingShape, ProductFilter, ProductListing, ProductRow};
pub use service::{InventoryError, InventoryResult, InventoryService, ProductForm, SeedReport};
pub use store::{
    InMemoryInventoryStore, InventoryStore, PostgresInventoryStore, StoreError, StoreResult,
    StoreTx,
};
