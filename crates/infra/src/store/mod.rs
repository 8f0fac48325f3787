//! Persistence boundary for the inventory.
//!
//! Every operation of the inventory service runs inside one [`StoreTx`]:
//! begin, read and write through the transaction, then `commit`. Dropping a
//! transaction without committing discards its writes.
//!
//! Implementations own the relational guarantees:
//! - unique `Category.name`, `Product.code`, `User.username`
//! - at most one stock entry per `(product_id, branch_id)`
//! - deleting a category clears `category_id` on its products
//! - deleting a product or branch removes its stock entries and movements

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryInventoryStore, InMemoryTx};
pub use postgres::{PostgresInventoryStore, PostgresTx};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use inventario_auth::User;
use inventario_core::{BranchId, CategoryId, ProductId};
use inventario_inventory::{Branch, Movement, StockEntry};
use inventario_products::{Category, Product};

pub type StoreResult<T> = Result<T, StoreError>;

/// Store operation error.
///
/// These are infrastructure failures, as opposed to domain errors
/// (validation, invariants).
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness or foreign-key constraint rejected the write.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// Another writer committed first (optimistic concurrency).
    #[error("concurrent modification: {0}")]
    Conflict(String),

    /// The store cannot serve requests (poisoned lock, closed pool).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A store that hands out transactions.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    type Tx: StoreTx;

    async fn begin(&self) -> StoreResult<Self::Tx>;
}

#[async_trait]
impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    type Tx = S::Tx;

    async fn begin(&self) -> StoreResult<Self::Tx> {
        (**self).begin().await
    }
}

/// One unit of work against the store. Reads observe the transaction's own writes.
#[async_trait]
pub trait StoreTx: Send {
    async fn list_categories(&mut self) -> StoreResult<Vec<Category>>;
    async fn find_category(&mut self, id: CategoryId) -> StoreResult<Option<Category>>;
    async fn find_category_by_name(&mut self, name: &str) -> StoreResult<Option<Category>>;
    async fn insert_category(&mut self, category: &Category) -> StoreResult<()>;
    /// Returns `false` when no such category existed.
    async fn delete_category(&mut self, id: CategoryId) -> StoreResult<bool>;

    async fn list_branches(&mut self) -> StoreResult<Vec<Branch>>;
    async fn find_branch(&mut self, id: BranchId) -> StoreResult<Option<Branch>>;
    async fn find_branch_by_name(&mut self, name: &str) -> StoreResult<Option<Branch>>;
    async fn insert_branch(&mut self, branch: &Branch) -> StoreResult<()>;
    async fn delete_branch(&mut self, id: BranchId) -> StoreResult<bool>;

    async fn list_products(&mut self) -> StoreResult<Vec<Product>>;
    async fn find_product(&mut self, id: ProductId) -> StoreResult<Option<Product>>;
    /// Products with exactly this name, lowest id first.
    async fn find_products_by_name(&mut self, name: &str) -> StoreResult<Vec<Product>>;
    async fn find_product_by_code(&mut self, code: &str) -> StoreResult<Option<Product>>;
    async fn insert_product(&mut self, product: &Product) -> StoreResult<()>;
    async fn update_product(&mut self, product: &Product) -> StoreResult<()>;
    async fn delete_product(&mut self, id: ProductId) -> StoreResult<bool>;

    async fn list_stock(&mut self) -> StoreResult<Vec<StockEntry>>;
    async fn find_stock(
        &mut self,
        product_id: ProductId,
        branch_id: BranchId,
    ) -> StoreResult<Option<StockEntry>>;
    /// Entry for the pair, starting from zero when none exists yet, held
    /// against concurrent writers until the transaction ends. Read-modify-write
    /// of a quantity goes through here.
    async fn lock_stock(
        &mut self,
        product_id: ProductId,
        branch_id: BranchId,
    ) -> StoreResult<StockEntry>;
    /// Insert or replace the entry for `(product_id, branch_id)`.
    async fn save_stock(&mut self, entry: &StockEntry) -> StoreResult<()>;

    async fn insert_movement(&mut self, movement: &Movement) -> StoreResult<()>;
    /// Movements of a product, oldest first.
    async fn list_movements(&mut self, product_id: ProductId) -> StoreResult<Vec<Movement>>;

    async fn insert_user(&mut self, user: &User) -> StoreResult<()>;
    async fn find_user_by_username(&mut self, username: &str) -> StoreResult<Option<User>>;

    async fn commit(self) -> StoreResult<()>;
}
