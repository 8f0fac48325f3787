//! PostgreSQL-backed inventory store.
//!
//! Each [`PostgresTx`] wraps one `sqlx` transaction. Stock rows are read with
//! `SELECT ... FOR UPDATE` so relative adjustments serialize per
//! `(product_id, branch_id)` pair. Dropping a transaction without committing
//! rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument};

use inventario_auth::User;
use inventario_core::{
    BranchId, CategoryId, DomainError, MovementId, ProductId, StockEntryId, UserId,
};
use inventario_inventory::{Branch, Movement, StockEntry};
use inventario_products::{Category, Price, Product};

use super::{InventoryStore, StoreError, StoreResult, StoreTx};

/// Schema statements, applied in order by [`PostgresInventoryStore::ensure_schema`].
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id          UUID PRIMARY KEY,
        name        TEXT NOT NULL UNIQUE,
        description TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS branches (
        id      UUID PRIMARY KEY,
        name    TEXT NOT NULL,
        address TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id          UUID PRIMARY KEY,
        name        TEXT NOT NULL,
        code        TEXT UNIQUE,
        description TEXT,
        supplier    TEXT,
        price       NUMERIC(14, 2) NOT NULL CHECK (price >= 0),
        status      TEXT NOT NULL DEFAULT 'active',
        category_id UUID REFERENCES categories (id) ON DELETE SET NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS product_branch_stock (
        id         UUID PRIMARY KEY,
        product_id UUID NOT NULL REFERENCES products (id) ON DELETE CASCADE,
        branch_id  UUID NOT NULL REFERENCES branches (id) ON DELETE CASCADE,
        stock      BIGINT NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS product_branch_stock_pair
        ON product_branch_stock (product_id, branch_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            UUID PRIMARY KEY,
        username      TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role          TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS movements (
        id          UUID PRIMARY KEY,
        product_id  UUID NOT NULL REFERENCES products (id) ON DELETE CASCADE,
        branch_id   UUID NOT NULL REFERENCES branches (id) ON DELETE CASCADE,
        kind        TEXT NOT NULL CHECK (kind IN ('in', 'out')),
        quantity    BIGINT NOT NULL CHECK (quantity > 0),
        occurred_at TIMESTAMPTZ NOT NULL,
        user_id     UUID REFERENCES users (id) ON DELETE SET NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS movements_product
        ON movements (product_id, occurred_at)
    "#,
];

/// Inventory store over a PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `url`.
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        debug!(statements = SCHEMA.len(), "schema ensured");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> StoreResult<Self::Tx> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PostgresTx { tx })
    }
}

/// One database transaction.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

impl std::fmt::Debug for PostgresTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresTx").finish_non_exhaustive()
    }
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn list_categories(&mut self) -> StoreResult<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name, description FROM categories ORDER BY name, id")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_categories", e))?;
        rows.iter().map(category_from_row).collect()
    }

    async fn find_category(&mut self, id: CategoryId) -> StoreResult<Option<Category>> {
        let row = sqlx::query("SELECT id, name, description FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_category", e))?;
        row.as_ref().map(category_from_row).transpose()
    }

    async fn find_category_by_name(&mut self, name: &str) -> StoreResult<Option<Category>> {
        let row = sqlx::query("SELECT id, name, description FROM categories WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_category_by_name", e))?;
        row.as_ref().map(category_from_row).transpose()
    }

    async fn insert_category(&mut self, category: &Category) -> StoreResult<()> {
        sqlx::query("INSERT INTO categories (id, name, description) VALUES ($1, $2, $3)")
            .bind(category.id.as_uuid())
            .bind(&category.name)
            .bind(&category.description)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_category", e))?;
        Ok(())
    }

    async fn delete_category(&mut self, id: CategoryId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_category", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_branches(&mut self) -> StoreResult<Vec<Branch>> {
        let rows = sqlx::query("SELECT id, name, address FROM branches ORDER BY name, id")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_branches", e))?;
        rows.iter().map(branch_from_row).collect()
    }

    async fn find_branch(&mut self, id: BranchId) -> StoreResult<Option<Branch>> {
        let row = sqlx::query("SELECT id, name, address FROM branches WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_branch", e))?;
        row.as_ref().map(branch_from_row).transpose()
    }

    async fn find_branch_by_name(&mut self, name: &str) -> StoreResult<Option<Branch>> {
        let row = sqlx::query(
            "SELECT id, name, address FROM branches WHERE name = $1 ORDER BY id LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_branch_by_name", e))?;
        row.as_ref().map(branch_from_row).transpose()
    }

    async fn insert_branch(&mut self, branch: &Branch) -> StoreResult<()> {
        sqlx::query("INSERT INTO branches (id, name, address) VALUES ($1, $2, $3)")
            .bind(branch.id.as_uuid())
            .bind(&branch.name)
            .bind(&branch.address)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_branch", e))?;
        Ok(())
    }

    async fn delete_branch(&mut self, id: BranchId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM branches WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_branch", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_products(&mut self) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query(&format!("{PRODUCT_COLUMNS} ORDER BY id"))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;
        rows.iter().map(product_from_row).collect()
    }

    async fn find_product(&mut self, id: ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query(&format!("{PRODUCT_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_product", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn find_products_by_name(&mut self, name: &str) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query(&format!("{PRODUCT_COLUMNS} WHERE name = $1 ORDER BY id"))
            .bind(name)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_products_by_name", e))?;
        rows.iter().map(product_from_row).collect()
    }

    async fn find_product_by_code(&mut self, code: &str) -> StoreResult<Option<Product>> {
        let row = sqlx::query(&format!("{PRODUCT_COLUMNS} WHERE code = $1"))
            .bind(code)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_product_by_code", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn insert_product(&mut self, product: &Product) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, code, description, supplier, price, status, category_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.code)
        .bind(&product.description)
        .bind(&product.supplier)
        .bind(product.price.amount())
        .bind(product.status.as_str())
        .bind(product.category_id.map(|id| *id.as_uuid()))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = $2,
                code = $3,
                description = $4,
                supplier = $5,
                price = $6,
                status = $7,
                category_id = $8
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.code)
        .bind(&product.description)
        .bind(&product.supplier)
        .bind(product.price.amount())
        .bind(product.status.as_str())
        .bind(product.category_id.map(|id| *id.as_uuid()))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Constraint(format!(
                "product {} does not exist",
                product.id
            )));
        }
        Ok(())
    }

    async fn delete_product(&mut self, id: ProductId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_stock(&mut self) -> StoreResult<Vec<StockEntry>> {
        let rows = sqlx::query(
            "SELECT id, product_id, branch_id, stock FROM product_branch_stock ORDER BY id",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_stock", e))?;
        rows.iter().map(stock_from_row).collect()
    }

    async fn find_stock(
        &mut self,
        product_id: ProductId,
        branch_id: BranchId,
    ) -> StoreResult<Option<StockEntry>> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, branch_id, stock
            FROM product_branch_stock
            WHERE product_id = $1 AND branch_id = $2
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(branch_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_stock", e))?;
        row.as_ref().map(stock_from_row).transpose()
    }

    async fn lock_stock(
        &mut self,
        product_id: ProductId,
        branch_id: BranchId,
    ) -> StoreResult<StockEntry> {
        // FOR UPDATE alone locks nothing for a pair without a row, so make
        // sure one exists first. A concurrent insert of the same pair blocks
        // here until the other transaction ends.
        sqlx::query(
            r#"
            INSERT INTO product_branch_stock (id, product_id, branch_id, stock)
            VALUES ($1, $2, $3, 0)
            ON CONFLICT (product_id, branch_id) DO NOTHING
            "#,
        )
        .bind(*StockEntryId::new().as_uuid())
        .bind(product_id.as_uuid())
        .bind(branch_id.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_stock", e))?;

        let row = sqlx::query(
            r#"
            SELECT id, product_id, branch_id, stock
            FROM product_branch_stock
            WHERE product_id = $1 AND branch_id = $2
            FOR UPDATE
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(branch_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_stock", e))?;
        stock_from_row(&row)
    }

    async fn save_stock(&mut self, entry: &StockEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO product_branch_stock (id, product_id, branch_id, stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (product_id, branch_id)
            DO UPDATE SET stock = EXCLUDED.stock
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.product_id.as_uuid())
        .bind(entry.branch_id.as_uuid())
        .bind(entry.stock)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_stock", e))?;
        Ok(())
    }

    async fn insert_movement(&mut self, movement: &Movement) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO movements (
                id, product_id, branch_id, kind, quantity, occurred_at, user_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(movement.product_id.as_uuid())
        .bind(movement.branch_id.as_uuid())
        .bind(movement.kind.as_str())
        .bind(movement.quantity)
        .bind(movement.occurred_at)
        .bind(movement.user_id.map(|id| *id.as_uuid()))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_movement", e))?;
        Ok(())
    }

    async fn list_movements(&mut self, product_id: ProductId) -> StoreResult<Vec<Movement>> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, branch_id, kind, quantity, occurred_at, user_id
            FROM movements
            WHERE product_id = $1
            ORDER BY occurred_at, id
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_movements", e))?;
        rows.iter().map(movement_from_row).collect()
    }

    async fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO users (id, username, password_hash, role) VALUES ($1, $2, $3, $4)",
        )
        .bind(user.id.as_uuid())
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    async fn find_user_by_username(&mut self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, role FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_user_by_username", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }
}

const PRODUCT_COLUMNS: &str = r#"
    SELECT id, name, code, description, supplier, price, status, category_id
    FROM products
"#;

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    let code = match &err {
        sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            return StoreError::Unavailable(format!("{operation}: {err}"));
        }
        _ => None,
    };

    match code.as_deref() {
        // unique, foreign key and check violations
        Some("23505") | Some("23503") | Some("23514") => {
            StoreError::Constraint(format!("{operation}: {err}"))
        }
        // serialization failure, deadlock
        Some("40001") | Some("40P01") => StoreError::Conflict(format!("{operation}: {err}")),
        _ => StoreError::Database(err),
    }
}

/// Stored text that no longer parses into a domain value.
fn decode_error(err: DomainError) -> StoreError {
    StoreError::Database(sqlx::Error::Decode(Box::new(err)))
}

fn category_from_row(row: &PgRow) -> StoreResult<Category> {
    Ok(Category {
        id: CategoryId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
    })
}

fn branch_from_row(row: &PgRow) -> StoreResult<Branch> {
    Ok(Branch {
        id: BranchId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        address: row.try_get("address")?,
    })
}

fn product_from_row(row: &PgRow) -> StoreResult<Product> {
    let price: Decimal = row.try_get("price")?;
    let status: String = row.try_get("status")?;
    let category_id: Option<uuid::Uuid> = row.try_get("category_id")?;

    Ok(Product {
        id: ProductId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        code: row.try_get("code")?,
        description: row.try_get("description")?,
        supplier: row.try_get("supplier")?,
        price: Price::new(price).map_err(decode_error)?,
        status: status.parse().map_err(decode_error)?,
        category_id: category_id.map(CategoryId::from_uuid),
    })
}

fn stock_from_row(row: &PgRow) -> StoreResult<StockEntry> {
    Ok(StockEntry {
        id: StockEntryId::from_uuid(row.try_get("id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        branch_id: BranchId::from_uuid(row.try_get("branch_id")?),
        stock: row.try_get("stock")?,
    })
}

fn movement_from_row(row: &PgRow) -> StoreResult<Movement> {
    let kind: String = row.try_get("kind")?;
    let occurred_at: DateTime<Utc> = row.try_get("occurred_at")?;
    let user_id: Option<uuid::Uuid> = row.try_get("user_id")?;

    Ok(Movement {
        id: MovementId::from_uuid(row.try_get("id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        branch_id: BranchId::from_uuid(row.try_get("branch_id")?),
        kind: kind.parse().map_err(decode_error)?,
        quantity: row.try_get("quantity")?,
        occurred_at,
        user_id: user_id.map(UserId::from_uuid),
    })
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: UserId::from_uuid(row.try_get("id")?),
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        role: role.parse().map_err(decode_error)?,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::service::{InventoryError, InventoryService, ProductForm};
    use inventario_inventory::{NegativeStockPolicy, StockChange};
    use inventario_products::ProductDraft;

    async fn connect() -> PostgresInventoryStore {
        let url = std::env::var("INVENTARIO_TEST_DATABASE_URL")
            .expect("INVENTARIO_TEST_DATABASE_URL must be set for postgres tests");
        let store = PostgresInventoryStore::connect(&url, 2).await.unwrap();
        store.ensure_schema().await.unwrap();
        store
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL database"]
    async fn stock_round_trips_and_cascades() {
        let store = connect().await;
        let mut tx = store.begin().await.unwrap();

        let branch = Branch::new(&format!("Branch {}", BranchId::new()), None).unwrap();
        let product = Product::create(ProductDraft::new("Smoke box", "4.20").validate().unwrap());
        tx.insert_branch(&branch).await.unwrap();
        tx.insert_product(&product).await.unwrap();

        let mut entry = StockEntry::new(product.id, branch.id);
        entry
            .apply(StockChange::Set(6), NegativeStockPolicy::Reject)
            .unwrap();
        tx.save_stock(&entry).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let found = tx.find_stock(product.id, branch.id).await.unwrap().unwrap();
        assert_eq!(found.stock, 6);
        let loaded = tx.find_product(product.id).await.unwrap().unwrap();
        assert_eq!(loaded.price.to_string(), "4.20");

        assert!(tx.delete_product(product.id).await.unwrap());
        assert!(tx.find_stock(product.id, branch.id).await.unwrap().is_none());
        tx.delete_branch(branch.id).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL database"]
    async fn duplicate_category_name_is_a_constraint_error() {
        let store = connect().await;
        let mut tx = store.begin().await.unwrap();
        let name = format!("Category {}", CategoryId::new());

        tx.insert_category(&Category::new(&name, None).unwrap()).await.unwrap();
        let err = tx
            .insert_category(&Category::new(&name, None).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
        // rolled back on drop
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requires a PostgreSQL database"]
    async fn concurrent_adjustments_on_a_fresh_pair_never_lose_updates() {
        let service = Arc::new(InventoryService::with_policy(
            connect().await,
            NegativeStockPolicy::Allow,
        ));
        let main = service
            .create_branch(&format!("Main {}", BranchId::new()), None)
            .await
            .unwrap();
        let annex = service
            .create_branch(&format!("Annex {}", BranchId::new()), None)
            .await
            .unwrap();
        let product = service
            .create_product(ProductForm::new(format!("Widget {}", ProductId::new()), "1", "0", main.id))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..6 {
            let service = service.clone();
            let (product_id, branch_id) = (product.id, annex.id);
            handles.push(tokio::spawn(async move {
                for _ in 0..4 {
                    loop {
                        match service
                            .update_stock(product_id, branch_id, StockChange::Adjust(1), None)
                            .await
                        {
                            Ok(_) => break,
                            Err(InventoryError::Store(StoreError::Conflict(_))) => {}
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut tx = service.store().begin().await.unwrap();
        let entry = tx.find_stock(product.id, annex.id).await.unwrap().unwrap();
        assert_eq!(entry.stock, 24);
        assert_eq!(tx.list_movements(product.id).await.unwrap().len(), 24);
        drop(tx);

        service.delete_product(product.id).await.unwrap();
        service.delete_branch(main.id).await.unwrap();
        service.delete_branch(annex.id).await.unwrap();
    }
}
