use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use inventario_auth::User;
use inventario_core::{BranchId, CategoryId, ExpectedVersion, ProductId, UserId};
use inventario_inventory::{Branch, Movement, StockEntry};
use inventario_products::{Category, Product};

use super::{InventoryStore, StoreError, StoreResult, StoreTx};

#[derive(Debug, Clone, Default)]
struct Tables {
    categories: BTreeMap<CategoryId, Category>,
    branches: BTreeMap<BranchId, Branch>,
    products: BTreeMap<ProductId, Product>,
    stock: BTreeMap<(ProductId, BranchId), StockEntry>,
    movements: Vec<Movement>,
    users: BTreeMap<UserId, User>,
}

#[derive(Debug, Default)]
struct Shared {
    version: u64,
    tables: Tables,
}

/// In-memory inventory store.
///
/// Intended for tests/dev. Transactions work on a snapshot and commit with an
/// optimistic version check, so two writers racing on the same snapshot
/// cannot both win.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryStore {
    shared: Arc<RwLock<Shared>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed write transactions.
    pub fn version(&self) -> u64 {
        self.shared.read().map(|s| s.version).unwrap_or(0)
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> StoreResult<Self::Tx> {
        let shared = self
            .shared
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(InMemoryTx {
            shared: self.shared.clone(),
            base_version: shared.version,
            tables: shared.tables.clone(),
            dirty: false,
        })
    }
}

/// Snapshot transaction over [`InMemoryInventoryStore`].
#[derive(Debug)]
pub struct InMemoryTx {
    shared: Arc<RwLock<Shared>>,
    base_version: u64,
    tables: Tables,
    dirty: bool,
}

impl InMemoryTx {
    fn touch(&mut self) -> &mut Tables {
        self.dirty = true;
        &mut self.tables
    }
}

fn sorted_by_name<T>(mut rows: Vec<T>, name: impl Fn(&T) -> &str) -> Vec<T> {
    rows.sort_by(|a, b| name(a).cmp(name(b)));
    rows
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn list_categories(&mut self) -> StoreResult<Vec<Category>> {
        let rows = self.tables.categories.values().cloned().collect();
        Ok(sorted_by_name(rows, |c: &Category| c.name.as_str()))
    }

    async fn find_category(&mut self, id: CategoryId) -> StoreResult<Option<Category>> {
        Ok(self.tables.categories.get(&id).cloned())
    }

    async fn find_category_by_name(&mut self, name: &str) -> StoreResult<Option<Category>> {
        Ok(self.tables.categories.values().find(|c| c.name == name).cloned())
    }

    async fn insert_category(&mut self, category: &Category) -> StoreResult<()> {
        if self.tables.categories.values().any(|c| c.name == category.name) {
            return Err(StoreError::Constraint(format!(
                "category name '{}' already exists",
                category.name
            )));
        }
        self.touch().categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn delete_category(&mut self, id: CategoryId) -> StoreResult<bool> {
        if !self.tables.categories.contains_key(&id) {
            return Ok(false);
        }
        let tables = self.touch();
        tables.categories.remove(&id);
        for product in tables.products.values_mut() {
            if product.category_id == Some(id) {
                product.category_id = None;
            }
        }
        Ok(true)
    }

    async fn list_branches(&mut self) -> StoreResult<Vec<Branch>> {
        let rows = self.tables.branches.values().cloned().collect();
        Ok(sorted_by_name(rows, |b: &Branch| b.name.as_str()))
    }

    async fn find_branch(&mut self, id: BranchId) -> StoreResult<Option<Branch>> {
        Ok(self.tables.branches.get(&id).cloned())
    }

    async fn find_branch_by_name(&mut self, name: &str) -> StoreResult<Option<Branch>> {
        Ok(self.tables.branches.values().find(|b| b.name == name).cloned())
    }

    async fn insert_branch(&mut self, branch: &Branch) -> StoreResult<()> {
        self.touch().branches.insert(branch.id, branch.clone());
        Ok(())
    }

    async fn delete_branch(&mut self, id: BranchId) -> StoreResult<bool> {
        if !self.tables.branches.contains_key(&id) {
            return Ok(false);
        }
        let tables = self.touch();
        tables.branches.remove(&id);
        tables.stock.retain(|(_, branch_id), _| *branch_id != id);
        tables.movements.retain(|m| m.branch_id != id);
        Ok(true)
    }

    async fn list_products(&mut self) -> StoreResult<Vec<Product>> {
        Ok(self.tables.products.values().cloned().collect())
    }

    async fn find_product(&mut self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.tables.products.get(&id).cloned())
    }

    async fn find_products_by_name(&mut self, name: &str) -> StoreResult<Vec<Product>> {
        // BTreeMap iteration is already id-ordered.
        Ok(self
            .tables
            .products
            .values()
            .filter(|p| p.name == name)
            .cloned()
            .collect())
    }

    async fn find_product_by_code(&mut self, code: &str) -> StoreResult<Option<Product>> {
        Ok(self
            .tables
            .products
            .values()
            .find(|p| p.code.as_deref() == Some(code))
            .cloned())
    }

    async fn insert_product(&mut self, product: &Product) -> StoreResult<()> {
        if self.tables.products.contains_key(&product.id) {
            return Err(StoreError::Constraint(format!("product {} already exists", product.id)));
        }
        self.ensure_code_unique(product)?;
        self.ensure_category_exists(product)?;
        self.touch().products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> StoreResult<()> {
        if !self.tables.products.contains_key(&product.id) {
            return Err(StoreError::Constraint(format!("product {} does not exist", product.id)));
        }
        self.ensure_code_unique(product)?;
        self.ensure_category_exists(product)?;
        self.touch().products.insert(product.id, product.clone());
        Ok(())
    }

    async fn delete_product(&mut self, id: ProductId) -> StoreResult<bool> {
        if !self.tables.products.contains_key(&id) {
            return Ok(false);
        }
        let tables = self.touch();
        tables.products.remove(&id);
        tables.stock.retain(|(product_id, _), _| *product_id != id);
        tables.movements.retain(|m| m.product_id != id);
        Ok(true)
    }

    async fn list_stock(&mut self) -> StoreResult<Vec<StockEntry>> {
        Ok(self.tables.stock.values().cloned().collect())
    }

    async fn find_stock(
        &mut self,
        product_id: ProductId,
        branch_id: BranchId,
    ) -> StoreResult<Option<StockEntry>> {
        Ok(self.tables.stock.get(&(product_id, branch_id)).cloned())
    }

    async fn lock_stock(
        &mut self,
        product_id: ProductId,
        branch_id: BranchId,
    ) -> StoreResult<StockEntry> {
        if let Some(entry) = self.tables.stock.get(&(product_id, branch_id)) {
            return Ok(entry.clone());
        }
        if !self.tables.products.contains_key(&product_id) {
            return Err(StoreError::Constraint(format!(
                "stock entry references missing product {product_id}"
            )));
        }
        if !self.tables.branches.contains_key(&branch_id) {
            return Err(StoreError::Constraint(format!(
                "stock entry references missing branch {branch_id}"
            )));
        }
        // Concurrent writers of the same pair are caught at commit.
        Ok(StockEntry::new(product_id, branch_id))
    }

    async fn save_stock(&mut self, entry: &StockEntry) -> StoreResult<()> {
        if !self.tables.products.contains_key(&entry.product_id) {
            return Err(StoreError::Constraint(format!(
                "stock entry references missing product {}",
                entry.product_id
            )));
        }
        if !self.tables.branches.contains_key(&entry.branch_id) {
            return Err(StoreError::Constraint(format!(
                "stock entry references missing branch {}",
                entry.branch_id
            )));
        }
        let key = (entry.product_id, entry.branch_id);
        let mut entry = entry.clone();
        // The pair is the key; an existing row keeps its identity.
        if let Some(existing) = self.tables.stock.get(&key) {
            entry.id = existing.id;
        }
        self.touch().stock.insert(key, entry);
        Ok(())
    }

    async fn insert_movement(&mut self, movement: &Movement) -> StoreResult<()> {
        self.touch().movements.push(movement.clone());
        Ok(())
    }

    async fn list_movements(&mut self, product_id: ProductId) -> StoreResult<Vec<Movement>> {
        Ok(self
            .tables
            .movements
            .iter()
            .filter(|m| m.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        if self.tables.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Constraint(format!(
                "username '{}' already exists",
                user.username
            )));
        }
        self.touch().users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user_by_username(&mut self, username: &str) -> StoreResult<Option<User>> {
        Ok(self.tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn commit(self) -> StoreResult<()> {
        if !self.dirty {
            return Ok(());
        }

        let mut shared = self
            .shared
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        ExpectedVersion::Exact(self.base_version)
            .check(shared.version)
            .map_err(|e| StoreError::Conflict(e.to_string()))?;

        shared.tables = self.tables;
        shared.version += 1;
        Ok(())
    }
}

impl InMemoryTx {
    fn ensure_code_unique(&self, product: &Product) -> StoreResult<()> {
        let Some(code) = product.code.as_deref() else {
            return Ok(());
        };
        let taken = self
            .tables
            .products
            .values()
            .any(|p| p.id != product.id && p.code.as_deref() == Some(code));
        if taken {
            return Err(StoreError::Constraint(format!("product code '{code}' already exists")));
        }
        Ok(())
    }

    fn ensure_category_exists(&self, product: &Product) -> StoreResult<()> {
        match product.category_id {
            Some(id) if !self.tables.categories.contains_key(&id) => Err(StoreError::Constraint(
                format!("product references missing category {id}"),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventario_products::ProductDraft;

    fn product(name: &str) -> Product {
        Product::create(ProductDraft::new(name, "1").validate().unwrap())
    }

    #[tokio::test]
    async fn writes_are_invisible_until_commit() {
        let store = InMemoryInventoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_category(&Category::new("Tools", None).unwrap()).await.unwrap();

        let mut reader = store.begin().await.unwrap();
        assert!(reader.list_categories().await.unwrap().is_empty());

        tx.commit().await.unwrap();
        let mut reader = store.begin().await.unwrap();
        assert_eq!(reader.list_categories().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = InMemoryInventoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_product(&product("Box")).await.unwrap();
        }
        let mut tx = store.begin().await.unwrap();
        assert!(tx.list_products().await.unwrap().is_empty());
        assert_eq!(store.version(), 0);
    }

    #[tokio::test]
    async fn second_writer_on_same_snapshot_conflicts() {
        let store = InMemoryInventoryStore::new();
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        first.insert_product(&product("A")).await.unwrap();
        second.insert_product(&product("B")).await.unwrap();

        first.commit().await.unwrap();
        assert!(matches!(second.commit().await, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn read_only_transaction_never_conflicts() {
        let store = InMemoryInventoryStore::new();
        let mut reader = store.begin().await.unwrap();
        let mut writer = store.begin().await.unwrap();

        writer.insert_product(&product("A")).await.unwrap();
        writer.commit().await.unwrap();

        reader.list_products().await.unwrap();
        reader.commit().await.unwrap();
    }

    #[tokio::test]
    async fn category_names_and_product_codes_are_unique() {
        let store = InMemoryInventoryStore::new();
        let mut tx = store.begin().await.unwrap();

        tx.insert_category(&Category::new("Tools", None).unwrap()).await.unwrap();
        let dup = tx.insert_category(&Category::new("Tools", None).unwrap()).await;
        assert!(matches!(dup, Err(StoreError::Constraint(_))));

        let mut a = product("A");
        a.code = Some("SKU-1".to_string());
        let mut b = product("B");
        b.code = Some("SKU-1".to_string());
        tx.insert_product(&a).await.unwrap();
        assert!(matches!(tx.insert_product(&b).await, Err(StoreError::Constraint(_))));
    }

    #[tokio::test]
    async fn stock_pair_is_unique_and_keeps_identity() {
        let store = InMemoryInventoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let p = product("Box");
        let branch = Branch::new("Main", None).unwrap();
        tx.insert_product(&p).await.unwrap();
        tx.insert_branch(&branch).await.unwrap();

        let mut first = StockEntry::new(p.id, branch.id);
        first.stock = 4;
        tx.save_stock(&first).await.unwrap();

        let mut second = StockEntry::new(p.id, branch.id);
        second.stock = 9;
        tx.save_stock(&second).await.unwrap();

        let rows = tx.list_stock().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, first.id);
        assert_eq!(rows[0].stock, 9);
    }

    #[tokio::test]
    async fn lock_stock_starts_missing_pairs_from_zero_without_writing() {
        let store = InMemoryInventoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let p = product("Box");
        let branch = Branch::new("Main", None).unwrap();
        tx.insert_product(&p).await.unwrap();
        tx.insert_branch(&branch).await.unwrap();

        let entry = tx.lock_stock(p.id, branch.id).await.unwrap();
        assert_eq!(entry.stock, 0);
        assert!(tx.list_stock().await.unwrap().is_empty());
        assert!(matches!(
            tx.lock_stock(p.id, BranchId::new()).await,
            Err(StoreError::Constraint(_))
        ));

        let mut entry = entry;
        entry.stock = 3;
        tx.save_stock(&entry).await.unwrap();
        assert_eq!(tx.lock_stock(p.id, branch.id).await.unwrap(), entry);
    }

    #[tokio::test]
    async fn deleting_branch_cascades_stock() {
        let store = InMemoryInventoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let p = product("Box");
        let branch = Branch::new("Main", None).unwrap();
        tx.insert_product(&p).await.unwrap();
        tx.insert_branch(&branch).await.unwrap();
        tx.save_stock(&StockEntry::new(p.id, branch.id)).await.unwrap();

        assert!(tx.delete_branch(branch.id).await.unwrap());
        assert!(tx.list_stock().await.unwrap().is_empty());
        assert!(!tx.delete_branch(branch.id).await.unwrap());
    }
}
