//! Inventory operations.
//!
//! [`InventoryService`] owns the update rules that keep products, categories,
//! branches and stock consistent. Every public operation runs in exactly one
//! store transaction: validation happens before the first write, and nothing
//! is committed when any step fails.

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use inventario_auth::{Role, User};
use inventario_core::{BranchId, CategoryId, DomainError, Entity, ProductId, UserId};
use inventario_inventory::{
    Branch, Movement, NegativeStockPolicy, StockChange, StockEntry, parse_quantity,
};
use inventario_products::{Category, Product, ProductDraft, normalize_category_name};

use crate::query::{ProductFilter, ProductListing, compose_listing};
use crate::store::{InventoryStore, StoreError, StoreTx};

pub type InventoryResult<T> = Result<T, InventoryError>;

/// Error returned by inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A required import column is absent from the header row.
    #[error("missing column '{0}'")]
    MissingColumn(String),

    /// The tabular file could not be read or written.
    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),
}

impl From<csv::Error> for InventoryError {
    fn from(value: csv::Error) -> Self {
        InventoryError::Spreadsheet(value.to_string())
    }
}

impl InventoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, InventoryError::Domain(DomainError::NotFound { .. }))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, InventoryError::Domain(e) if e.is_validation())
    }
}

/// Create-product input. Numbers arrive as text, straight from a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductForm {
    pub product: ProductDraft,
    /// Initial stock at `branch_id`.
    pub stock: String,
    pub branch_id: BranchId,
}

impl ProductForm {
    pub fn new(
        name: impl Into<String>,
        price: impl Into<String>,
        stock: impl Into<String>,
        branch_id: BranchId,
    ) -> Self {
        Self {
            product: ProductDraft::new(name, price),
            stock: stock.into(),
            branch_id,
        }
    }

    pub fn with_category(mut self, category_id: Option<CategoryId>) -> Self {
        self.product.category_id = category_id;
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.product = self.product.with_code(code);
        self
    }
}

/// What [`InventoryService::ensure_seeded`] had to create.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub categories_created: usize,
    pub branches_created: usize,
}

/// Inventory operations over an injected store.
#[derive(Debug, Clone)]
pub struct InventoryService<S> {
    store: S,
    policy: NegativeStockPolicy,
}

impl<S: InventoryStore> InventoryService<S> {
    /// Service with the default negative-stock policy (reject).
    pub fn new(store: S) -> Self {
        Self::with_policy(store, NegativeStockPolicy::default())
    }

    pub fn with_policy(store: S, policy: NegativeStockPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> NegativeStockPolicy {
        self.policy
    }

    /// Create the named categories and branches that do not exist yet.
    ///
    /// Idempotent; never updates or deletes. Blank names are skipped.
    #[instrument(skip_all)]
    pub async fn ensure_seeded(
        &self,
        categories: &[impl AsRef<str> + Sync],
        branches: &[impl AsRef<str> + Sync],
    ) -> InventoryResult<SeedReport> {
        let mut tx = self.store.begin().await?;
        let mut report = SeedReport::default();

        for raw in categories {
            let Ok(name) = normalize_category_name(raw.as_ref()) else {
                warn!(kind = "category", "skipping blank seed name");
                continue;
            };
            if tx.find_category_by_name(&name).await?.is_none() {
                tx.insert_category(&Category::new(&name, None)?).await?;
                report.categories_created += 1;
            }
        }

        for raw in branches {
            let Ok(branch) = Branch::new(raw.as_ref(), None) else {
                warn!(kind = "branch", "skipping blank seed name");
                continue;
            };
            if tx.find_branch_by_name(&branch.name).await?.is_none() {
                tx.insert_branch(&branch).await?;
                report.branches_created += 1;
            }
        }

        tx.commit().await?;
        info!(
            categories_created = report.categories_created,
            branches_created = report.branches_created,
            "seed data ensured"
        );
        Ok(report)
    }

    // --- categories ---

    /// Create a category, or return the existing one with the same name.
    #[instrument(skip(self, description))]
    pub async fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> InventoryResult<Category> {
        let category = Category::new(name, description)?;

        let mut tx = self.store.begin().await?;
        if let Some(existing) = tx.find_category_by_name(&category.name).await? {
            debug!(category_id = %existing.id, "category already exists");
            return Ok(existing);
        }
        tx.insert_category(&category).await?;
        tx.commit().await?;

        info!(category_id = %category.id, name = %category.name, "category created");
        Ok(category)
    }

    pub async fn list_categories(&self) -> InventoryResult<Vec<Category>> {
        let mut tx = self.store.begin().await?;
        let categories = tx.list_categories().await?;
        tx.commit().await?;
        Ok(categories)
    }

    pub async fn find_category_by_name(&self, name: &str) -> InventoryResult<Option<Category>> {
        let mut tx = self.store.begin().await?;
        let category = tx.find_category_by_name(name.trim()).await?;
        tx.commit().await?;
        Ok(category)
    }

    /// Delete a category. Its products stay, without a category.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: CategoryId) -> InventoryResult<()> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_category(id).await? {
            return Err(DomainError::not_found(Category::KIND, id).into());
        }
        tx.commit().await?;
        info!(category_id = %id, "category deleted");
        Ok(())
    }

    // --- branches ---

    #[instrument(skip(self, address))]
    pub async fn create_branch(&self, name: &str, address: Option<&str>) -> InventoryResult<Branch> {
        let branch = Branch::new(name, address)?;
        let mut tx = self.store.begin().await?;
        tx.insert_branch(&branch).await?;
        tx.commit().await?;
        info!(branch_id = %branch.id, name = %branch.name, "branch created");
        Ok(branch)
    }

    pub async fn list_branches(&self) -> InventoryResult<Vec<Branch>> {
        let mut tx = self.store.begin().await?;
        let branches = tx.list_branches().await?;
        tx.commit().await?;
        Ok(branches)
    }

    pub async fn find_branch_by_name(&self, name: &str) -> InventoryResult<Option<Branch>> {
        let mut tx = self.store.begin().await?;
        let branch = tx.find_branch_by_name(name.trim()).await?;
        tx.commit().await?;
        Ok(branch)
    }

    /// Delete a branch together with its stock entries and movements.
    #[instrument(skip(self))]
    pub async fn delete_branch(&self, id: BranchId) -> InventoryResult<()> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_branch(id).await? {
            return Err(DomainError::not_found(Branch::KIND, id).into());
        }
        tx.commit().await?;
        info!(branch_id = %id, "branch deleted");
        Ok(())
    }

    // --- products ---

    /// Create a product with its initial stock at one branch.
    #[instrument(skip_all, fields(branch_id = %form.branch_id))]
    pub async fn create_product(&self, form: ProductForm) -> InventoryResult<Product> {
        let details = form.product.validate()?;
        let initial = parse_quantity(&form.stock)?;

        let mut tx = self.store.begin().await?;
        ensure_category(&mut tx, details.category_id).await?;
        ensure_branch(&mut tx, form.branch_id).await?;
        if let Some(code) = details.code.as_deref() {
            if tx.find_product_by_code(code).await?.is_some() {
                return Err(DomainError::conflict(format!("product code '{code}' already exists")).into());
            }
        }

        let product = Product::create(details);
        let mut entry = StockEntry::new(product.id, form.branch_id);
        let delta = entry.apply(StockChange::Set(initial), self.policy)?;

        tx.insert_product(&product).await?;
        tx.save_stock(&entry).await?;
        record_movement(&mut tx, &entry, delta, None).await?;
        tx.commit().await?;

        info!(product_id = %product.id, name = %product.name, stock = initial, "product created");
        Ok(product)
    }

    /// Replace the editable attributes of a product. Stock is untouched.
    #[instrument(skip(self, draft))]
    pub async fn update_product(&self, id: ProductId, draft: ProductDraft) -> InventoryResult<Product> {
        let details = draft.validate()?;

        let mut tx = self.store.begin().await?;
        let mut product = tx
            .find_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found(Product::KIND, id))?;
        ensure_category(&mut tx, details.category_id).await?;
        if let Some(code) = details.code.as_deref() {
            if let Some(other) = tx.find_product_by_code(code).await? {
                if other.id != id {
                    return Err(DomainError::conflict(format!("product code '{code}' already exists")).into());
                }
            }
        }

        product.apply(details);
        tx.update_product(&product).await?;
        tx.commit().await?;

        info!(product_id = %id, "product updated");
        Ok(product)
    }

    /// Change the stock of a product at a branch, absolutely or relatively.
    ///
    /// A missing entry for the pair is created from zero first. Every
    /// non-zero change leaves a movement.
    #[instrument(skip(self))]
    pub async fn update_stock(
        &self,
        product_id: ProductId,
        branch_id: BranchId,
        change: StockChange,
        actor: Option<UserId>,
    ) -> InventoryResult<StockEntry> {
        let mut tx = self.store.begin().await?;
        if tx.find_product(product_id).await?.is_none() {
            return Err(DomainError::not_found(Product::KIND, product_id).into());
        }
        ensure_branch(&mut tx, branch_id).await?;

        let entry = apply_stock_change(&mut tx, product_id, branch_id, change, self.policy, actor).await?;
        tx.commit().await?;

        info!(stock = entry.stock, "stock updated");
        Ok(entry)
    }

    /// Delete a product with its stock entries and movements.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> InventoryResult<()> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_product(id).await? {
            return Err(DomainError::not_found(Product::KIND, id).into());
        }
        tx.commit().await?;
        info!(product_id = %id, "product deleted");
        Ok(())
    }

    pub async fn find_product(&self, id: ProductId) -> InventoryResult<Product> {
        let mut tx = self.store.begin().await?;
        let product = tx
            .find_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found(Product::KIND, id))?;
        tx.commit().await?;
        Ok(product)
    }

    pub async fn list_products(&self, filter: &ProductFilter) -> InventoryResult<ProductListing> {
        let mut tx = self.store.begin().await?;
        let listing = load_listing(&mut tx, filter).await?;
        tx.commit().await?;
        Ok(listing)
    }

    /// Audit trail of a product, oldest first.
    pub async fn movements(&self, product_id: ProductId) -> InventoryResult<Vec<Movement>> {
        let mut tx = self.store.begin().await?;
        if tx.find_product(product_id).await?.is_none() {
            return Err(DomainError::not_found(Product::KIND, product_id).into());
        }
        let movements = tx.list_movements(product_id).await?;
        tx.commit().await?;
        Ok(movements)
    }

    // --- users ---

    /// Store a user account. Accounts are kept for attribution only.
    #[instrument(skip(self, password_hash))]
    pub async fn register_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> InventoryResult<User> {
        let user = User::new(username, password_hash, role)?;

        let mut tx = self.store.begin().await?;
        if tx.find_user_by_username(&user.username).await?.is_some() {
            return Err(DomainError::conflict(format!(
                "username '{}' already exists",
                user.username
            ))
            .into());
        }
        tx.insert_user(&user).await?;
        tx.commit().await?;

        info!(user_id = %user.id, role = %user.role, "user registered");
        Ok(user)
    }
}

pub(crate) async fn ensure_category<T: StoreTx>(
    tx: &mut T,
    category_id: Option<CategoryId>,
) -> InventoryResult<()> {
    if let Some(id) = category_id {
        if tx.find_category(id).await?.is_none() {
            return Err(DomainError::not_found(Category::KIND, id).into());
        }
    }
    Ok(())
}

pub(crate) async fn ensure_branch<T: StoreTx>(tx: &mut T, branch_id: BranchId) -> InventoryResult<Branch> {
    tx.find_branch(branch_id)
        .await?
        .ok_or_else(|| DomainError::not_found(Branch::KIND, branch_id).into())
}

/// Apply `change` to the pair's entry (created from zero if absent), save it
/// and record the movement.
pub(crate) async fn apply_stock_change<T: StoreTx>(
    tx: &mut T,
    product_id: ProductId,
    branch_id: BranchId,
    change: StockChange,
    policy: NegativeStockPolicy,
    actor: Option<UserId>,
) -> InventoryResult<StockEntry> {
    let mut entry = tx.lock_stock(product_id, branch_id).await?;
    let delta = entry.apply(change, policy)?;

    tx.save_stock(&entry).await?;
    record_movement(tx, &entry, delta, actor).await?;
    Ok(entry)
}

async fn record_movement<T: StoreTx>(
    tx: &mut T,
    entry: &StockEntry,
    delta: i64,
    actor: Option<UserId>,
) -> InventoryResult<()> {
    if let Some(movement) =
        Movement::from_delta(entry.product_id, entry.branch_id, delta, Utc::now(), actor)?
    {
        debug!(kind = movement.kind.as_str(), quantity = movement.quantity, "movement recorded");
        tx.insert_movement(&movement).await?;
    }
    Ok(())
}

pub(crate) async fn load_listing<T: StoreTx>(
    tx: &mut T,
    filter: &ProductFilter,
) -> InventoryResult<ProductListing> {
    let products = tx.list_products().await?;
    let categories = tx.list_categories().await?;
    let branches = tx.list_branches().await?;
    let stock = tx.list_stock().await?;
    Ok(compose_listing(filter, products, &categories, &branches, &stock))
}
