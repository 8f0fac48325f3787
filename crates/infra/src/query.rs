//! Product listings: filtering, shaping and ordering.
//!
//! Composition is pure. The service loads the tables inside one transaction
//! and hands them to [`compose_listing`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use inventario_core::{BranchId, CategoryId, ProductId};
use inventario_inventory::{Branch, StockEntry};
use inventario_products::{Category, Product};

/// How rows of a listing relate to stock entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingShape {
    /// One row per (product, branch) stock entry.
    #[default]
    PerBranch,
    /// One row per product, stock summed over branches.
    PerProduct,
}

/// Conjunctive product filter. `None` fields impose no restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    pub branch_id: Option<BranchId>,
    /// Case-insensitive substring of the product name.
    pub name_contains: Option<String>,
    pub shape: ListingShape,
}

impl ProductFilter {
    pub fn per_product() -> Self {
        Self {
            shape: ListingShape::PerProduct,
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_branch(mut self, branch_id: BranchId) -> Self {
        self.branch_id = Some(branch_id);
        self
    }

    pub fn with_name(mut self, needle: impl Into<String>) -> Self {
        self.name_contains = Some(needle.into());
        self
    }

    /// Product-level part of the filter (category and name).
    fn admits(&self, product: &Product) -> bool {
        if self.category_id.is_some() && product.category_id != self.category_id {
            return false;
        }
        match self.name_contains.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => product
                .name
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            _ => true,
        }
    }
}

/// One line of a product listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRow {
    pub product: Product,
    pub category: Option<Category>,
    /// `None` for a product without stock entries, and for
    /// [`ListingShape::PerProduct`] rows without a branch filter.
    pub branch: Option<Branch>,
    pub stock: i64,
}

impl ProductRow {
    pub fn category_name(&self) -> Option<&str> {
        self.category.as_ref().map(|c| c.name.as_str())
    }

    pub fn branch_name(&self) -> Option<&str> {
        self.branch.as_ref().map(|b| b.name.as_str())
    }
}

/// Result of a listing query; carries the shape it was built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductListing {
    pub shape: ListingShape,
    pub rows: Vec<ProductRow>,
}

impl ProductListing {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct product ids, in listing order.
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            if !ids.contains(&row.product.id) {
                ids.push(row.product.id);
            }
        }
        ids
    }
}

/// Build a listing from loaded tables.
///
/// Rows are ordered by product name (case-insensitive), product id, branch
/// name and branch id, so repeated queries over the same data agree.
pub fn compose_listing(
    filter: &ProductFilter,
    products: Vec<Product>,
    categories: &[Category],
    branches: &[Branch],
    stock: &[StockEntry],
) -> ProductListing {
    let categories: HashMap<CategoryId, &Category> =
        categories.iter().map(|c| (c.id, c)).collect();
    let branches: HashMap<BranchId, &Branch> = branches.iter().map(|b| (b.id, b)).collect();

    let mut entries_by_product: HashMap<ProductId, Vec<&StockEntry>> = HashMap::new();
    for entry in stock {
        if !branches.contains_key(&entry.branch_id) {
            continue;
        }
        if filter.branch_id.is_some_and(|b| b != entry.branch_id) {
            continue;
        }
        entries_by_product
            .entry(entry.product_id)
            .or_default()
            .push(entry);
    }

    let mut rows = Vec::new();
    for product in products.into_iter().filter(|p| filter.admits(p)) {
        let category = product
            .category_id
            .and_then(|id| categories.get(&id))
            .map(|c| (*c).clone());
        let entries = entries_by_product.remove(&product.id).unwrap_or_default();

        if entries.is_empty() && filter.branch_id.is_some() {
            continue;
        }

        match filter.shape {
            ListingShape::PerBranch if entries.is_empty() => rows.push(ProductRow {
                product,
                category,
                branch: None,
                stock: 0,
            }),
            ListingShape::PerBranch => {
                for entry in entries {
                    rows.push(ProductRow {
                        product: product.clone(),
                        category: category.clone(),
                        branch: branches.get(&entry.branch_id).map(|b| (*b).clone()),
                        stock: entry.stock,
                    });
                }
            }
            ListingShape::PerProduct => {
                let stock = entries
                    .iter()
                    .fold(0i64, |total, e| total.saturating_add(e.stock));
                let branch = filter
                    .branch_id
                    .and_then(|id| branches.get(&id))
                    .map(|b| (*b).clone());
                rows.push(ProductRow {
                    product,
                    category,
                    branch,
                    stock,
                });
            }
        }
    }

    rows.sort_by(|a, b| {
        a.product
            .name
            .to_lowercase()
            .cmp(&b.product.name.to_lowercase())
            .then_with(|| a.product.id.cmp(&b.product.id))
            .then_with(|| a.branch_name().cmp(&b.branch_name()))
            .then_with(|| {
                a.branch
                    .as_ref()
                    .map(|b| b.id)
                    .cmp(&b.branch.as_ref().map(|b| b.id))
            })
    });

    ProductListing {
        shape: filter.shape,
        rows,
    }
}
