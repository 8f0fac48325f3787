//! Products domain module.
//!
//! Catalog records (categories, products, prices) and their validation rules,
//! implemented as deterministic domain logic (no IO, no storage).

pub mod category;
pub mod product;

pub use category::{Category, NO_CATEGORY, category_cell, normalize_category_name};
pub use product::{Price, Product, ProductDetails, ProductDraft, ProductStatus};
