//! `inventario` command-line host.
//!
//! Every command seeds the configured categories and branches first, then
//! runs one inventory operation and prints its result (JSON for records).

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use inventario_core::ProductId;
use inventario_infra::{
    ImportOptions, InventoryConfig, InventoryService, InventoryStore, ProductFilter, ProductForm,
};
use inventario_inventory::StockChange;

#[derive(Debug, Parser)]
#[command(name = "inventario")]
#[command(about = "Inventory management: products, categories and branch stock")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the configured categories and branches
    Seed,

    /// List categories
    Categories,

    /// Create a category (returns the existing one on a name match)
    AddCategory {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },

    /// List branches
    Branches,

    /// Create a branch
    AddBranch {
        name: String,
        #[arg(long)]
        address: Option<String>,
    },

    /// List products with their stock
    List(FilterArgs),

    /// Create a product with its initial stock
    AddProduct {
        #[arg(long)]
        name: String,
        #[arg(long)]
        price: String,
        #[arg(long, allow_hyphen_values = true)]
        stock: String,
        /// Category name
        #[arg(long)]
        category: Option<String>,
        /// Branch name (default: the configured default branch)
        #[arg(long)]
        branch: Option<String>,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        supplier: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },

    /// Set or adjust the stock of a product at a branch
    Stock {
        product_id: ProductId,
        /// Branch name (default: the configured default branch)
        #[arg(long)]
        branch: Option<String>,
        /// Absolute quantity
        #[arg(long, allow_hyphen_values = true, conflicts_with = "adjust", required_unless_present = "adjust")]
        set: Option<i64>,
        /// Signed delta
        #[arg(long, allow_hyphen_values = true)]
        adjust: Option<i64>,
    },

    /// Delete a product with its stock and movements
    DeleteProduct { product_id: ProductId },

    /// Show the stock movements of a product
    Movements { product_id: ProductId },

    /// Import products from a CSV file
    Import {
        file: PathBuf,
        /// Branch for rows without a Branch cell (default: the configured default branch)
        #[arg(long)]
        branch: Option<String>,
    },

    /// Export products to CSV
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        /// Output file (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Category name
    #[arg(long)]
    pub category: Option<String>,
    /// Branch name
    #[arg(long)]
    pub branch: Option<String>,
    /// Case-insensitive name substring
    #[arg(long)]
    pub name: Option<String>,
    /// One row per product with stock summed over branches
    #[arg(long)]
    pub per_product: bool,
}

/// Seed, then run `command` against `service`, writing results to `out`.
pub async fn run<S, W>(
    service: &InventoryService<S>,
    config: &InventoryConfig,
    command: Command,
    out: &mut W,
) -> anyhow::Result<()>
where
    S: InventoryStore,
    W: Write,
{
    service
        .ensure_seeded(
            config.seed_categories.as_slice(),
            config.seed_branches.as_slice(),
        )
        .await
        .context("seeding failed")?;

    match command {
        Command::Seed => {
            let categories = service.list_categories().await?;
            let branches = service.list_branches().await?;
            writeln!(
                out,
                "{} categories, {} branches",
                categories.len(),
                branches.len()
            )?;
        }
        Command::Categories => print_json(out, &service.list_categories().await?)?,
        Command::AddCategory { name, description } => {
            let category = service.create_category(&name, description.as_deref()).await?;
            print_json(out, &category)?;
        }
        Command::Branches => print_json(out, &service.list_branches().await?)?,
        Command::AddBranch { name, address } => {
            let branch = service.create_branch(&name, address.as_deref()).await?;
            print_json(out, &branch)?;
        }
        Command::List(args) => {
            let filter = resolve_filter(service, &args).await?;
            print_json(out, &service.list_products(&filter).await?)?;
        }
        Command::AddProduct {
            name,
            price,
            stock,
            category,
            branch,
            code,
            description,
            supplier,
            status,
        } => {
            let branch = resolve_branch(service, config, branch.as_deref()).await?;
            let category_id = match category.as_deref() {
                Some(name) => Some(resolve_category(service, name).await?),
                None => None,
            };

            let mut form = ProductForm::new(name, price, stock, branch).with_category(category_id);
            form.product.code = code;
            form.product.description = description;
            form.product.supplier = supplier;
            form.product.status = status;

            print_json(out, &service.create_product(form).await?)?;
        }
        Command::Stock {
            product_id,
            branch,
            set,
            adjust,
        } => {
            let branch = resolve_branch(service, config, branch.as_deref()).await?;
            let change = match (set, adjust) {
                (Some(quantity), _) => StockChange::Set(quantity),
                (None, Some(delta)) => StockChange::Adjust(delta),
                (None, None) => bail!("either --set or --adjust is required"),
            };
            let entry = service.update_stock(product_id, branch, change, None).await?;
            print_json(out, &entry)?;
        }
        Command::DeleteProduct { product_id } => {
            service.delete_product(product_id).await?;
            writeln!(out, "deleted {product_id}")?;
        }
        Command::Movements { product_id } => {
            print_json(out, &service.movements(product_id).await?)?;
        }
        Command::Import { file, branch } => {
            let branch = resolve_branch(service, config, branch.as_deref()).await?;
            let reader = std::fs::File::open(&file)
                .with_context(|| format!("cannot open {}", file.display()))?;
            let report = service
                .import_csv(reader, &ImportOptions::new(branch))
                .await?;
            print_json(out, &report)?;
        }
        Command::Export { filter, output } => {
            let filter = resolve_filter(service, &filter).await?;
            let table = service.export_table(&filter).await?;
            let bytes = table.to_csv()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &bytes)
                        .with_context(|| format!("cannot write {}", path.display()))?;
                    writeln!(out, "{} rows written to {}", table.rows.len(), path.display())?;
                }
                None => out.write_all(&bytes)?,
            }
        }
    }
    Ok(())
}

fn print_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

async fn resolve_category<S: InventoryStore>(
    service: &InventoryService<S>,
    name: &str,
) -> anyhow::Result<inventario_core::CategoryId> {
    service
        .find_category_by_name(name)
        .await?
        .map(|c| c.id)
        .ok_or_else(|| anyhow!("unknown category '{name}'"))
}

async fn resolve_branch<S: InventoryStore>(
    service: &InventoryService<S>,
    config: &InventoryConfig,
    name: Option<&str>,
) -> anyhow::Result<inventario_core::BranchId> {
    let name = name.unwrap_or(&config.default_branch);
    service
        .find_branch_by_name(name)
        .await?
        .map(|b| b.id)
        .ok_or_else(|| anyhow!("unknown branch '{name}'"))
}

async fn resolve_filter<S: InventoryStore>(
    service: &InventoryService<S>,
    args: &FilterArgs,
) -> anyhow::Result<ProductFilter> {
    let mut filter = if args.per_product {
        ProductFilter::per_product()
    } else {
        ProductFilter::default()
    };
    if let Some(name) = args.category.as_deref() {
        filter = filter.with_category(resolve_category(service, name).await?);
    }
    if let Some(name) = args.branch.as_deref() {
        let branch = service
            .find_branch_by_name(name)
            .await?
            .ok_or_else(|| anyhow!("unknown branch '{name}'"))?;
        filter = filter.with_branch(branch.id);
    }
    filter.name_contains = args.name.clone();
    Ok(filter)
}
