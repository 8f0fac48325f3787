//! Environment-driven configuration.
//!
//! Values are read through a lookup function so tests can feed a map instead
//! of touching the process environment.

use thiserror::Error;
use tracing::warn;

use inventario_inventory::NegativeStockPolicy;

pub const DATABASE_URL: &str = "INVENTARIO_DATABASE_URL";
pub const FALLBACK_DATABASE_URL: &str = "DATABASE_URL";
pub const SEED_CATEGORIES: &str = "INVENTARIO_SEED_CATEGORIES";
pub const SEED_BRANCHES: &str = "INVENTARIO_SEED_BRANCHES";
pub const NEGATIVE_STOCK: &str = "INVENTARIO_NEGATIVE_STOCK";
pub const DEFAULT_BRANCH: &str = "INVENTARIO_DEFAULT_BRANCH";
pub const MAX_CONNECTIONS: &str = "INVENTARIO_MAX_CONNECTIONS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Runtime settings of an inventory host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryConfig {
    /// PostgreSQL URL. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub seed_categories: Vec<String>,
    pub seed_branches: Vec<String>,
    pub negative_stock: NegativeStockPolicy,
    /// Branch used for imports that do not name one.
    pub default_branch: String,
    pub max_connections: u32,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            seed_categories: vec!["General".to_string()],
            seed_branches: vec!["Main".to_string()],
            negative_stock: NegativeStockPolicy::default(),
            default_branch: "Main".to_string(),
            max_connections: 5,
        }
    }
}

impl InventoryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let database_url = get(DATABASE_URL).or_else(|| get(FALLBACK_DATABASE_URL));
        if database_url.is_none() {
            warn!("no database url configured, using the in-memory store");
        }

        let seed_categories = get(SEED_CATEGORIES)
            .map(|v| split_list(&v))
            .unwrap_or(defaults.seed_categories);
        let seed_branches = get(SEED_BRANCHES)
            .map(|v| split_list(&v))
            .unwrap_or(defaults.seed_branches);

        let negative_stock = match get(NEGATIVE_STOCK) {
            Some(raw) => raw.parse().map_err(|e: inventario_core::DomainError| {
                ConfigError::Invalid {
                    key: NEGATIVE_STOCK,
                    message: e.to_string(),
                }
            })?,
            None => defaults.negative_stock,
        };

        let default_branch = get(DEFAULT_BRANCH)
            .map(|v| v.trim().to_string())
            .or_else(|| seed_branches.first().cloned())
            .unwrap_or(defaults.default_branch);

        let max_connections = match get(MAX_CONNECTIONS) {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: MAX_CONNECTIONS,
                        message: format!("expected a positive integer, got '{raw}'"),
                    });
                }
            },
            None => defaults.max_connections,
        };

        Ok(Self {
            database_url,
            seed_categories,
            seed_branches,
            negative_stock,
            default_branch,
            max_connections,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
