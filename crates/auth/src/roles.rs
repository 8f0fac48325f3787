use core::str::FromStr;

use serde::{Deserialize, Serialize};

use inventario_core::DomainError;

/// Role attached to a user account.
///
/// Stored with the account only; no operation checks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Admin,
    Warehouse,
    ReadOnly,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Warehouse => "warehouse",
            Role::ReadOnly => "read-only",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "warehouse" => Ok(Role::Warehouse),
            "read-only" | "readonly" | "read_only" => Ok(Role::ReadOnly),
            other => Err(DomainError::validation(format!(
                "role must be one of: admin, warehouse, read-only (got '{other}')"
            ))),
        }
    }
}
