use serde::{Deserialize, Serialize};

use inventario_core::{BranchId, DomainError, DomainResult, Entity};

/// A physical location holding its own stock of products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    pub address: Option<String>,
}

impl Branch {
    pub fn new(name: &str, address: Option<&str>) -> DomainResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("branch name cannot be empty"));
        }
        let address = address
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        Ok(Self {
            id: BranchId::new(),
            name: name.to_string(),
            address,
        })
    }
}

impl Entity for Branch {
    type Id = BranchId;
    const KIND: &'static str = "branch";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_fields() {
        let branch = Branch::new(" Centro ", Some(" Av. 1 ")).unwrap();
        assert_eq!(branch.name, "Centro");
        assert_eq!(branch.address.as_deref(), Some("Av. 1"));
    }

    #[test]
    fn rejects_blank_name() {
        assert!(matches!(Branch::new("  ", None), Err(DomainError::Validation(_))));
    }
}
