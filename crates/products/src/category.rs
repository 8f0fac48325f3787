use serde::{Deserialize, Serialize};

use inventario_core::{CategoryId, DomainError, DomainResult, Entity};

/// Label used in tabular exports for products without a category.
///
/// Imports map it back to "no category".
pub const NO_CATEGORY: &str = "No category";

/// A named grouping of products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
}

impl Category {
    /// Build a new category from user input.
    ///
    /// The name is trimmed and must not be empty.
    pub fn new(name: &str, description: Option<&str>) -> DomainResult<Self> {
        Ok(Self {
            id: CategoryId::new(),
            name: normalize_category_name(name)?,
            description: description.and_then(non_blank),
        })
    }
}

impl Entity for Category {
    type Id = CategoryId;
    const KIND: &'static str = "category";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Trim a category name, rejecting blank input.
pub fn normalize_category_name(raw: &str) -> DomainResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DomainError::validation("category name cannot be empty"));
    }
    Ok(name.to_string())
}

/// Interpret a tabular category cell.
///
/// Blank cells and the [`NO_CATEGORY`] label mean the product has no category.
pub fn category_cell(raw: &str) -> Option<&str> {
    let name = raw.trim();
    if name.is_empty() || name == NO_CATEGORY {
        None
    } else {
        Some(name)
    }
}

pub(crate) fn non_blank(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_name_and_description() {
        let category = Category::new("  Tools ", Some("  hand tools ")).unwrap();
        assert_eq!(category.name, "Tools");
        assert_eq!(category.description.as_deref(), Some("hand tools"));
    }

    #[test]
    fn blank_description_becomes_none() {
        let category = Category::new("Tools", Some("   ")).unwrap();
        assert_eq!(category.description, None);
    }

    #[test]
    fn rejects_blank_name() {
        let err = Category::new("   ", None).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn category_cell_understands_sentinel() {
        assert_eq!(category_cell(" Paint "), Some("Paint"));
        assert_eq!(category_cell(""), None);
        assert_eq!(category_cell(NO_CATEGORY), None);
    }
}
