use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use inventario_core::{CategoryId, DomainError, DomainResult, Entity, ProductId, ValueObject};

use crate::category::non_blank;

/// Unit price of a product: non-negative, two fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl ValueObject for Price {}

impl Price {
    /// Number of fractional digits kept.
    pub const SCALE: u32 = 2;
    /// Digits allowed before the decimal point.
    pub const MAX_WHOLE_DIGITS: u32 = 12;

    pub fn new(amount: Decimal) -> DomainResult<Self> {
        if amount.is_zero() {
            return Ok(Self(Decimal::ZERO));
        }
        if amount.is_sign_negative() {
            return Err(DomainError::validation(format!(
                "price cannot be negative (got {amount})"
            )));
        }
        let rounded = amount.round_dp_with_strategy(Self::SCALE, RoundingStrategy::MidpointAwayFromZero);
        if rounded >= Self::limit() {
            return Err(DomainError::validation(format!(
                "price must be below {} (got {amount})",
                Self::limit()
            )));
        }
        Ok(Self(rounded))
    }

    /// Exclusive upper bound: prices have at most `MAX_WHOLE_DIGITS` digits
    /// before the decimal point, matching the `NUMERIC(14, 2)` column.
    fn limit() -> Decimal {
        Decimal::from(10i64.pow(Self::MAX_WHOLE_DIGITS))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Parse a price typed into a form or read from a spreadsheet cell.
    ///
    /// Accepts plain decimals ("12.5") and scientific notation ("1.25e1").
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(DomainError::validation("price is required"));
        }
        let amount = Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .map_err(|_| DomainError::validation(format!("price must be a number (got '{text}')")))?;
        Self::new(amount)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }
}

impl core::fmt::Display for Price {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut amount = self.0;
        amount.rescale(Self::SCALE);
        write!(f, "{amount}")
    }
}

/// Product status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::Inactive => "inactive",
        }
    }
}

impl core::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(ProductStatus::Active),
            "inactive" => Ok(ProductStatus::Inactive),
            other => Err(DomainError::validation(format!(
                "status must be one of: active, inactive (got '{other}')"
            ))),
        }
    }
}

/// Raw product attributes as submitted by a form or a caller.
///
/// Numbers arrive as text; nothing here is trusted until [`ProductDraft::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub price: String,
    pub code: Option<String>,
    pub description: Option<String>,
    pub supplier: Option<String>,
    pub status: Option<String>,
    pub category_id: Option<CategoryId>,
}

impl ProductDraft {
    pub fn new(name: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price: price.into(),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category_id: Option<CategoryId>) -> Self {
        self.category_id = category_id;
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Validate every field, returning the typed attributes.
    ///
    /// Referential checks (does the category exist, is the code unique) need
    /// the store and are done by the caller.
    pub fn validate(&self) -> DomainResult<ProductDetails> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        let status = match self.status.as_deref().and_then(non_blank) {
            Some(raw) => raw.parse()?,
            None => ProductStatus::default(),
        };

        Ok(ProductDetails {
            name: name.to_string(),
            price: Price::parse(&self.price)?,
            code: self.code.as_deref().and_then(non_blank),
            description: self.description.as_deref().and_then(non_blank),
            supplier: self.supplier.as_deref().and_then(non_blank),
            status,
            category_id: self.category_id,
        })
    }
}

/// Validated product attributes (everything but identity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDetails {
    pub name: String,
    pub price: Price,
    pub code: Option<String>,
    pub description: Option<String>,
    pub supplier: Option<String>,
    pub status: ProductStatus,
    pub category_id: Option<CategoryId>,
}

/// A sellable item. Stock is tracked per branch, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
    pub supplier: Option<String>,
    pub price: Price,
    pub status: ProductStatus,
    pub category_id: Option<CategoryId>,
}

impl Product {
    pub fn create(details: ProductDetails) -> Self {
        let mut product = Self {
            id: ProductId::new(),
            name: String::new(),
            code: None,
            description: None,
            supplier: None,
            price: Price::zero(),
            status: ProductStatus::Active,
            category_id: None,
        };
        product.apply(details);
        product
    }

    /// Replace all editable attributes.
    pub fn apply(&mut self, details: ProductDetails) {
        self.name = details.name;
        self.code = details.code;
        self.description = details.description;
        self.supplier = details.supplier;
        self.price = details.price;
        self.status = details.status;
        self.category_id = details.category_id;
    }

    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }
}

impl Entity for Product {
    type Id = ProductId;
    const KIND: &'static str = "product";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str, price: &str) -> ProductDraft {
        ProductDraft::new(name, price)
    }

    #[test]
    fn price_parses_and_rounds_to_cents() {
        let price = Price::parse(" 12.345 ").unwrap();
        assert_eq!(price.amount(), Decimal::new(1235, 2));
        assert_eq!(price.to_string(), "12.35");
    }

    #[test]
    fn price_display_keeps_two_digits() {
        assert_eq!(Price::parse("7").unwrap().to_string(), "7.00");
        assert_eq!(Price::parse("0.5").unwrap().to_string(), "0.50");
    }

    #[test]
    fn price_accepts_scientific_notation() {
        assert_eq!(Price::parse("1.25e1").unwrap().amount(), Decimal::new(125, 1));
    }

    #[test]
    fn price_rejects_negative_and_garbage() {
        assert!(matches!(Price::parse("-1"), Err(DomainError::Validation(_))));
        assert!(matches!(Price::parse("abc"), Err(DomainError::Validation(_))));
        assert!(matches!(Price::parse("  "), Err(DomainError::Validation(_))));
    }

    #[test]
    fn price_fits_twelve_whole_digits() {
        assert_eq!(
            Price::parse("999999999999.99").unwrap().to_string(),
            "999999999999.99"
        );
        assert!(matches!(Price::parse("999999999999.995"), Err(DomainError::Validation(_))));
        assert!(matches!(Price::parse("1000000000000000"), Err(DomainError::Validation(_))));
        assert!(draft("Box", "1e15").validate().is_err());
    }

    #[test]
    fn negative_zero_is_zero() {
        assert_eq!(Price::parse("-0").unwrap(), Price::zero());
    }

    #[test]
    fn draft_validation_trims_optional_fields() {
        let mut d = draft("  Box ", "3.50");
        d.code = Some("  ".to_string());
        d.supplier = Some(" ACME ".to_string());

        let details = d.validate().unwrap();
        assert_eq!(details.name, "Box");
        assert_eq!(details.code, None);
        assert_eq!(details.supplier.as_deref(), Some("ACME"));
        assert_eq!(details.status, ProductStatus::Active);
    }

    #[test]
    fn draft_rejects_empty_name() {
        let err = draft("   ", "1").validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn draft_rejects_unknown_status() {
        let mut d = draft("Box", "1");
        d.status = Some("discontinued".to_string());
        assert!(matches!(d.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!("INACTIVE".parse::<ProductStatus>().unwrap(), ProductStatus::Inactive);
        assert_eq!(ProductStatus::Active.to_string(), "active");
    }

    #[test]
    fn apply_replaces_attributes_but_keeps_identity() {
        let mut product = Product::create(draft("Box", "1").validate().unwrap());
        let id = product.id;

        let category = CategoryId::new();
        product.apply(draft("Crate", "2").with_category(Some(category)).validate().unwrap());

        assert_eq!(product.id, id);
        assert_eq!(product.name, "Crate");
        assert_eq!(product.category_id, Some(category));
        assert_eq!(product.price.to_string(), "2.00");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: any non-negative cent amount survives display + parse.
            #[test]
            fn cents_survive_display_and_parse(cents in 0i64..10_000_000_000) {
                let price = Price::new(Decimal::new(cents, 2)).unwrap();
                let reparsed = Price::parse(&price.to_string()).unwrap();
                prop_assert_eq!(price, reparsed);
            }

            /// Property: negative amounts are always rejected.
            #[test]
            fn negative_amounts_rejected(cents in 1i64..10_000_000_000) {
                prop_assert!(Price::new(Decimal::new(-cents, 2)).is_err());
            }
        }
    }
}
