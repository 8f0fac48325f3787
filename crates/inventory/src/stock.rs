use core::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use inventario_core::{BranchId, DomainError, DomainResult, Entity, ProductId, StockEntryId};

/// A requested change to a stock quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "quantity")]
pub enum StockChange {
    /// Replace the quantity.
    Set(i64),
    /// Add a signed delta to the quantity.
    Adjust(i64),
}

/// Largest stock magnitude an entry may hold. Any two quantities in range
/// differ by an amount a movement can record.
pub const MAX_QUANTITY: i64 = i64::MAX / 2;

fn out_of_range() -> DomainError {
    DomainError::validation(format!("stock quantity must be within ±{MAX_QUANTITY}"))
}

fn in_range(quantity: i64) -> DomainResult<i64> {
    if quantity.checked_abs().is_some_and(|q| q <= MAX_QUANTITY) {
        Ok(quantity)
    } else {
        Err(out_of_range())
    }
}

impl StockChange {
    /// Quantity that results from applying this change to `current`.
    pub fn resulting(self, current: i64) -> DomainResult<i64> {
        match self {
            StockChange::Set(quantity) => in_range(quantity),
            StockChange::Adjust(0) => Err(DomainError::validation("delta cannot be zero")),
            StockChange::Adjust(delta) => current
                .checked_add(delta)
                .ok_or_else(out_of_range)
                .and_then(in_range),
        }
    }
}

/// What happens when a change would leave stock below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegativeStockPolicy {
    /// Negative quantities are accepted (backorders, counting errors).
    Allow,
    /// The change is rejected with an invariant violation.
    #[default]
    Reject,
}

impl NegativeStockPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            NegativeStockPolicy::Allow => "allow",
            NegativeStockPolicy::Reject => "reject",
        }
    }

    pub fn check(self, resulting: i64) -> DomainResult<()> {
        if self == NegativeStockPolicy::Reject && resulting < 0 {
            return Err(DomainError::invariant(format!(
                "stock cannot go negative (would be {resulting})"
            )));
        }
        Ok(())
    }
}

impl FromStr for NegativeStockPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(NegativeStockPolicy::Allow),
            "reject" => Ok(NegativeStockPolicy::Reject),
            other => Err(DomainError::validation(format!(
                "negative stock policy must be 'allow' or 'reject' (got '{other}')"
            ))),
        }
    }
}

/// Quantity of one product held at one branch.
///
/// At most one entry exists per `(product_id, branch_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    pub id: StockEntryId,
    pub product_id: ProductId,
    pub branch_id: BranchId,
    pub stock: i64,
}

impl StockEntry {
    /// A fresh entry seeded from zero.
    pub fn new(product_id: ProductId, branch_id: BranchId) -> Self {
        Self {
            id: StockEntryId::new(),
            product_id,
            branch_id,
            stock: 0,
        }
    }

    /// Apply a change under the given policy and return the signed delta.
    ///
    /// The entry is left untouched when the change is rejected.
    pub fn apply(&mut self, change: StockChange, policy: NegativeStockPolicy) -> DomainResult<i64> {
        let resulting = change.resulting(self.stock)?;
        policy.check(resulting)?;

        let delta = resulting
            .checked_sub(self.stock)
            .filter(|d| d.checked_abs().is_some())
            .ok_or_else(out_of_range)?;
        self.stock = resulting;
        Ok(delta)
    }
}

impl Entity for StockEntry {
    type Id = StockEntryId;
    const KIND: &'static str = "stock entry";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Parse a stock quantity typed into a form or read from a spreadsheet cell.
///
/// Whole numbers written with a zero fraction ("10.0") are accepted since
/// spreadsheet tools often export integers that way.
pub fn parse_quantity(raw: &str) -> DomainResult<i64> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(DomainError::validation("stock is required"));
    }
    if let Ok(quantity) = text.parse::<i64>() {
        return in_range(quantity);
    }

    let invalid = || DomainError::validation(format!("stock must be a whole number (got '{text}')"));
    let decimal = Decimal::from_str(text).map_err(|_| invalid())?;
    if !decimal.fract().is_zero() {
        return Err(invalid());
    }
    decimal.to_i64().ok_or_else(out_of_range).and_then(in_range)
}
