use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use inventario_core::{BranchId, DomainError, DomainResult, Entity, MovementId, ProductId, UserId};

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    In,
    Out,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::In => "in",
            MovementKind::Out => "out",
        }
    }
}

impl FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(MovementKind::In),
            "out" => Ok(MovementKind::Out),
            other => Err(DomainError::validation(format!("unknown movement kind '{other}'"))),
        }
    }
}

/// Audit record of one stock change at one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub branch_id: BranchId,
    pub kind: MovementKind,
    /// Always positive; the direction is carried by `kind`.
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
    pub user_id: Option<UserId>,
}

impl Movement {
    /// Record a signed stock delta. A zero delta records nothing.
    pub fn from_delta(
        product_id: ProductId,
        branch_id: BranchId,
        delta: i64,
        occurred_at: DateTime<Utc>,
        user_id: Option<UserId>,
    ) -> DomainResult<Option<Self>> {
        let kind = match delta {
            0 => return Ok(None),
            d if d > 0 => MovementKind::In,
            _ => MovementKind::Out,
        };
        let quantity = i64::try_from(delta.unsigned_abs())
            .map_err(|_| DomainError::validation("movement quantity out of range"))?;
        Ok(Some(Self {
            id: MovementId::new(),
            product_id,
            branch_id,
            kind,
            quantity,
            occurred_at,
            user_id,
        }))
    }

    /// The delta this movement stands for.
    pub fn signed_quantity(&self) -> i64 {
        match self.kind {
            MovementKind::In => self.quantity,
            MovementKind::Out => -self.quantity,
        }
    }
}

impl Entity for Movement {
    type Id = MovementId;
    const KIND: &'static str = "movement";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
