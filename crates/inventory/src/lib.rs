//! Inventory domain module.
//!
//! Branches, per-branch stock entries and the stock movement audit trail,
//! implemented as deterministic domain logic (no IO, no storage).

pub mod branch;
pub mod movement;
pub mod stock;

pub use branch::Branch;
pub use movement::{Movement, MovementKind};
pub use stock::{MAX_QUANTITY, NegativeStockPolicy, StockChange, StockEntry, parse_quantity};
