//! `inventario-auth`: user accounts and roles.
//!
//! Accounts are stored for completeness; access control is not enforced.

pub mod roles;
pub mod user;

pub use roles::Role;
pub use user::User;
