//! Cadastre: a permissioned land-title registry
//!
//! This crate re-exports all the components of the cadastre system.

pub use cadastre_core::*;
pub use cadastre_ledger::*;
pub use cadastre_registry::*;
