//! Permissioned land-title registry over an atomic asset ledger.
//!
//! The registry mints one indivisible ledger asset per land parcel, keeps
//! every control capability of those assets with its own custodial account,
//! and gates conveyances on administrator or owner authority. A file
//! journal keeps an operational record of mints, transfers, and any mint
//! left half-done.

pub mod journal;
pub mod registry;

pub use journal::{FileJournal, JournalEntry, JournalEvent};
pub use registry::{Deployment, TitleRegistry};
