pub mod group;
pub mod ledger;
pub mod memory;
pub mod retry;

// Re-export the main types for convenience
pub use group::{
    GroupBuilder, GroupHash, GroupReceipt, HoldingChange, LedgerOp, TransactionGroup,
    MAX_GROUP_SIZE,
};
pub use ledger::Ledger;
pub use memory::InMemoryLedger;
pub use retry::RetryPolicy;
