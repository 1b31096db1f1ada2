pub mod asset;
pub mod error;
pub mod id;

// Re-export the main types for convenience
pub use asset::{AssetControls, AssetParams, AssetRecord, Holding, TITLE_UNIT_NAME};
pub use error::{AuthError, LedgerError, RegistryError};
pub use id::{AccountId, AssetId};
