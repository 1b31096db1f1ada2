use crate::id::{AccountId, AssetId};
use std::io;
use thiserror::Error;

/// Authorization failures raised by registry operations.
///
/// These are definite outcomes. Retrying an authorization failure without a
/// change of caller can never succeed, and callers must not treat one as
/// transient.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The bootstrap call came from an identity other than the deployer
    #[error("initializing identity is not the deployer of the registry")]
    NotInitiator,

    /// An administrator-only operation was called by a non-administrator
    #[error("caller is not the registry administrator")]
    NotAdmin,

    /// An ownership-gated operation was called by an account that does not
    /// hold the title
    #[error("caller does not hold title {0}")]
    NotOwner(AssetId),
}

/// Represents all possible errors raised at the ledger boundary
#[derive(Error, Debug)]
pub enum LedgerError {
    /// A transfer targeted an account that has not opted in to the asset
    #[error("account {account} has no holding slot for asset {asset}")]
    OptInMissing { account: AccountId, asset: AssetId },

    /// A transfer or clawback exceeded the source holding's balance
    #[error("account {account} holds {held} of asset {asset}, needs {needed}")]
    InsufficientBalance {
        account: AccountId,
        asset: AssetId,
        held: u64,
        needed: u64,
    },

    /// An asset was created but the follow-up opt-in claiming its supply
    /// failed, leaving the asset orphaned.
    ///
    /// This is a definite failure and must never be blindly retried: a
    /// retried mint would create a second orphaned asset, not repair the
    /// first one.
    #[error("asset {asset} was created but the claiming opt-in failed: {source}")]
    PartialMint {
        asset: AssetId,
        #[source]
        source: Box<LedgerError>,
    },

    /// An operation referenced an asset the ledger has no record of
    #[error("unknown asset {0}")]
    UnknownAsset(AssetId),

    /// An operation is not permitted for the group's submitter
    #[error("operation not authorized for submitter {submitter}: {reason}")]
    NotAuthorized {
        submitter: AccountId,
        reason: String,
    },

    /// A transaction group was built with no operations
    #[error("transaction group contains no operations")]
    EmptyGroup,

    /// A transaction group exceeded the ledger's group size limit
    #[error("transaction group of {len} operations exceeds the limit of {max}")]
    GroupTooLarge { len: usize, max: usize },

    /// The submission could not be delivered to the ledger. The group was
    /// provably never evaluated, so retrying it is safe.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// Errors that occur during journal operations
    #[error("journal error: {0}")]
    Journal(String),

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO errors that occur when reading/writing files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic errors that don't fit in other categories
    #[error("other error: {0}")]
    Other(String),

    /// Anyhow error wrapper for error context
    #[error(transparent)]
    Context(#[from] anyhow::Error),
}

impl LedgerError {
    /// Whether the failure happened before the group could have committed.
    ///
    /// Only `Unavailable` qualifies. Every validation rejection is a
    /// definite outcome against the state the ledger held at evaluation
    /// time, and `PartialMint` is explicitly excluded because part of the
    /// work did commit.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Unavailable(_))
    }
}

// Additional From conversions for common error types

impl From<bincode::Error> for LedgerError {
    fn from(err: bincode::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<String> for LedgerError {
    fn from(err: String) -> Self {
        LedgerError::Other(err)
    }
}

impl From<&str> for LedgerError {
    fn from(err: &str) -> Self {
        LedgerError::Other(err.to_string())
    }
}

/// The caller-facing failure type for registry operations
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The caller is not authorized for the operation
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The ledger rejected or could not process a group or query
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// No account currently holds the title's unit (an orphaned mint)
    #[error("title {0} has no holder of record")]
    NoHolder(AssetId),
}

impl RegistryError {
    /// True for failures of authorization rather than ledger state or
    /// transport. These must never be retried as-is.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, RegistryError::Auth(_))
    }

    /// True only when the underlying failure provably happened before any
    /// state could change, making a retry safe.
    pub fn is_retryable(&self) -> bool {
        match self {
            RegistryError::Auth(_) => false,
            RegistryError::Ledger(err) => err.is_transient(),
            RegistryError::NoHolder(_) => false,
        }
    }
}
