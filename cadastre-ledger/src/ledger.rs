use crate::group::{GroupHash, GroupReceipt, TransactionGroup};
use cadastre_core::asset::{AssetRecord, Holding};
use cadastre_core::error::LedgerError;
use cadastre_core::id::{AccountId, AssetId};
use std::sync::Arc;

/// The boundary to the asset ledger the registry runs against.
///
/// A conforming ledger commits transaction groups atomically: either every
/// operation in a group applies or none does, and a rejected submission is
/// guaranteed to have had no effect. Concurrent conflicting groups are
/// serialized; the loser observes a definite validation failure rather than
/// partial state.
pub trait Ledger {
    /// Submit a transaction group for atomic commitment
    ///
    /// # Parameters
    /// * `group` - The group to commit
    ///
    /// # Returns
    /// A receipt describing the committed group, or the error that aborted
    /// it. An error means nothing in the group took effect, except for
    /// `LedgerError::Unavailable`, which means the group was never
    /// evaluated at all.
    fn submit(&self, group: TransactionGroup) -> Result<GroupReceipt, LedgerError>;

    /// Read an account's balance of an asset from committed state
    ///
    /// # Parameters
    /// * `account` - The account to query
    /// * `asset` - The asset to query the balance of
    ///
    /// # Returns
    /// `None` if the account has no holding slot for the asset, `Some(0)`
    /// if it has opted in but holds nothing. The two are not the same:
    /// transfers to an account without a slot fail.
    fn query_balance(&self, account: &AccountId, asset: AssetId)
        -> Result<Option<u64>, LedgerError>;

    /// Read the record of a created asset
    ///
    /// # Parameters
    /// * `asset` - The asset to look up
    ///
    /// # Returns
    /// Some(record) if the asset exists, None otherwise
    fn asset_record(&self, asset: AssetId) -> Result<Option<AssetRecord>, LedgerError>;

    /// Scan every holding slot that exists for an asset
    ///
    /// # Parameters
    /// * `asset` - The asset to scan holdings of
    ///
    /// # Returns
    /// All holding slots for the asset, including empty ones, in account
    /// order. Fails with `UnknownAsset` if the asset does not exist.
    fn asset_holdings(&self, asset: AssetId) -> Result<Vec<Holding>, LedgerError>;

    /// Look up the receipt of a previously committed group
    ///
    /// # Parameters
    /// * `hash` - The group hash to get the receipt for
    ///
    /// # Returns
    /// Some(receipt) if a group with this hash committed, None otherwise
    fn receipt(&self, hash: &GroupHash) -> Result<Option<GroupReceipt>, LedgerError>;
}

// A shared ledger handle is still a ledger. Registries hold the ledger by
// value, so callers that also need direct access pass an Arc.
impl<L: Ledger + ?Sized> Ledger for Arc<L> {
    fn submit(&self, group: TransactionGroup) -> Result<GroupReceipt, LedgerError> {
        (**self).submit(group)
    }

    fn query_balance(
        &self,
        account: &AccountId,
        asset: AssetId,
    ) -> Result<Option<u64>, LedgerError> {
        (**self).query_balance(account, asset)
    }

    fn asset_record(&self, asset: AssetId) -> Result<Option<AssetRecord>, LedgerError> {
        (**self).asset_record(asset)
    }

    fn asset_holdings(&self, asset: AssetId) -> Result<Vec<Holding>, LedgerError> {
        (**self).asset_holdings(asset)
    }

    fn receipt(&self, hash: &GroupHash) -> Result<Option<GroupReceipt>, LedgerError> {
        (**self).receipt(hash)
    }
}
