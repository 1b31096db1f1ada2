use crate::id::{AccountId, AssetId};
use serde::{Deserialize, Serialize};

/// Unit tag stamped on every title asset so holdings can be recognized as
/// registry titles when scanning an account.
pub const TITLE_UNIT_NAME: &str = "TITLE";

/// The capability addresses attached to an asset at creation time.
///
/// All four are fixed for the asset's lifetime. Authorization for forced
/// moves is a property of the asset itself, not a runtime permission lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetControls {
    /// May reconfigure the asset
    pub manager: AccountId,

    /// Treasury address associated with the asset
    pub reserve: AccountId,

    /// May freeze individual holdings
    pub freeze: AccountId,

    /// May move balances out of any holding without the holder's consent
    pub clawback: AccountId,
}

impl AssetControls {
    /// Bind all four capabilities to a single custodian account
    pub fn custodial(custodian: AccountId) -> Self {
        Self {
            manager: custodian,
            reserve: custodian,
            freeze: custodian,
            clawback: custodian,
        }
    }

    /// Check whether an account holds the clawback capability
    pub fn clawback_is(&self, account: &AccountId) -> bool {
        self.clawback == *account
    }
}

/// Creation parameters for a ledger asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetParams {
    /// Human-readable asset name (the parcel label for titles)
    pub name: String,

    /// Short unit tag
    pub unit_name: String,

    /// Opaque metadata pointer. The ledger and registry never interpret it.
    pub url: String,

    /// Total number of base units that will ever exist
    pub total: u64,

    /// Decimal places for display purposes
    pub decimals: u32,
}

impl AssetParams {
    /// Parameters for a land title: a single indivisible unit
    pub fn title(label: &str, metadata_url: &str) -> Self {
        Self {
            name: label.to_string(),
            unit_name: TITLE_UNIT_NAME.to_string(),
            url: metadata_url.to_string(),
            total: 1,
            decimals: 0,
        }
    }

    /// True when exactly one whole unit can ever exist
    pub fn is_indivisible(&self) -> bool {
        self.total == 1 && self.decimals == 0
    }
}

/// A created asset as stored by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Ledger-assigned identifier
    pub id: AssetId,

    /// The account that submitted the creating group
    pub creator: AccountId,

    /// Creation parameters
    pub params: AssetParams,

    /// Capability addresses fixed at creation
    pub controls: AssetControls,

    /// Units created but not yet claimed by the creator's opt-in
    pub unissued: u64,
}

impl AssetRecord {
    /// Create a record for a freshly created asset. The entire supply starts
    /// unissued until the creator opts in and claims it.
    pub fn new(id: AssetId, creator: AccountId, params: AssetParams, controls: AssetControls) -> Self {
        let unissued = params.total;
        Self {
            id,
            creator,
            params,
            controls,
            unissued,
        }
    }

    /// True once the creator's opt-in has claimed the full supply
    pub fn fully_issued(&self) -> bool {
        self.unissued == 0
    }
}

/// One row of a by-asset holdings scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    /// The account holding the balance
    pub account: AccountId,

    /// Balance in base units
    pub amount: u64,
}
