use cadastre_core::asset::{AssetControls, AssetParams};
use cadastre_core::error::LedgerError;
use cadastre_core::id::{AccountId, AssetId};
use serde::{Deserialize, Serialize};

/// Group hash type (32-byte array)
pub type GroupHash = [u8; 32];

/// The most operations one group may carry
pub const MAX_GROUP_SIZE: usize = 16;

/// A single operation at the ledger boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerOp {
    /// Create a new asset. The group's submitter becomes the creator and
    /// the entire supply starts unissued.
    CreateAsset {
        params: AssetParams,
        controls: AssetControls,
    },

    /// Register a holding slot for an account: a zero-amount self transfer
    /// recording the account's consent to hold the asset. The creator's
    /// opt-in additionally claims the unissued supply.
    OptIn { account: AccountId, asset: AssetId },

    /// Move balance out of the submitter's own holding
    Transfer {
        asset: AssetId,
        from: AccountId,
        to: AccountId,
        amount: u64,
    },

    /// Forced move under the asset's clawback capability. The submitter
    /// must hold that capability; the source holder's consent is not
    /// required.
    Clawback {
        asset: AssetId,
        from: AccountId,
        to: AccountId,
        amount: u64,
    },
}

impl LedgerOp {
    /// Short operation name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerOp::CreateAsset { .. } => "create_asset",
            LedgerOp::OptIn { .. } => "opt_in",
            LedgerOp::Transfer { .. } => "transfer",
            LedgerOp::Clawback { .. } => "clawback",
        }
    }
}

/// An ordered list of operations committed as one unit.
///
/// Groups are assembled through [`GroupBuilder`]. The submitter is the
/// identity the whole group acts as; a conforming ledger authorizes every
/// operation against it. Either every operation in the group applies or
/// none does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionGroup {
    /// The identity this group acts as
    pub submitter: AccountId,

    /// Operations applied in order
    pub ops: Vec<LedgerOp>,

    /// The hash of the group
    pub hash: GroupHash,
}

impl TransactionGroup {
    /// Start building a group submitted by the given identity
    pub fn builder(submitter: AccountId) -> GroupBuilder {
        GroupBuilder::new(submitter)
    }

    /// Number of operations in the group
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Compute the canonical hash of a group's contents
    fn compute_hash(submitter: &AccountId, ops: &[LedgerOp]) -> Result<GroupHash, LedgerError> {
        let encoded = bincode::serialize(ops)?;

        let mut hasher = blake3::Hasher::new();
        hasher.update(b"GROUP:");
        hasher.update(submitter.bytes());
        hasher.update(&encoded);
        Ok(*hasher.finalize().as_bytes())
    }
}

/// Builder assembling a transaction group operation by operation
#[derive(Debug)]
pub struct GroupBuilder {
    submitter: AccountId,
    ops: Vec<LedgerOp>,
}

impl GroupBuilder {
    pub fn new(submitter: AccountId) -> Self {
        Self {
            submitter,
            ops: Vec::new(),
        }
    }

    /// Add an asset creation
    pub fn create_asset(mut self, params: AssetParams, controls: AssetControls) -> Self {
        self.ops.push(LedgerOp::CreateAsset { params, controls });
        self
    }

    /// Add a holding slot registration
    pub fn opt_in(mut self, account: AccountId, asset: AssetId) -> Self {
        self.ops.push(LedgerOp::OptIn { account, asset });
        self
    }

    /// Add a native transfer out of the submitter's holding
    pub fn transfer(mut self, asset: AssetId, from: AccountId, to: AccountId, amount: u64) -> Self {
        self.ops.push(LedgerOp::Transfer {
            asset,
            from,
            to,
            amount,
        });
        self
    }

    /// Add a forced transfer under the asset's clawback capability
    pub fn clawback(mut self, asset: AssetId, from: AccountId, to: AccountId, amount: u64) -> Self {
        self.ops.push(LedgerOp::Clawback {
            asset,
            from,
            to,
            amount,
        });
        self
    }

    /// Seal the group and compute its hash.
    ///
    /// Rejects groups with no operations or more than [`MAX_GROUP_SIZE`].
    pub fn build(self) -> Result<TransactionGroup, LedgerError> {
        if self.ops.is_empty() {
            return Err(LedgerError::EmptyGroup);
        }
        if self.ops.len() > MAX_GROUP_SIZE {
            return Err(LedgerError::GroupTooLarge {
                len: self.ops.len(),
                max: MAX_GROUP_SIZE,
            });
        }

        let hash = TransactionGroup::compute_hash(&self.submitter, &self.ops)?;
        Ok(TransactionGroup {
            submitter: self.submitter,
            ops: self.ops,
            hash,
        })
    }
}

/// The effect of a committed group on one holding slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingChange {
    /// The account whose holding changed
    pub account: AccountId,

    /// The asset the holding is for
    pub asset: AssetId,

    /// Balance before the group (None if the slot did not exist)
    pub before: Option<u64>,

    /// Balance after the group
    pub after: Option<u64>,
}

impl HoldingChange {
    /// Whether this effect opened a new holding slot
    pub fn is_slot_creation(&self) -> bool {
        self.before.is_none() && self.after.is_some()
    }
}

/// Confirmation for a committed group.
///
/// A group either fully commits, yielding a receipt, or fully aborts with a
/// typed error. Receipts therefore describe committed groups only; there is
/// no partially-committed or in-flight receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupReceipt {
    /// The hash of the group that committed
    pub group_hash: GroupHash,

    /// The round in which the group committed
    pub round: u64,

    /// Timestamp when the group was committed
    pub timestamp: u64,

    /// Ledger-assigned ids of assets created by the group, in operation order
    pub created_assets: Vec<AssetId>,

    /// Before and after balances for every holding the group touched
    pub effects: Vec<HoldingChange>,
}

impl GroupReceipt {
    /// Create a new receipt for a committed group
    pub fn new(group_hash: GroupHash, round: u64, timestamp: u64) -> Self {
        Self {
            group_hash,
            round,
            timestamp,
            created_assets: Vec::new(),
            effects: Vec::new(),
        }
    }

    /// Record an asset created by the group
    pub fn add_created_asset(&mut self, asset: AssetId) {
        self.created_assets.push(asset);
    }

    /// Record a holding change caused by the group
    pub fn add_effect(&mut self, effect: HoldingChange) {
        self.effects.push(effect);
    }

    /// The single asset created by a one-creation group, if any
    pub fn created_asset(&self) -> Option<AssetId> {
        self.created_assets.first().copied()
    }

    /// Number of holdings the group touched
    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> AssetParams {
        AssetParams::title("PLOT-001", "ipfs://X")
    }

    #[test]
    fn test_builder_collects_ops_in_order() {
        let submitter = AccountId::new([1; 32]);
        let alice = AccountId::new([2; 32]);
        let asset = AssetId::new(500);

        let group = TransactionGroup::builder(submitter)
            .clawback(asset, alice, submitter, 1)
            .transfer(asset, submitter, alice, 1)
            .build()
            .unwrap();

        assert_eq!(group.len(), 2);
        assert_eq!(group.submitter, submitter);
        assert_eq!(group.ops[0].kind(), "clawback");
        assert_eq!(group.ops[1].kind(), "transfer");
    }

    #[test]
    fn test_group_hash_is_deterministic() {
        let submitter = AccountId::new([1; 32]);
        let custodian = AccountId::new([3; 32]);

        let a = TransactionGroup::builder(submitter)
            .create_asset(params(), AssetControls::custodial(custodian))
            .build()
            .unwrap();
        let b = TransactionGroup::builder(submitter)
            .create_asset(params(), AssetControls::custodial(custodian))
            .build()
            .unwrap();

        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn test_group_hash_is_order_sensitive() {
        let submitter = AccountId::new([1; 32]);
        let alice = AccountId::new([2; 32]);
        let asset = AssetId::new(500);

        let forward = TransactionGroup::builder(submitter)
            .clawback(asset, alice, submitter, 1)
            .transfer(asset, submitter, alice, 1)
            .build()
            .unwrap();
        let reversed = TransactionGroup::builder(submitter)
            .transfer(asset, submitter, alice, 1)
            .clawback(asset, alice, submitter, 1)
            .build()
            .unwrap();

        assert_ne!(forward.hash, reversed.hash);
    }

    #[test]
    fn test_group_hash_binds_submitter() {
        let asset = AssetId::new(500);
        let alice = AccountId::new([2; 32]);

        let by_one = TransactionGroup::builder(AccountId::new([1; 32]))
            .opt_in(AccountId::new([1; 32]), asset)
            .build()
            .unwrap();
        let by_other = TransactionGroup::builder(alice)
            .opt_in(AccountId::new([1; 32]), asset)
            .build()
            .unwrap();

        assert_ne!(by_one.hash, by_other.hash);
    }

    #[test]
    fn test_empty_group_rejected() {
        let result = TransactionGroup::builder(AccountId::new([1; 32])).build();
        assert!(matches!(result, Err(LedgerError::EmptyGroup)));
    }

    #[test]
    fn test_oversized_group_rejected() {
        let submitter = AccountId::new([1; 32]);
        let asset = AssetId::new(500);

        let mut builder = TransactionGroup::builder(submitter);
        for _ in 0..(MAX_GROUP_SIZE + 1) {
            builder = builder.opt_in(submitter, asset);
        }

        match builder.build() {
            Err(LedgerError::GroupTooLarge { len, max }) => {
                assert_eq!(len, MAX_GROUP_SIZE + 1);
                assert_eq!(max, MAX_GROUP_SIZE);
            }
            other => panic!("expected GroupTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_receipt_records_created_assets_and_effects() {
        let mut receipt = GroupReceipt::new([4; 32], 7, 56789);
        assert_eq!(receipt.created_asset(), None);

        receipt.add_created_asset(AssetId::new(500));
        receipt.add_effect(HoldingChange {
            account: AccountId::new([1; 32]),
            asset: AssetId::new(500),
            before: None,
            after: Some(1),
        });

        assert_eq!(receipt.created_asset(), Some(AssetId::new(500)));
        assert_eq!(receipt.effect_count(), 1);
        assert!(receipt.effects[0].is_slot_creation());
    }
}
