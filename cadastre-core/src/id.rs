use curve25519_dalek::edwards::CompressedEdwardsY;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::ops::Deref;

// AccountId identifies an account on the ledger. It is a 32 byte long
// unique identifier, resembling a public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId([u8; 32]);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Format as a hex string with a prefix of the first 6 bytes
        let prefix = hex::encode(&self.0[0..6]);
        write!(f, "acct:{}", prefix)
    }
}

impl Ord for AccountId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for AccountId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Default for AccountId {
    fn default() -> Self {
        AccountId([0; 32])
    }
}

impl Deref for AccountId {
    type Target = [u8; 32];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AccountId {
    pub fn new(id: [u8; 32]) -> Self {
        AccountId(id)
    }

    /// Create an AccountId from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        AccountId(bytes)
    }

    /// Get a reference to the internal bytes
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    /// Create a random AccountId for testing
    pub fn random() -> Self {
        // Generate a random ID using system time
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
            .to_le_bytes();

        // Use this as a seed to create a unique ID
        let (id, _) = Self::find_account(&[&now, &[1, 2, 3, 4]]);
        id
    }

    pub fn create_account_id(seeds: &[&[u8]], bump: u8) -> [u8; 32] {
        let mut hasher = Sha256::new();

        // Domain separator
        hasher.update(b"CADASTRE_Account");

        // Add all seeds
        for seed in seeds {
            hasher.update(seed);
        }

        // Add bump
        hasher.update([bump]);

        hasher.finalize().into()
    }

    /// Verify that a 32-byte array is not a valid point on the ed25519 curve
    ///
    /// Returns true if the bytes do not represent a valid curve point.
    /// Returns false if the bytes do represent a valid curve point.
    pub fn is_off_curve(bytes: &[u8; 32]) -> bool {
        let Ok(compressed_edwards_y) = CompressedEdwardsY::from_slice(bytes.as_ref()) else {
            return true; // Cannot even parse as a point format, so it's off-curve
        };
        compressed_edwards_y.decompress().is_none() // If we can't decompress it, it's off-curve
    }

    /// Try to find an off-curve AccountId for the given seeds
    ///
    /// An off-curve identity has no corresponding private key, so nothing can
    /// ever sign as it. Custodial accounts (like the registry's own account)
    /// are derived this way.
    pub fn try_find_account(seeds: &[&[u8]]) -> Option<(AccountId, u8)> {
        for bump in 0..255 {
            let id = AccountId::create_account_id(seeds, bump);
            if AccountId::is_off_curve(&id) {
                return Some((AccountId(id), bump));
            }
        }
        None
    }

    /// Find an off-curve AccountId for the given seeds
    pub fn find_account(seeds: &[&[u8]]) -> (AccountId, u8) {
        AccountId::try_find_account(seeds).expect("Failed to find a valid AccountId")
    }
}

/// Ledger-assigned identifier of a created asset.
///
/// The ledger assigns sequential 64-bit indices at creation time and never
/// reuses them. A title and the asset backing it share the same identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct AssetId(u64);

impl AssetId {
    pub fn new(index: u64) -> Self {
        AssetId(index)
    }

    /// Get the raw asset index
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for AssetId {
    fn from(index: u64) -> Self {
        AssetId(index)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
