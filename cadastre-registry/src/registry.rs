use cadastre_core::asset::{AssetControls, AssetParams, AssetRecord};
use cadastre_core::error::{AuthError, LedgerError, RegistryError};
use cadastre_core::id::{AccountId, AssetId};
use cadastre_ledger::group::TransactionGroup;
use cadastre_ledger::ledger::Ledger;
use cadastre_ledger::retry::RetryPolicy;
use log::{debug, error, info, warn};

use crate::journal::{FileJournal, JournalEvent};

/// The deployment context a registry is created from.
///
/// Binds the deploying identity to the registry's custodial account. The
/// custodial account is derived from the deployer's bytes and is off-curve,
/// so no private key can ever sign as it; only registry logic acts in its
/// name.
#[derive(Debug, Clone, Copy)]
pub struct Deployment {
    /// The identity that deployed the registry
    pub creator: AccountId,

    /// The registry's own ledger identity
    pub registry_account: AccountId,

    /// Bump used in the derivation
    pub bump: u8,
}

impl Deployment {
    /// Derive the deployment context for a creator identity
    pub fn new(creator: AccountId) -> Self {
        let (registry_account, bump) = AccountId::find_account(&[b"registry", creator.bytes()]);
        Self {
            creator,
            registry_account,
            bump,
        }
    }
}

/// The permissioned land-title registry.
///
/// Issues unique single-unit title assets for land parcels and controls who
/// may create, transfer, and verify them. The registry's custodial account
/// holds all four control capabilities of every title it creates, so every
/// conveyance passes through registry logic. The administrator is fixed at
/// initialization.
pub struct TitleRegistry<L: Ledger> {
    ledger: L,
    custodian: AccountId,
    admin: AccountId,
    retry: RetryPolicy,
    journal: Option<FileJournal>,
}

impl<L: Ledger> TitleRegistry<L> {
    /// One-time bootstrap of a deployed registry.
    ///
    /// # Parameters
    /// * `ledger` - The ledger the registry runs against
    /// * `deployment` - The deployment context binding deployer and custodian
    /// * `initiator` - The identity performing the bootstrap
    /// * `admin` - The administrator identity, immutable afterwards
    ///
    /// # Returns
    /// The initialized registry, or `AuthError::NotInitiator` when the
    /// initiator is not the deploying identity.
    pub fn initialize(
        ledger: L,
        deployment: &Deployment,
        initiator: &AccountId,
        admin: AccountId,
    ) -> Result<Self, AuthError> {
        if *initiator != deployment.creator {
            warn!("initialize rejected: {} is not the deployer", initiator);
            return Err(AuthError::NotInitiator);
        }

        info!(
            "registry initialized: custodian {}, admin {}",
            deployment.registry_account, admin
        );
        Ok(Self {
            ledger,
            custodian: deployment.registry_account,
            admin,
            retry: RetryPolicy::default(),
            journal: None,
        })
    }

    /// Replace the retry policy used for read-only ledger queries
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Attach a journal recording mint and transfer outcomes
    pub fn with_journal(mut self, journal: FileJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// The registry administrator, fixed at initialization
    pub fn admin(&self) -> &AccountId {
        &self.admin
    }

    /// The registry's own custodial ledger account
    pub fn custodian(&self) -> &AccountId {
        &self.custodian
    }

    fn require_admin(&self, caller: &AccountId) -> Result<(), AuthError> {
        if *caller != self.admin {
            return Err(AuthError::NotAdmin);
        }
        Ok(())
    }

    // A journal failure must not alter the outcome of a ledger operation
    // that already committed.
    fn journal_event(&self, event: JournalEvent) {
        if let Some(journal) = &self.journal {
            if let Err(err) = journal.append(event) {
                error!("journal append failed: {}", err);
            }
        }
    }

    /// Create a new land title.
    ///
    /// Issues a unique indivisible asset named after the parcel label, with
    /// every control capability bound to the registry's custodian, then
    /// claims the unit into the custodian's holding with a second group.
    ///
    /// # Parameters
    /// * `caller` - Must be the registry administrator
    /// * `land_label` - Human-readable parcel label
    /// * `metadata_url` - Opaque pointer to off-ledger parcel documents
    ///
    /// # Returns
    /// The ledger-assigned id of the new title
    ///
    /// # Errors
    /// `AuthError::NotAdmin` for any other caller, checked before any
    /// ledger traffic. `LedgerError::PartialMint` when the asset was
    /// created but the claiming opt-in failed; the orphaned id is journaled
    /// and must not be blindly re-minted.
    pub fn mint(
        &self,
        caller: &AccountId,
        land_label: &str,
        metadata_url: &str,
    ) -> Result<AssetId, RegistryError> {
        self.require_admin(caller)?;
        debug!("mint {} requested by {}", land_label, caller);

        let create = TransactionGroup::builder(self.custodian)
            .create_asset(
                AssetParams::title(land_label, metadata_url),
                AssetControls::custodial(self.custodian),
            )
            .build()?;
        let receipt = self.ledger.submit(create)?;
        let title = receipt
            .created_asset()
            .ok_or_else(|| LedgerError::Other("creation receipt carries no asset id".to_string()))?;

        let claim = TransactionGroup::builder(self.custodian)
            .opt_in(self.custodian, title)
            .build()?;
        if let Err(err) = self.ledger.submit(claim) {
            warn!(
                "mint {}: asset {} created but the claim failed: {}",
                land_label, title, err
            );
            self.journal_event(JournalEvent::MintOrphaned {
                title,
                reason: err.to_string(),
            });
            return Err(LedgerError::PartialMint {
                asset: title,
                source: Box::new(err),
            }
            .into());
        }

        info!(
            "minted title {} ({}) held by {}",
            title, land_label, self.custodian
        );
        self.journal_event(JournalEvent::Minted {
            title,
            label: land_label.to_string(),
        });
        Ok(title)
    }

    /// Hand a title held by the registry to a receiver.
    ///
    /// # Parameters
    /// * `caller` - Must be the registry administrator
    /// * `title` - The title to hand over
    /// * `receiver` - The account to receive the unit; must have opted in
    ///
    /// # Errors
    /// `AuthError::NotAdmin` for any other caller.
    /// `LedgerError::OptInMissing` when the receiver has no holding slot
    /// for the title. On any failure the custodian retains the unit.
    pub fn admin_transfer(
        &self,
        caller: &AccountId,
        title: AssetId,
        receiver: &AccountId,
    ) -> Result<(), RegistryError> {
        self.require_admin(caller)?;

        let group = TransactionGroup::builder(self.custodian)
            .transfer(title, self.custodian, *receiver, 1)
            .build()?;
        self.ledger.submit(group)?;

        info!("title {} granted to {}", title, receiver);
        self.journal_event(JournalEvent::Transferred {
            title,
            from: self.custodian,
            to: *receiver,
        });
        Ok(())
    }

    /// Convey a title from its current owner to a receiver, on the owner's
    /// authority.
    ///
    /// Ownership is the authorization: the caller must hold the title's
    /// unit on the ledger at the time of the call. The conveyance runs as
    /// one atomic group of two chained hops, a clawback of the unit into
    /// the custodian followed by a transfer to the receiver, so the title
    /// is never observably parked with the custodian.
    ///
    /// # Parameters
    /// * `caller` - The current owner of the title
    /// * `title` - The title to convey
    /// * `receiver` - The account to receive the unit; must have opted in
    ///
    /// # Errors
    /// `AuthError::NotOwner` when the caller does not hold exactly the
    /// title's unit. Ledger rejections of either hop abort the whole
    /// group and leave ownership unchanged.
    pub fn user_transfer(
        &self,
        caller: &AccountId,
        title: AssetId,
        receiver: &AccountId,
    ) -> Result<(), RegistryError> {
        let held = self
            .retry
            .run("query_balance", || self.ledger.query_balance(caller, title))?;
        if held != Some(1) {
            debug!(
                "user_transfer of {} rejected: {} does not hold the unit",
                title, caller
            );
            return Err(AuthError::NotOwner(title).into());
        }

        let group = TransactionGroup::builder(self.custodian)
            .clawback(title, *caller, self.custodian, 1)
            .transfer(title, self.custodian, *receiver, 1)
            .build()?;
        self.ledger.submit(group)?;

        info!("title {} conveyed from {} to {}", title, caller, receiver);
        self.journal_event(JournalEvent::Transferred {
            title,
            from: *caller,
            to: *receiver,
        });
        Ok(())
    }

    /// Look up the account currently holding a title's unit.
    ///
    /// Consults the ledger's holdings for the asset rather than trusting
    /// anything the caller supplies. Right after a mint this is the
    /// registry's custodian.
    ///
    /// # Errors
    /// `LedgerError::UnknownAsset` when no such title exists;
    /// `RegistryError::NoHolder` when the title's unit is unheld (an
    /// orphaned mint).
    pub fn verify_owner(&self, title: AssetId) -> Result<AccountId, RegistryError> {
        let holdings = self
            .retry
            .run("asset_holdings", || self.ledger.asset_holdings(title))?;
        holdings
            .iter()
            .find(|holding| holding.amount == 1)
            .map(|holding| holding.account)
            .ok_or(RegistryError::NoHolder(title))
    }

    /// Fetch the stored record of a title: parcel label, metadata pointer,
    /// and control addresses.
    pub fn title_record(&self, title: AssetId) -> Result<AssetRecord, RegistryError> {
        let record = self
            .retry
            .run("asset_record", || self.ledger.asset_record(title))?;
        record.ok_or(RegistryError::Ledger(LedgerError::UnknownAsset(title)))
    }
}
