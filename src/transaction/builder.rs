//! Operation sequencer
//!
//! One builder method per account action. Each returns a fresh draft with
//! the sender set; nothing here signs or submits. Precondition failures
//! (arity, unknown pool, short balance) surface before a draft exists.

use std::sync::Arc;
use tracing::{debug, info};

use super::aggregator::{aggregate, check_amounts};
use super::draft::{Argument, TransactionDraft};
use crate::error::{Error, Result};
use crate::ledger::{Address, LedgerClient, ObjectId};
use crate::protocol::calls::ProtocolCalls;
use crate::protocol::registry::{Asset, AssetRef, ProtocolConfig};

/// Builds drafts for every account action against one ledger and registry
pub struct TransactionBuilder {
    ledger: Arc<dyn LedgerClient>,
    protocol: Arc<ProtocolConfig>,
}

impl TransactionBuilder {
    pub fn new(ledger: Arc<dyn LedgerClient>, protocol: Arc<ProtocolConfig>) -> Self {
        Self { ledger, protocol }
    }

    pub fn protocol(&self) -> &ProtocolConfig {
        &self.protocol
    }

    fn draft(sender: Address) -> TransactionDraft {
        let mut draft = TransactionDraft::new();
        draft.set_sender(sender);
        draft
    }

    /// Fragments of `asset` for `amounts`, appended to `draft`
    ///
    /// The native asset is split from gas without any coin lookup.
    async fn fragments(
        &self,
        draft: &mut TransactionDraft,
        sender: &Address,
        asset: &Asset,
        amounts: &[u64],
    ) -> Result<Vec<Argument>> {
        if asset.is_native() {
            return aggregate(draft, &asset.coin_type, amounts, &[]);
        }
        let coins = self.ledger.get_coins(sender, &asset.coin_type).await?;
        debug!("{} holds {} coin(s) of {}", sender.short_hex(), coins.len(), asset.label());
        aggregate(draft, &asset.coin_type, amounts, &coins)
    }

    async fn fragment(
        &self,
        draft: &mut TransactionDraft,
        sender: &Address,
        asset: &Asset,
        amount: u64,
    ) -> Result<Argument> {
        self.fragments(draft, sender, asset, &[amount])
            .await?
            .pop()
            .ok_or_else(|| Error::TransactionBuild("split produced no fragment".into()))
    }

    /// Send `amount` of `asset` to one recipient
    pub async fn build_send(
        &self,
        sender: Address,
        asset: &AssetRef,
        recipient: Address,
        amount: u64,
    ) -> Result<TransactionDraft> {
        self.build_send_many(sender, asset, &[recipient], &[amount]).await
    }

    /// Send `amounts[i]` to `recipients[i]` in one transaction
    pub async fn build_send_many(
        &self,
        sender: Address,
        asset: &AssetRef,
        recipients: &[Address],
        amounts: &[u64],
    ) -> Result<TransactionDraft> {
        if recipients.len() != amounts.len() {
            return Err(Error::ArityMismatch {
                left: recipients.len(),
                right: amounts.len(),
            });
        }
        let required = check_amounts(amounts)?;
        let asset = self.protocol.resolve_asset(asset)?;

        if asset.is_native() {
            let available = self.ledger.get_balance(&sender, &asset.coin_type).await?;
            if available < required {
                return Err(Error::InsufficientBalance {
                    coin_type: asset.coin_type,
                    available,
                    required,
                });
            }
        }

        let mut draft = Self::draft(sender);
        let fragments = self.fragments(&mut draft, &sender, &asset, amounts).await?;
        for (fragment, recipient) in fragments.into_iter().zip(recipients) {
            let recipient = draft.pure_address(*recipient)?;
            draft.transfer_objects(vec![fragment], recipient);
        }

        info!(
            "Built send of {} {} to {} recipient(s)",
            required,
            asset.label(),
            recipients.len()
        );
        Ok(draft)
    }

    /// Transfer one owned object
    pub async fn build_transfer_object(
        &self,
        sender: Address,
        object_id: ObjectId,
        recipient: Address,
    ) -> Result<TransactionDraft> {
        self.build_transfer_objects(sender, &[object_id], &[recipient])
    }

    /// Transfer `objects[i]` to `recipients[i]`
    pub fn build_transfer_objects(
        &self,
        sender: Address,
        objects: &[ObjectId],
        recipients: &[Address],
    ) -> Result<TransactionDraft> {
        if objects.len() != recipients.len() {
            return Err(Error::ArityMismatch {
                left: objects.len(),
                right: recipients.len(),
            });
        }
        if objects.is_empty() {
            return Err(Error::TransactionBuild("no objects to transfer".into()));
        }

        let mut draft = Self::draft(sender);
        for (object, recipient) in objects.iter().zip(recipients) {
            let object = draft.object_id(*object, true);
            let recipient = draft.pure_address(*recipient)?;
            draft.transfer_objects(vec![object], recipient);
        }
        debug!("Built transfer of {} object(s)", objects.len());
        Ok(draft)
    }

    /// Supply `amount` of `asset` to its pool
    pub async fn build_deposit(
        &self,
        sender: Address,
        asset: &AssetRef,
        amount: u64,
    ) -> Result<TransactionDraft> {
        let asset = self.protocol.resolve_asset(asset)?;
        let pool = asset.require_pool()?;

        let mut draft = Self::draft(sender);
        let coin = self.fragment(&mut draft, &sender, &asset, amount).await?;
        ProtocolCalls::new(&self.protocol).deposit(&mut draft, pool, coin, amount)?;

        info!("Built deposit of {} {}", amount, pool.symbol);
        Ok(draft)
    }

    /// Supply on behalf of the position owned by `account_cap`
    pub async fn build_deposit_with_account_cap(
        &self,
        sender: Address,
        asset: &AssetRef,
        amount: u64,
        account_cap: ObjectId,
    ) -> Result<TransactionDraft> {
        let asset = self.protocol.resolve_asset(asset)?;
        let pool = asset.require_pool()?;

        let mut draft = Self::draft(sender);
        let coin = self.fragment(&mut draft, &sender, &asset, amount).await?;
        ProtocolCalls::new(&self.protocol).deposit_with_account_cap(
            &mut draft,
            pool,
            coin,
            account_cap,
        )?;

        info!(
            "Built deposit of {} {} with account cap {}",
            amount,
            pool.symbol,
            account_cap.short_hex()
        );
        Ok(draft)
    }

    /// Withdraw `amount` of `asset` back to the sender
    pub async fn build_withdraw(
        &self,
        sender: Address,
        asset: &AssetRef,
        amount: u64,
    ) -> Result<TransactionDraft> {
        check_amounts(&[amount])?;
        let asset = self.protocol.resolve_asset(asset)?;
        let pool = asset.require_pool()?;

        let mut draft = Self::draft(sender);
        ProtocolCalls::new(&self.protocol).withdraw(&mut draft, pool, amount, sender)?;

        info!("Built withdraw of {} {}", amount, pool.symbol);
        Ok(draft)
    }

    /// Withdraw from the position owned by `account_cap`, paying the sender
    pub async fn build_withdraw_with_account_cap(
        &self,
        sender: Address,
        asset: &AssetRef,
        amount: u64,
        account_cap: ObjectId,
    ) -> Result<TransactionDraft> {
        check_amounts(&[amount])?;
        let asset = self.protocol.resolve_asset(asset)?;
        let pool = asset.require_pool()?;

        let mut draft = Self::draft(sender);
        ProtocolCalls::new(&self.protocol).withdraw_with_account_cap(
            &mut draft,
            pool,
            amount,
            account_cap,
            sender,
        )?;

        info!(
            "Built withdraw of {} {} with account cap {}",
            amount,
            pool.symbol,
            account_cap.short_hex()
        );
        Ok(draft)
    }

    /// Borrow `amount` of `asset` to the sender
    pub async fn build_borrow(
        &self,
        sender: Address,
        asset: &AssetRef,
        amount: u64,
    ) -> Result<TransactionDraft> {
        check_amounts(&[amount])?;
        let asset = self.protocol.resolve_asset(asset)?;
        let pool = asset.require_pool()?;

        let mut draft = Self::draft(sender);
        ProtocolCalls::new(&self.protocol).borrow(&mut draft, pool, amount, sender)?;

        info!("Built borrow of {} {}", amount, pool.symbol);
        Ok(draft)
    }

    /// Repay `amount` of debt in `asset`
    pub async fn build_repay(
        &self,
        sender: Address,
        asset: &AssetRef,
        amount: u64,
    ) -> Result<TransactionDraft> {
        let asset = self.protocol.resolve_asset(asset)?;
        let pool = asset.require_pool()?;

        let mut draft = Self::draft(sender);
        let coin = self.fragment(&mut draft, &sender, &asset, amount).await?;
        ProtocolCalls::new(&self.protocol).repay(&mut draft, pool, coin, amount)?;

        info!("Built repay of {} {}", amount, pool.symbol);
        Ok(draft)
    }

    /// Create an account capability owned by the sender
    pub fn build_create_account_cap(&self, sender: Address) -> Result<TransactionDraft> {
        let mut draft = Self::draft(sender);
        ProtocolCalls::new(&self.protocol).create_account_cap(&mut draft, sender)?;
        Ok(draft)
    }
}
