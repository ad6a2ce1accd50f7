//! Account facade
//!
//! Binds one signing identity to a ledger and the protocol registry. Every
//! mutating action builds a draft and submits it in one step; reads go
//! straight to the matching reader.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use super::balance::BalanceReader;
use super::signer::TransactionSigner;
use crate::error::Result;
use crate::ledger::{Address, CoinBalance, CoinObject, LedgerClient, ObjectId, TransactionResult};
use crate::protocol::{
    AssetRef, HealthEvaluator, PoolPosition, PortfolioReader, Projection, ProtocolConfig,
};
use crate::transaction::{submit, TransactionBuilder, TransactionDraft};

pub struct AccountManager {
    ledger: Arc<dyn LedgerClient>,
    signer: Arc<dyn TransactionSigner>,
    gas_budget: u64,
    builder: TransactionBuilder,
    balances: BalanceReader,
    health: HealthEvaluator,
    portfolio: PortfolioReader,
}

impl AccountManager {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        protocol: Arc<ProtocolConfig>,
        signer: Arc<dyn TransactionSigner>,
        gas_budget: u64,
    ) -> Self {
        Self {
            builder: TransactionBuilder::new(ledger.clone(), protocol.clone()),
            balances: BalanceReader::new(ledger.clone(), protocol.clone()),
            health: HealthEvaluator::new(ledger.clone(), protocol.clone()),
            portfolio: PortfolioReader::new(ledger.clone(), protocol),
            ledger,
            signer,
            gas_budget,
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Draft builder bound to this account's ledger, for previews
    pub fn builder(&self) -> &TransactionBuilder {
        &self.builder
    }

    pub fn balances(&self) -> &BalanceReader {
        &self.balances
    }

    pub fn gas_budget(&self) -> u64 {
        self.gas_budget
    }

    /// Sign and submit a prepared draft
    pub async fn execute(&self, draft: TransactionDraft) -> Result<TransactionResult> {
        submit(
            self.ledger.as_ref(),
            self.signer.as_ref(),
            draft,
            self.gas_budget,
        )
        .await
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub async fn balance(&self, asset: &AssetRef) -> Result<u128> {
        self.balances.total_balance(&self.address(), asset).await
    }

    pub async fn coins(&self, asset: &AssetRef) -> Result<Vec<CoinObject>> {
        self.balances.list_coins(&self.address(), asset).await
    }

    pub async fn all_balances(&self) -> Result<Vec<CoinBalance>> {
        self.balances.all_balances(&self.address()).await
    }

    /// Health factor of `address`, defaulting to this account
    pub async fn health_factor(&self, address: Option<Address>) -> Result<f64> {
        let address = address.unwrap_or_else(|| self.address());
        self.health.evaluate(&address).await
    }

    pub async fn dynamic_health_factor(
        &self,
        address: Option<Address>,
        pool_symbol: &str,
        projection: Projection,
    ) -> Result<f64> {
        let address = address.unwrap_or_else(|| self.address());
        self.health
            .evaluate_dynamic(&address, pool_symbol, projection)
            .await
    }

    pub async fn portfolio(&self, address: Option<Address>) -> Result<BTreeMap<String, PoolPosition>> {
        let address = address.unwrap_or_else(|| self.address());
        self.portfolio.portfolio(&address).await
    }

    // -------------------------------------------------------------------------
    // Actions
    // -------------------------------------------------------------------------

    pub async fn send(
        &self,
        asset: &AssetRef,
        recipient: Address,
        amount: u64,
    ) -> Result<TransactionResult> {
        let draft = self
            .builder
            .build_send(self.address(), asset, recipient, amount)
            .await?;
        self.execute(draft).await
    }

    pub async fn send_many(
        &self,
        asset: &AssetRef,
        recipients: &[Address],
        amounts: &[u64],
    ) -> Result<TransactionResult> {
        let draft = self
            .builder
            .build_send_many(self.address(), asset, recipients, amounts)
            .await?;
        self.execute(draft).await
    }

    pub async fn transfer_object(
        &self,
        object_id: ObjectId,
        recipient: Address,
    ) -> Result<TransactionResult> {
        let draft = self
            .builder
            .build_transfer_object(self.address(), object_id, recipient)
            .await?;
        self.execute(draft).await
    }

    pub async fn transfer_objects(
        &self,
        objects: &[ObjectId],
        recipients: &[Address],
    ) -> Result<TransactionResult> {
        let draft = self
            .builder
            .build_transfer_objects(self.address(), objects, recipients)?;
        self.execute(draft).await
    }

    pub async fn deposit(&self, asset: &AssetRef, amount: u64) -> Result<TransactionResult> {
        let draft = self.builder.build_deposit(self.address(), asset, amount).await?;
        self.execute(draft).await
    }

    pub async fn deposit_with_account_cap(
        &self,
        asset: &AssetRef,
        amount: u64,
        account_cap: ObjectId,
    ) -> Result<TransactionResult> {
        let draft = self
            .builder
            .build_deposit_with_account_cap(self.address(), asset, amount, account_cap)
            .await?;
        self.execute(draft).await
    }

    pub async fn withdraw(&self, asset: &AssetRef, amount: u64) -> Result<TransactionResult> {
        let draft = self.builder.build_withdraw(self.address(), asset, amount).await?;
        self.execute(draft).await
    }

    pub async fn withdraw_with_account_cap(
        &self,
        asset: &AssetRef,
        amount: u64,
        account_cap: ObjectId,
    ) -> Result<TransactionResult> {
        let draft = self
            .builder
            .build_withdraw_with_account_cap(self.address(), asset, amount, account_cap)
            .await?;
        self.execute(draft).await
    }

    pub async fn borrow(&self, asset: &AssetRef, amount: u64) -> Result<TransactionResult> {
        let draft = self.builder.build_borrow(self.address(), asset, amount).await?;
        self.execute(draft).await
    }

    pub async fn repay(&self, asset: &AssetRef, amount: u64) -> Result<TransactionResult> {
        let draft = self.builder.build_repay(self.address(), asset, amount).await?;
        self.execute(draft).await
    }

    pub async fn create_account_cap(&self) -> Result<TransactionResult> {
        let draft = self.builder.build_create_account_cap(self.address())?;
        let result = self.execute(draft).await?;
        info!("Created account cap in {}", result.digest);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::ledger::mock::MockLedger;
    use crate::wallet::signer::MnemonicSigner;

    const PHRASE: &str = "film crazy soon outside stand loop subway crumble thrive popular green nuclear struggle pistol arm wife phrase warfare march wheat nephew ask sunny firm";
    const USDC: &str = "0x5d4b302506645c37ff133b98c4b50a5ae14841659738d6d733d59d0d217a93bf::coin::COIN";

    fn account(build: impl FnOnce(Address) -> MockLedger) -> (AccountManager, Arc<MockLedger>) {
        let signer = MnemonicSigner::from_phrase(PHRASE, 0).unwrap();
        let ledger = Arc::new(build(signer.address()));
        let account = AccountManager::new(
            ledger.clone(),
            Arc::new(ProtocolConfig::default()),
            Arc::new(signer),
            50_000_000,
        );
        (account, ledger)
    }

    #[tokio::test]
    async fn test_deposit_submits_once() {
        let (account, ledger) = account(|owner| MockLedger::new().with_coins(owner, USDC, 1, &[40, 60]));

        let result = account
            .deposit(&AssetRef::Symbol("USDC".into()), 100)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(ledger.executed.lock().unwrap().len(), 1);
        let built = ledger.built.lock().unwrap();
        assert_eq!(built[0].sender(), Some(account.address()));
        assert_eq!(built[0].merge_count(), 1);
    }

    #[tokio::test]
    async fn test_precondition_failure_submits_nothing() {
        let (account, ledger) = account(|owner| MockLedger::new().with_coins(owner, USDC, 1, &[10]));

        let err = account
            .repay(&AssetRef::Symbol("USDC".into()), 11)
            .await
            .unwrap_err();

        assert!(err.is_precondition());
        assert!(ledger.built.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_action_surfaces_submission_failure() {
        let (account, _) = account(|_| MockLedger::new().rejecting("InsufficientGas"));
        let err = account
            .borrow(&AssetRef::Symbol("SUI".into()), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SubmissionFailure(m) if m == "InsufficientGas"));
    }

    #[tokio::test]
    async fn test_balance_reads_own_address() {
        let (account, _) = account(|owner| MockLedger::new().with_coins(owner, USDC, 1, &[3, 4]));
        assert_eq!(account.balance(&AssetRef::Symbol("USDC".into())).await.unwrap(), 7);
        assert_eq!(account.coins(&AssetRef::CoinType(USDC.into())).await.unwrap().len(), 2);
    }
}
