//! Recording ledger fixture for tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::type_tag::canonical_coin_type;
use super::{
    Address, CoinBalance, CoinObject, DynamicFieldName, LedgerClient, ObjectId, ReturnValue,
    TransactionResult,
};
use crate::error::{Error, Result};
use crate::transaction::TransactionDraft;

#[derive(Default)]
pub struct MockLedger {
    coins: HashMap<(Address, String), Vec<CoinObject>>,
    decimals: HashMap<String, u8>,
    dynamic_fields: HashMap<(ObjectId, String), Value>,
    inspect_results: Vec<Vec<ReturnValue>>,
    inspect_error: Option<String>,
    fail_lookups: bool,
    reject_with: Option<String>,
    pub coin_lookups: AtomicUsize,
    pub balance_lookups: AtomicUsize,
    pub built: Mutex<Vec<TransactionDraft>>,
    pub executed: Mutex<Vec<(Vec<u8>, String)>>,
    pub inspected: Mutex<Vec<TransactionDraft>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `owner` one coin object per balance, ids derived from `seed`
    pub fn with_coins(mut self, owner: Address, coin_type: &str, seed: u8, balances: &[u64]) -> Self {
        let coin_type = canonical_coin_type(coin_type).expect("fixture coin type");
        let coins = balances
            .iter()
            .enumerate()
            .map(|(i, balance)| CoinObject {
                object_id: coin_id(seed, i),
                version: 1,
                digest: bs58::encode([i as u8 + 1; 32]).into_string(),
                coin_type: coin_type.clone(),
                balance: *balance,
            })
            .collect();
        self.coins.insert((owner, coin_type), coins);
        self
    }

    pub fn with_decimals(mut self, coin_type: &str, decimals: u8) -> Self {
        let coin_type = canonical_coin_type(coin_type).expect("fixture coin type");
        self.decimals.insert(coin_type, decimals);
        self
    }

    pub fn with_dynamic_field(mut self, parent: ObjectId, key: &Address, fields: Value) -> Self {
        self.dynamic_fields.insert((parent, key.to_string()), fields);
        self
    }

    pub fn with_inspect_result(mut self, values: Vec<ReturnValue>) -> Self {
        self.inspect_results.push(values);
        self
    }

    pub fn with_inspect_error(mut self, message: &str) -> Self {
        self.inspect_error = Some(message.to_string());
        self
    }

    pub fn failing_lookups(mut self) -> Self {
        self.fail_lookups = true;
        self
    }

    pub fn rejecting(mut self, message: &str) -> Self {
        self.reject_with = Some(message.to_string());
        self
    }

    pub fn coin_lookup_count(&self) -> usize {
        self.coin_lookups.load(Ordering::SeqCst)
    }

    fn check_lookup(&self) -> Result<()> {
        if self.fail_lookups {
            Err(Error::Lookup("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

/// Deterministic object id for fixture coins
pub fn coin_id(seed: u8, index: usize) -> ObjectId {
    let mut bytes = [0u8; 32];
    bytes[0] = seed;
    bytes[31] = index as u8 + 1;
    Address::new(bytes)
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn get_coins(&self, owner: &Address, coin_type: &str) -> Result<Vec<CoinObject>> {
        self.coin_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_lookup()?;
        Ok(self
            .coins
            .get(&(*owner, coin_type.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_balance(&self, owner: &Address, coin_type: &str) -> Result<u128> {
        self.balance_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_lookup()?;
        Ok(self
            .coins
            .get(&(*owner, coin_type.to_string()))
            .map(|coins| coins.iter().map(|c| c.balance as u128).sum())
            .unwrap_or(0))
    }

    async fn get_all_balances(&self, owner: &Address) -> Result<Vec<CoinBalance>> {
        self.check_lookup()?;
        let mut balances: Vec<CoinBalance> = self
            .coins
            .iter()
            .filter(|((o, _), _)| o == owner)
            .map(|((_, coin_type), coins)| CoinBalance {
                coin_type: coin_type.clone(),
                coin_object_count: coins.len() as u64,
                total_balance: coins.iter().map(|c| c.balance as u128).sum(),
            })
            .collect();
        balances.sort_by(|a, b| a.coin_type.cmp(&b.coin_type));
        Ok(balances)
    }

    async fn get_coin_decimals(&self, coin_type: &str) -> Result<Option<u8>> {
        self.check_lookup()?;
        Ok(self.decimals.get(coin_type).copied())
    }

    async fn get_dynamic_field(
        &self,
        parent: &ObjectId,
        name: &DynamicFieldName,
    ) -> Result<Option<Value>> {
        self.check_lookup()?;
        let key = name.value.as_str().unwrap_or_default().to_string();
        Ok(self.dynamic_fields.get(&(*parent, key)).cloned())
    }

    async fn build_transaction(&self, draft: &TransactionDraft, _gas_budget: u64) -> Result<Vec<u8>> {
        self.check_lookup()?;
        self.built.lock().unwrap().push(draft.clone());
        Ok(format!("{:?}", draft).into_bytes())
    }

    async fn execute_transaction(&self, tx_bytes: &[u8], signature: &str) -> Result<TransactionResult> {
        self.executed
            .lock()
            .unwrap()
            .push((tx_bytes.to_vec(), signature.to_string()));

        Ok(TransactionResult {
            digest: "MockDigest".to_string(),
            success: self.reject_with.is_none(),
            error: self.reject_with.clone(),
            gas_used: Some(1_000_000),
        })
    }

    async fn dev_inspect(
        &self,
        _sender: &Address,
        draft: &TransactionDraft,
    ) -> Result<Vec<Vec<ReturnValue>>> {
        self.inspected.lock().unwrap().push(draft.clone());
        if let Some(err) = &self.inspect_error {
            return Err(Error::Simulation(err.clone()));
        }
        Ok(self.inspect_results.clone())
    }
}
