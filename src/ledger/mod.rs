//! Ledger boundary
//!
//! Everything the account client needs from the chain goes through
//! [`LedgerClient`]: coin listing, dynamic-field reads, read-only
//! simulation and transaction dispatch. [`JsonRpcLedger`] talks to a
//! full node over JSON-RPC; tests substitute a recording fixture.

pub mod address;
pub mod rpc;
pub mod type_tag;
pub mod wire;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::transaction::TransactionDraft;

pub use address::{Address, ObjectId, ADDRESS_LENGTH};
pub use rpc::JsonRpcLedger;
pub use type_tag::{canonical_coin_type, StructTag, TypeTag, NATIVE_COIN_TYPE};

/// Version and digest pinning an owned object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub object_id: ObjectId,
    pub version: u64,
    /// Base58 object digest
    pub digest: String,
}

/// A discrete coin object owned by one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinObject {
    pub object_id: ObjectId,
    pub version: u64,
    pub digest: String,
    pub coin_type: String,
    pub balance: u64,
}

impl CoinObject {
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef {
            object_id: self.object_id,
            version: self.version,
            digest: self.digest.clone(),
        }
    }
}

/// Total holding of one coin type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinBalance {
    pub coin_type: String,
    pub coin_object_count: u64,
    pub total_balance: u128,
}

/// Key of a dynamic field under a parent object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicFieldName {
    #[serde(rename = "type")]
    pub type_: String,
    pub value: serde_json::Value,
}

impl DynamicFieldName {
    /// Field keyed by an address
    pub fn address(address: &Address) -> Self {
        Self {
            type_: "address".to_string(),
            value: serde_json::Value::String(address.to_string()),
        }
    }
}

/// One value returned by a simulated command: raw bytes and Move type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnValue {
    pub bytes: Vec<u8>,
    pub type_: String,
}

/// Outcome of an executed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResult {
    pub digest: String,
    pub success: bool,
    /// Ledger's failure message when `success` is false
    pub error: Option<String>,
    pub gas_used: Option<u64>,
}

/// Access to the ledger
///
/// Every call is independent; none of them retry.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Coin objects of one type owned by `owner`, in ledger order
    async fn get_coins(&self, owner: &Address, coin_type: &str) -> Result<Vec<CoinObject>>;

    /// Total balance of one coin type owned by `owner`
    async fn get_balance(&self, owner: &Address, coin_type: &str) -> Result<u128>;

    /// Totals of every coin type owned by `owner`
    async fn get_all_balances(&self, owner: &Address) -> Result<Vec<CoinBalance>>;

    /// Decimal precision from the coin's metadata, if published
    async fn get_coin_decimals(&self, coin_type: &str) -> Result<Option<u8>>;

    /// Content fields of a dynamic field object, or `None` if absent
    async fn get_dynamic_field(
        &self,
        parent: &ObjectId,
        name: &DynamicFieldName,
    ) -> Result<Option<serde_json::Value>>;

    /// Resolve object references and gas, and encode the draft for signing
    async fn build_transaction(&self, draft: &TransactionDraft, gas_budget: u64) -> Result<Vec<u8>>;

    /// Dispatch signed transaction bytes
    async fn execute_transaction(&self, tx_bytes: &[u8], signature: &str) -> Result<TransactionResult>;

    /// Run the draft without committing; results per command
    async fn dev_inspect(
        &self,
        sender: &Address,
        draft: &TransactionDraft,
    ) -> Result<Vec<Vec<ReturnValue>>>;
}
