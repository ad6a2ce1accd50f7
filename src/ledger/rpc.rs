//! JSON-RPC ledger client
//!
//! Talks to a full node over HTTP. Reads map failures to
//! `Error::Lookup`, dispatch failures to `Error::SubmissionFailure`.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use futures::future::try_join_all;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::address::{Address, ObjectId};
use super::wire::{self, GasData, ResolvedObject};
use super::{
    CoinBalance, CoinObject, DynamicFieldName, LedgerClient, ObjectRef, ReturnValue,
    TransactionResult, NATIVE_COIN_TYPE,
};
use crate::error::{Error, Result};
use crate::transaction::{Input, ObjectInput, TransactionDraft};

/// Page size for coin listings
const COIN_PAGE_LIMIT: u32 = 50;

/// The ledger accepts at most this many gas payment objects
const MAX_GAS_OBJECTS: usize = 256;

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinPage {
    data: Vec<RpcCoin>,
    next_cursor: Option<String>,
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcCoin {
    coin_type: String,
    coin_object_id: String,
    version: Value,
    digest: String,
    balance: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBalance {
    coin_type: String,
    coin_object_count: u64,
    total_balance: Value,
}

#[derive(Debug, Deserialize)]
struct RpcCoinMetadata {
    decimals: u8,
}

#[derive(Debug, Deserialize)]
struct RpcObjectResponse {
    data: Option<RpcObjectData>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcObjectData {
    object_id: String,
    version: Value,
    digest: String,
    owner: Option<Value>,
    content: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcDevInspect {
    results: Option<Vec<RpcExecutionResult>>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcExecutionResult {
    #[serde(default)]
    return_values: Vec<(Vec<u8>, String)>,
}

#[derive(Debug, Deserialize)]
struct RpcExecuteResponse {
    digest: String,
    effects: Option<RpcEffects>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcEffects {
    status: RpcStatus,
    gas_used: Option<RpcGasUsed>,
}

#[derive(Debug, Deserialize)]
struct RpcStatus {
    status: String,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcGasUsed {
    computation_cost: Value,
    storage_cost: Value,
    storage_rebate: Value,
}

/// Numbers arrive either as JSON numbers or as decimal strings
fn number<T: std::str::FromStr>(value: &Value, what: &str) -> Result<T> {
    let parsed = match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| Error::Lookup(format!("malformed {}: {}", what, value)))
}

impl RpcCoin {
    fn into_coin(self) -> Result<CoinObject> {
        Ok(CoinObject {
            object_id: self.coin_object_id.parse()?,
            version: number(&self.version, "coin version")?,
            digest: self.digest,
            coin_type: self.coin_type,
            balance: number(&self.balance, "coin balance")?,
        })
    }
}

impl RpcObjectData {
    fn resolve(&self) -> Result<ResolvedObject> {
        if let Some(shared) = self.owner.as_ref().and_then(|o| o.get("Shared")) {
            let version = shared
                .get("initial_shared_version")
                .ok_or_else(|| Error::Lookup(format!("shared object {} has no version", self.object_id)))?;
            return Ok(ResolvedObject::Shared {
                initial_shared_version: number(version, "initial shared version")?,
            });
        }

        Ok(ResolvedObject::Owned(ObjectRef {
            object_id: self.object_id.parse()?,
            version: number(&self.version, "object version")?,
            digest: self.digest.clone(),
        }))
    }
}

/// Ledger client over JSON-RPC
pub struct JsonRpcLedger {
    client: Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl JsonRpcLedger {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("RPC {} (id {})", method, id);

        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Lookup(format!("{} request failed: {}", method, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Lookup(format!("{} returned HTTP {}", method, status)));
        }

        let parsed: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| Error::Lookup(format!("{} response malformed: {}", method, e)))?;

        if let Some(err) = parsed.error {
            return Err(Error::Lookup(format!(
                "{} failed ({}): {}",
                method, err.code, err.message
            )));
        }

        parsed
            .result
            .ok_or_else(|| Error::Lookup(format!("{} returned no result", method)))
    }

    async fn get_object(&self, id: &ObjectId) -> Result<RpcObjectData> {
        let response: RpcObjectResponse = self
            .call(
                "sui_getObject",
                json!([id.to_string(), { "showOwner": true }]),
            )
            .await?;

        match (response.data, response.error) {
            (Some(data), _) => Ok(data),
            (None, Some(err)) => Err(Error::Lookup(format!("object {}: {}", id, err))),
            (None, None) => Err(Error::Lookup(format!("object {} not found", id))),
        }
    }

    /// Look up ownership of every id-only object input
    async fn resolve_objects(
        &self,
        draft: &TransactionDraft,
    ) -> Result<HashMap<ObjectId, ResolvedObject>> {
        let ids: Vec<ObjectId> = draft
            .inputs()
            .iter()
            .filter_map(|input| match input {
                Input::Object(ObjectInput::Id { id, .. }) => Some(*id),
                _ => None,
            })
            .collect();

        let resolved = try_join_all(ids.iter().map(|id| async move {
            let data = self.get_object(id).await?;
            Ok::<_, Error>((*id, data.resolve()?))
        }))
        .await?;

        Ok(resolved.into_iter().collect())
    }

    async fn reference_gas_price(&self) -> Result<u64> {
        let price: Value = self.call("suix_getReferenceGasPrice", json!([])).await?;
        number(&price, "reference gas price")
    }

    /// Native coins of the sender not already used as inputs
    async fn select_gas(
        &self,
        sender: &Address,
        draft: &TransactionDraft,
        budget: u64,
    ) -> Result<Vec<ObjectRef>> {
        let used: HashSet<ObjectId> = draft
            .inputs()
            .iter()
            .filter_map(|input| match input {
                Input::Object(object) => Some(object.id()),
                Input::Pure(_) => None,
            })
            .collect();

        let coins: Vec<CoinObject> = self
            .get_coins(sender, NATIVE_COIN_TYPE)
            .await?
            .into_iter()
            .filter(|coin| !used.contains(&coin.object_id))
            .take(MAX_GAS_OBJECTS)
            .collect();

        let total: u128 = coins.iter().map(|c| c.balance as u128).sum();
        if coins.is_empty() || total < budget as u128 {
            return Err(Error::TransactionBuild(format!(
                "gas coins of {} hold {} but the budget is {}",
                sender, total, budget
            )));
        }

        Ok(coins.iter().map(CoinObject::object_ref).collect())
    }
}

#[async_trait]
impl LedgerClient for JsonRpcLedger {
    async fn get_coins(&self, owner: &Address, coin_type: &str) -> Result<Vec<CoinObject>> {
        let mut coins = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page: CoinPage = self
                .call(
                    "suix_getCoins",
                    json!([owner.to_string(), coin_type, cursor, COIN_PAGE_LIMIT]),
                )
                .await?;

            for coin in page.data {
                coins.push(coin.into_coin()?);
            }

            match (page.has_next_page, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        debug!("{} owns {} coin objects of {}", owner, coins.len(), coin_type);
        Ok(coins)
    }

    async fn get_balance(&self, owner: &Address, coin_type: &str) -> Result<u128> {
        let balance: RpcBalance = self
            .call("suix_getBalance", json!([owner.to_string(), coin_type]))
            .await?;
        number(&balance.total_balance, "total balance")
    }

    async fn get_all_balances(&self, owner: &Address) -> Result<Vec<CoinBalance>> {
        let balances: Vec<RpcBalance> = self
            .call("suix_getAllBalances", json!([owner.to_string()]))
            .await?;

        balances
            .into_iter()
            .map(|b| {
                Ok(CoinBalance {
                    total_balance: number(&b.total_balance, "total balance")?,
                    coin_type: b.coin_type,
                    coin_object_count: b.coin_object_count,
                })
            })
            .collect()
    }

    async fn get_coin_decimals(&self, coin_type: &str) -> Result<Option<u8>> {
        let metadata: Option<RpcCoinMetadata> = self
            .call("suix_getCoinMetadata", json!([coin_type]))
            .await
            .or_else(|e| match e {
                // Nodes answer unknown metadata with a null result
                Error::Lookup(ref msg) if msg.contains("returned no result") => Ok(None),
                other => Err(other),
            })?;
        Ok(metadata.map(|m| m.decimals))
    }

    async fn get_dynamic_field(
        &self,
        parent: &ObjectId,
        name: &DynamicFieldName,
    ) -> Result<Option<Value>> {
        let response: RpcObjectResponse = self
            .call(
                "suix_getDynamicFieldObject",
                json!([parent.to_string(), name]),
            )
            .await?;

        let Some(data) = response.data else {
            debug!("dynamic field {:?} absent under {}", name, parent);
            return Ok(None);
        };

        let fields = data
            .content
            .and_then(|c| c.get("fields").cloned())
            .ok_or_else(|| Error::Lookup(format!("dynamic field under {} has no content", parent)))?;
        Ok(Some(fields))
    }

    async fn build_transaction(&self, draft: &TransactionDraft, gas_budget: u64) -> Result<Vec<u8>> {
        let sender = draft
            .sender()
            .ok_or_else(|| Error::TransactionBuild("draft has no sender".into()))?;

        let resolved = self.resolve_objects(draft).await?;
        let price = self.reference_gas_price().await?;
        let payment = self.select_gas(&sender, draft, gas_budget).await?;

        debug!(
            "Encoding transaction: {} inputs, {} commands, {} gas coins, price {}",
            draft.inputs().len(),
            draft.commands().len(),
            payment.len(),
            price
        );

        let gas = GasData::new(&payment, sender, price, gas_budget)?;
        wire::transaction_data_bytes(draft, &resolved, sender, gas)
    }

    async fn execute_transaction(&self, tx_bytes: &[u8], signature: &str) -> Result<TransactionResult> {
        let response: RpcExecuteResponse = self
            .call(
                "sui_executeTransactionBlock",
                json!([
                    BASE64.encode(tx_bytes),
                    [signature],
                    { "showEffects": true },
                    "WaitForLocalExecution"
                ]),
            )
            .await
            .map_err(|e| match e {
                Error::Lookup(msg) => Error::SubmissionFailure(msg),
                other => other,
            })?;

        let effects = response
            .effects
            .ok_or_else(|| Error::SubmissionFailure(format!("{}: no effects returned", response.digest)))?;

        let gas_used = effects.gas_used.as_ref().and_then(|g| {
            let computation: u64 = number(&g.computation_cost, "gas").ok()?;
            let storage: u64 = number(&g.storage_cost, "gas").ok()?;
            let rebate: u64 = number(&g.storage_rebate, "gas").ok()?;
            Some((computation + storage).saturating_sub(rebate))
        });

        let success = effects.status.status == "success";
        if success {
            info!("Transaction {} executed", response.digest);
        } else {
            warn!(
                "Transaction {} failed: {:?}",
                response.digest, effects.status.error
            );
        }

        Ok(TransactionResult {
            digest: response.digest,
            success,
            error: effects.status.error,
            gas_used,
        })
    }

    async fn dev_inspect(
        &self,
        sender: &Address,
        draft: &TransactionDraft,
    ) -> Result<Vec<Vec<ReturnValue>>> {
        let resolved = self
            .resolve_objects(draft)
            .await
            .map_err(|e| Error::Simulation(e.to_string()))?;
        let kind = wire::transaction_kind_bytes(draft, &resolved)?;

        let response: RpcDevInspect = self
            .call(
                "sui_devInspectTransactionBlock",
                json!([sender.to_string(), BASE64.encode(kind), null, null]),
            )
            .await
            .map_err(|e| Error::Simulation(e.to_string()))?;

        if let Some(err) = response.error {
            return Err(Error::Simulation(err));
        }

        let results = response
            .results
            .ok_or_else(|| Error::Simulation("no results returned".into()))?;

        Ok(results
            .into_iter()
            .map(|r| {
                r.return_values
                    .into_iter()
                    .map(|(bytes, type_)| ReturnValue { bytes, type_ })
                    .collect()
            })
            .collect())
    }
}
