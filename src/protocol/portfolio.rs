//! Per-pool supply and borrow positions
//!
//! Each pool keeps per-user balances in two tables keyed by address. A
//! position read is two dynamic-field lookups; all pools are read
//! concurrently and the first failure aborts the whole read.

use futures::future::try_join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::registry::{PoolConfig, ProtocolConfig};
use crate::error::{Error, Result};
use crate::ledger::{Address, DynamicFieldName, LedgerClient, ObjectId};

/// Raw scaled on-chain balances of one pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolPosition {
    pub supply: u128,
    pub borrow: u128,
}

impl PoolPosition {
    pub fn is_empty(&self) -> bool {
        self.supply == 0 && self.borrow == 0
    }
}

pub struct PortfolioReader {
    ledger: Arc<dyn LedgerClient>,
    protocol: Arc<ProtocolConfig>,
}

impl PortfolioReader {
    pub fn new(ledger: Arc<dyn LedgerClient>, protocol: Arc<ProtocolConfig>) -> Self {
        Self { ledger, protocol }
    }

    /// Position in every pool that publishes its balance tables, by symbol
    pub async fn portfolio(&self, address: &Address) -> Result<BTreeMap<String, PoolPosition>> {
        let pools: Vec<(&PoolConfig, ObjectId, ObjectId)> = self
            .protocol
            .pools
            .iter()
            .filter_map(|pool| {
                match (pool.supply_balance_parent_id, pool.borrow_balance_parent_id) {
                    (Some(supply), Some(borrow)) => Some((pool, supply, borrow)),
                    _ => {
                        debug!("Skipping {}: no balance tables configured", pool.symbol);
                        None
                    }
                }
            })
            .collect();

        let reads = pools.into_iter().map(|(pool, supply, borrow)| async move {
            let (supply, borrow) = futures::try_join!(
                self.table_entry(&supply, address),
                self.table_entry(&borrow, address)
            )?;
            Ok::<_, Error>((pool.symbol.clone(), PoolPosition { supply, borrow }))
        });

        let positions: BTreeMap<String, PoolPosition> =
            try_join_all(reads).await?.into_iter().collect();

        info!(
            "Read {} pool position(s) for {}",
            positions.len(),
            address.short_hex()
        );
        Ok(positions)
    }

    /// Value stored under `address` in the table `parent`, zero if absent
    async fn table_entry(&self, parent: &ObjectId, address: &Address) -> Result<u128> {
        let name = DynamicFieldName::address(address);
        match self.ledger.get_dynamic_field(parent, &name).await? {
            Some(fields) => field_value(&fields),
            None => Ok(0),
        }
    }
}

fn field_value(fields: &Value) -> Result<u128> {
    let value = fields
        .get("value")
        .ok_or_else(|| Error::Lookup(format!("dynamic field without value: {}", fields)))?;
    let parsed = match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64().map(u128::from),
        _ => None,
    };
    parsed.ok_or_else(|| Error::Lookup(format!("unreadable balance: {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::MockLedger;
    use serde_json::json;

    const USER: Address = Address::from_u8(0x77);

    fn reader(ledger: MockLedger) -> PortfolioReader {
        PortfolioReader::new(Arc::new(ledger), Arc::new(ProtocolConfig::default()))
    }

    fn parents(symbol: &str) -> (ObjectId, ObjectId) {
        let config = ProtocolConfig::default();
        let pool = config.pool(symbol).unwrap();
        (
            pool.supply_balance_parent_id.unwrap(),
            pool.borrow_balance_parent_id.unwrap(),
        )
    }

    #[tokio::test]
    async fn test_portfolio_reads_configured_pools() {
        let (usdc_supply, usdc_borrow) = parents("USDC");
        let (sui_supply, _) = parents("SUI");
        let ledger = MockLedger::new()
            .with_dynamic_field(usdc_supply, &USER, json!({ "name": USER.to_string(), "value": "2500000" }))
            .with_dynamic_field(usdc_borrow, &USER, json!({ "name": USER.to_string(), "value": "1000" }))
            .with_dynamic_field(sui_supply, &USER, json!({ "value": 7 }));

        let positions = reader(ledger).portfolio(&USER).await.unwrap();

        // Only SUI, USDC and USDT publish their tables
        assert_eq!(
            positions.keys().cloned().collect::<Vec<_>>(),
            vec!["SUI".to_string(), "USDC".to_string(), "USDT".to_string()]
        );
        assert_eq!(positions["USDC"], PoolPosition { supply: 2_500_000, borrow: 1_000 });
        assert_eq!(positions["SUI"], PoolPosition { supply: 7, borrow: 0 });
        assert!(positions["USDT"].is_empty());
    }

    #[tokio::test]
    async fn test_portfolio_fails_fast() {
        let err = reader(MockLedger::new().failing_lookups())
            .portfolio(&USER)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Lookup(_)));
    }

    #[test]
    fn test_field_value_shapes() {
        assert_eq!(field_value(&json!({ "value": "340282366920938463463374607431768211455" })).unwrap(), u128::MAX);
        assert!(field_value(&json!({ "value": true })).is_err());
        assert!(field_value(&json!({})).is_err());
    }
}
