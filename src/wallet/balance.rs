//! Balance reads and unit conversion

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::ledger::{Address, CoinBalance, CoinObject, LedgerClient};
use crate::protocol::registry::{AssetRef, ProtocolConfig};

/// Read-only view of an address's holdings
pub struct BalanceReader {
    ledger: Arc<dyn LedgerClient>,
    protocol: Arc<ProtocolConfig>,
}

impl BalanceReader {
    pub fn new(ledger: Arc<dyn LedgerClient>, protocol: Arc<ProtocolConfig>) -> Self {
        Self { ledger, protocol }
    }

    /// Decimal precision of `asset`
    ///
    /// Registry entries win; otherwise the coin's published metadata.
    pub async fn resolve_decimals(&self, asset: &AssetRef) -> Result<u8> {
        let asset = self.protocol.resolve_asset(asset)?;
        if let Some(pool) = &asset.pool {
            return Ok(pool.decimals);
        }

        match self.ledger.get_coin_decimals(&asset.coin_type).await? {
            Some(decimals) => Ok(decimals),
            None => {
                warn!("No metadata for {}", asset.coin_type);
                Err(Error::Lookup(format!(
                    "unknown decimals for {}",
                    asset.coin_type
                )))
            }
        }
    }

    /// Every coin object of `asset` owned by `address`, in ledger order
    pub async fn list_coins(&self, address: &Address, asset: &AssetRef) -> Result<Vec<CoinObject>> {
        let asset = self.protocol.resolve_asset(asset)?;
        let coins = self.ledger.get_coins(address, &asset.coin_type).await?;
        debug!(
            "{} owns {} coin object(s) of {}",
            address.short_hex(),
            coins.len(),
            asset.label()
        );
        Ok(coins)
    }

    /// Sum of every listed coin of `asset`
    pub async fn total_balance(&self, address: &Address, asset: &AssetRef) -> Result<u128> {
        let coins = self.list_coins(address, asset).await?;
        Ok(coins.iter().map(|c| c.balance as u128).sum())
    }

    /// Totals for every coin type `address` holds
    pub async fn all_balances(&self, address: &Address) -> Result<Vec<CoinBalance>> {
        self.ledger.get_all_balances(address).await
    }
}

/// Parse a human amount like `"1.25"` into smallest units
///
/// Exact: rejects more fractional digits than `decimals` and values that
/// do not fit in a `u64`.
pub fn parse_units(amount: &str, decimals: u8) -> Result<u64> {
    let amount = amount.trim();
    let invalid = || Error::InvalidAmount(format!("'{}'", amount));

    let (whole, fraction) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if fraction.len() > decimals as usize {
        return Err(Error::InvalidAmount(format!(
            "'{}' has more than {} decimal places",
            amount, decimals
        )));
    }

    let scale = 10u128
        .checked_pow(decimals as u32)
        .ok_or_else(invalid)?;
    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let fraction: u128 = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", fraction, width = decimals as usize);
        padded.parse().map_err(|_| invalid())?
    };

    let units = whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(invalid)?;
    u64::try_from(units).map_err(|_| Error::InvalidAmount(format!("'{}' is too large", amount)))
}

/// Render smallest units with `decimals` places, trailing zeros trimmed
pub fn format_units(units: u128, decimals: u8) -> String {
    if decimals == 0 {
        return units.to_string();
    }
    let digits = format!("{:0>width$}", units, width = decimals as usize + 1);
    let (whole, fraction) = digits.split_at(digits.len() - decimals as usize);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::MockLedger;

    const OWNER: Address = Address::from_u8(0x42);
    const USDC: &str = "0x5d4b302506645c37ff133b98c4b50a5ae14841659738d6d733d59d0d217a93bf::coin::COIN";
    const OTHER: &str = "0xbeef::meme::MEME";

    fn reader(ledger: MockLedger) -> BalanceReader {
        BalanceReader::new(Arc::new(ledger), Arc::new(ProtocolConfig::default()))
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("1", 9).unwrap(), 1_000_000_000);
        assert_eq!(parse_units("1.25", 6).unwrap(), 1_250_000);
        assert_eq!(parse_units(".5", 2).unwrap(), 50);
        assert_eq!(parse_units("0.000001", 6).unwrap(), 1);
        assert!(parse_units("0.0000001", 6).is_err());
        assert!(parse_units("abc", 6).is_err());
        assert!(parse_units("-1", 6).is_err());
        assert!(parse_units(".", 6).is_err());
        assert!(parse_units("18446744073709551616", 0).is_err());
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(1_250_000, 6), "1.25");
        assert_eq!(format_units(1, 9), "0.000000001");
        assert_eq!(format_units(5_000_000_000, 9), "5");
        assert_eq!(format_units(0, 6), "0");
        assert_eq!(format_units(42, 0), "42");
    }

    #[tokio::test]
    async fn test_total_balance_sums_coins() {
        let reader = reader(MockLedger::new().with_coins(OWNER, USDC, 1, &[10, 20, 30]));
        let total = reader
            .total_balance(&OWNER, &AssetRef::Symbol("USDC".into()))
            .await
            .unwrap();
        assert_eq!(total, 60);
    }

    #[tokio::test]
    async fn test_decimals_from_registry_then_metadata() {
        let reader = reader(MockLedger::new().with_decimals(OTHER, 4));

        assert_eq!(reader.resolve_decimals(&AssetRef::Symbol("USDC".into())).await.unwrap(), 6);
        assert_eq!(
            reader.resolve_decimals(&AssetRef::CoinType(OTHER.into())).await.unwrap(),
            4
        );
        assert!(matches!(
            reader
                .resolve_decimals(&AssetRef::CoinType("0xdead::x::X".into()))
                .await,
            Err(Error::Lookup(_))
        ));
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let reader = reader(MockLedger::new().failing_lookups());
        let err = reader
            .list_coins(&OWNER, &AssetRef::Symbol("SUI".into()))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_all_balances() {
        let reader = reader(
            MockLedger::new()
                .with_coins(OWNER, USDC, 1, &[1, 2])
                .with_coins(OWNER, OTHER, 2, &[5]),
        );
        let balances = reader.all_balances(&OWNER).await.unwrap();
        assert_eq!(balances.len(), 2);
        assert_eq!(balances.iter().map(|b| b.total_balance).sum::<u128>(), 8);
    }
}
