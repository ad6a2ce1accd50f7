//! Pool registry and asset resolution
//!
//! The registry is a plain value loaded with the configuration and passed
//! to every component that needs it. Callers name an asset by symbol, by
//! pool descriptor or by raw coin type; [`ProtocolConfig::resolve_asset`]
//! normalises all three into one canonical coin type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::ledger::{canonical_coin_type, Address, ObjectId, StructTag};

/// System clock object
pub const CLOCK_OBJECT_ID: Address = Address::from_u8(6);

/// Static descriptor of one lending pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub symbol: String,
    pub coin_type: String,
    pub decimals: u8,
    pub pool_id: ObjectId,
    pub asset_id: u8,
    /// Parent of the per-user borrow balance table
    #[serde(default)]
    pub borrow_balance_parent_id: Option<ObjectId>,
    /// Parent of the per-user supply balance table
    #[serde(default)]
    pub supply_balance_parent_id: Option<ObjectId>,
}

/// Protocol object ids and the pool table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub package: ObjectId,
    pub storage: ObjectId,
    pub price_oracle: ObjectId,
    pub incentive_v1: ObjectId,
    pub incentive_v2: ObjectId,
    #[serde(default = "default_clock")]
    pub clock: ObjectId,
    #[serde(default = "default_pools")]
    pub pools: Vec<PoolConfig>,
}

fn default_clock() -> ObjectId {
    CLOCK_OBJECT_ID
}

/// Caller-facing ways of naming an asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRef {
    /// Registry symbol, e.g. `SUI`
    Symbol(String),
    /// Full pool descriptor
    Pool(PoolConfig),
    /// Raw coin type, e.g. `0x2::sui::SUI`
    CoinType(String),
}

impl FromStr for AssetRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidTypeTag("empty asset".into()));
        }
        if s.contains("::") {
            Ok(AssetRef::CoinType(s.to_string()))
        } else {
            Ok(AssetRef::Symbol(s.to_string()))
        }
    }
}

impl From<&PoolConfig> for AssetRef {
    fn from(pool: &PoolConfig) -> Self {
        AssetRef::Pool(pool.clone())
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetRef::Symbol(s) => write!(f, "{}", s),
            AssetRef::Pool(p) => write!(f, "{}", p.symbol),
            AssetRef::CoinType(t) => write!(f, "{}", t),
        }
    }
}

/// An asset after resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Canonical coin type
    pub coin_type: String,
    /// Registry entry, if the asset has a pool
    pub pool: Option<PoolConfig>,
}

impl Asset {
    pub fn is_native(&self) -> bool {
        self.coin_type
            .parse::<StructTag>()
            .map(|tag| tag.is_native_coin())
            .unwrap_or(false)
    }

    /// Pool entry, or `UnknownPool` if the asset has none
    pub fn require_pool(&self) -> Result<&PoolConfig> {
        self.pool
            .as_ref()
            .ok_or_else(|| Error::UnknownPool(self.coin_type.clone()))
    }

    pub fn label(&self) -> &str {
        self.pool
            .as_ref()
            .map(|p| p.symbol.as_str())
            .unwrap_or(&self.coin_type)
    }
}

impl ProtocolConfig {
    /// Pool by symbol, case-insensitive
    pub fn pool(&self, symbol: &str) -> Result<&PoolConfig> {
        self.pools
            .iter()
            .find(|p| p.symbol.eq_ignore_ascii_case(symbol))
            .ok_or_else(|| Error::UnknownPool(symbol.to_string()))
    }

    /// Pool whose coin type matches, comparing canonical forms
    pub fn pool_by_coin_type(&self, coin_type: &str) -> Option<&PoolConfig> {
        let wanted = canonical_coin_type(coin_type).ok()?;
        self.pools.iter().find(|p| {
            canonical_coin_type(&p.coin_type)
                .map(|t| t == wanted)
                .unwrap_or(false)
        })
    }

    /// Normalise any accepted asset form to a canonical coin type
    pub fn resolve_asset(&self, asset: &AssetRef) -> Result<Asset> {
        match asset {
            AssetRef::Symbol(symbol) => {
                let pool = self.pool(symbol)?;
                Ok(Asset {
                    coin_type: canonical_coin_type(&pool.coin_type)?,
                    pool: Some(pool.clone()),
                })
            }
            AssetRef::Pool(pool) => Ok(Asset {
                coin_type: canonical_coin_type(&pool.coin_type)?,
                pool: Some(pool.clone()),
            }),
            AssetRef::CoinType(coin_type) => Ok(Asset {
                coin_type: canonical_coin_type(coin_type)?,
                pool: self.pool_by_coin_type(coin_type).cloned(),
            }),
        }
    }

    /// Fully-qualified function in the protocol package
    pub fn target(&self, module: &str, function: &str) -> String {
        format!("{}::{}::{}", self.package, module, function)
    }

    /// Check for duplicate symbols or asset ids and malformed coin types
    pub fn validate(&self) -> Result<()> {
        for (i, pool) in self.pools.iter().enumerate() {
            canonical_coin_type(&pool.coin_type).map_err(|e| {
                Error::Config(format!("pool {} has a bad coin type: {}", pool.symbol, e))
            })?;

            for other in &self.pools[i + 1..] {
                if pool.symbol.eq_ignore_ascii_case(&other.symbol) {
                    return Err(Error::Config(format!("duplicate pool symbol {}", pool.symbol)));
                }
                if pool.asset_id == other.asset_id {
                    return Err(Error::Config(format!(
                        "pools {} and {} share asset id {}",
                        pool.symbol, other.symbol, pool.asset_id
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        let id = |s: &str| -> ObjectId { s.parse().expect("Invalid built-in protocol object id") };
        Self {
            package: id(DEFAULT_PACKAGE),
            storage: id(DEFAULT_STORAGE),
            price_oracle: id(DEFAULT_PRICE_ORACLE),
            incentive_v1: id(DEFAULT_INCENTIVE_V1),
            incentive_v2: id(DEFAULT_INCENTIVE_V2),
            clock: CLOCK_OBJECT_ID,
            pools: default_pools(),
        }
    }
}

// Mainnet deployment. Package upgrades change DEFAULT_PACKAGE; override in config.
pub const DEFAULT_PACKAGE: &str =
    "0x81c408448d0d57b3e371ea94de1d40bf852784d3e225de1e74acab3e8395c18f";
pub const DEFAULT_STORAGE: &str =
    "0xbb4e2f4b6205c2e2a2db47aeb4f830796ec7c005f88537ee775986639bc442fe";
pub const DEFAULT_PRICE_ORACLE: &str =
    "0x1568865ed9a0b5ec414220e8f79b3d04c77acc82358f6e5ae4635687392ffbef";
pub const DEFAULT_INCENTIVE_V1: &str =
    "0xaaf735bf83ff564e1b219a0d644de894ef5bdc4b2250b126b2a46dd002331821";
pub const DEFAULT_INCENTIVE_V2: &str =
    "0xf87a8acb8b81d14307894d12595541a73f19933f88e1326d5be349c7a6f7559c";

/// (symbol, coin type, decimals, pool id, asset id, borrow parent, supply parent)
type PoolRow = (
    &'static str,
    &'static str,
    u8,
    &'static str,
    u8,
    Option<&'static str>,
    Option<&'static str>,
);

const DEFAULT_POOLS: &[PoolRow] = &[
    (
        "SUI",
        "0x2::sui::SUI",
        9,
        "0x96df0fce3c471489f4debaaa762cf960b3d97820bd1f3f025ff8190730e958c5",
        0,
        Some("0xe7ff0daa9d090727210abe6a8b6c0c5cd483f3692a10610386e4dc9c57871ba7"),
        Some("0x589c83af4b035a3bc64c40d9011397b539b97ea47edf7be8f33d643606bf96f8"),
    ),
    (
        "USDC",
        "0x5d4b302506645c37ff133b98c4b50a5ae14841659738d6d733d59d0d217a93bf::coin::COIN",
        6,
        "0xa02a98f9c88db51c6f5efaaf2261c81f34dd56d86073387e0ef1805ca22e39c8",
        1,
        Some("0x8a3aaa817a811131c624658f6e77cba04ab5829293d2c49c1a9cce8ac9c8dec4"),
        Some("0x8d0a4467806458052d577c8cd2be6031e972f2b8f5f77fce98aa12cd85330da9"),
    ),
    (
        "USDT",
        "0xc060006111016b8a020ad5b33834984a437aaa7d3c74c18e09a95d48aceab08c::coin::COIN",
        6,
        "0x0e060c3b5b8de00fb50511b7a45188c8e34b6995c01f69d98ea5a466fe10d103",
        2,
        Some("0xc14d8292a7d69ae31164bafab7ca8a5bfda11f998540fe976a674ed0673e448f"),
        Some("0x7e2a49ff9d2edd875f82b76a9b21e2a5a098e7130abfd510a203b6ea08ab9257"),
    ),
    (
        "WETH",
        "0xaf8cd5edc19c4512f4259f0bee101a40d41ebed738ade5874359610ef8eeced5::coin::COIN",
        8,
        "0x71b9f6e822c48ce827bceadce82201d6a7559f7b0350ed1daa1dc2ba3ac41b56",
        3,
        None,
        None,
    ),
    (
        "CETUS",
        "0x06864a6f921804860930db6ddbe2e16acdf8504495ea7481637a1c8b9a8fe54b::cetus::CETUS",
        9,
        "0x3c376f857ec4247b8ee456c1db19e9c74e0154d4876915e54221b5052d5b1e2e",
        4,
        None,
        None,
    ),
    (
        "vSui",
        "0x549e8b69270defbfafd4f94e17ec44cdbdd99820b33bda2278dea3b9a32d3f55::cert::CERT",
        9,
        "0x9790c2c272e15b6bf9b341eb531ef16bcc8ed2b20dfda25d060bf47f5dd88d01",
        5,
        None,
        None,
    ),
    (
        "haSui",
        "0xbde4ba4c2e274a60ce15c1cfff9e5c42e41654ac8b6d906a57efa4bd3c29f47d::hasui::HASUI",
        9,
        "0x6fd9cb6ebd76bc80340a9443d72ea0ae282ee20e2fd7544f6ffcd2c070d9557a",
        6,
        None,
        None,
    ),
    (
        "NAVX",
        "0xa99b8952d4f7d947ea77fe0ecdcc9e5fc0bcab2841d6e2a5aa00c3044e5544b5::navx::NAVX",
        9,
        "0xc0e02e7a245e855dd365422faf76f87d9f5b2148a26d48dda6e8253c3fe9fa60",
        7,
        None,
        None,
    ),
];

/// Built-in mainnet pool table
pub fn default_pools() -> Vec<PoolConfig> {
    let id = |s: &str| -> ObjectId { s.parse().expect("Invalid built-in pool object id") };
    DEFAULT_POOLS
        .iter()
        .map(|(symbol, coin_type, decimals, pool_id, asset_id, borrow, supply)| PoolConfig {
            symbol: symbol.to_string(),
            coin_type: coin_type.to_string(),
            decimals: *decimals,
            pool_id: id(*pool_id),
            asset_id: *asset_id,
            borrow_balance_parent_id: borrow.map(|s| id(s)),
            supply_balance_parent_id: supply.map(|s| id(s)),
        })
        .collect()
}
