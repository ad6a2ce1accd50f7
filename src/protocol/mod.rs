//! Lending protocol integration
//!
//! Registry of pools and protocol objects, the Move calls for each lending
//! action, and the read-only views (health factor, positions).

pub mod calls;
pub mod health;
pub mod portfolio;
pub mod registry;

pub use calls::ProtocolCalls;
pub use health::{inspect_call, HealthEvaluator, Projection, RAY};
pub use portfolio::{PoolPosition, PortfolioReader};
pub use registry::{Asset, AssetRef, PoolConfig, ProtocolConfig};
