//! Health-factor evaluation
//!
//! Both queries are read-only simulations of a protocol view function. The
//! result is an on-chain u256 with 27 decimals; values that fit 128 bits
//! are decoded exactly, larger ones (accounts with no debt) approximately.

use std::sync::Arc;
use tracing::debug;

use super::registry::ProtocolConfig;
use crate::error::{Error, Result};
use crate::ledger::{Address, LedgerClient, ReturnValue, TypeTag};
use crate::transaction::{Input, MoveCall, ObjectInput, TransactionDraft};

/// Fixed-point scale of protocol ratios
pub const RAY: u128 = 1_000_000_000_000_000_000_000_000_000;

const RAY_F64: f64 = 1e27;

/// Run one Move call without committing and return its values
pub async fn inspect_call(
    ledger: &dyn LedgerClient,
    sender: &Address,
    target: &str,
    args: Vec<Input>,
    type_args: Vec<TypeTag>,
) -> Result<Vec<ReturnValue>> {
    let mut draft = TransactionDraft::new();
    draft.set_sender(*sender);
    let arguments = args.into_iter().map(|input| draft.input(input)).collect();
    let call = MoveCall::new(target, type_args, arguments)?;
    draft.move_call(call);

    debug!("Inspecting {}", target);
    let mut results = ledger.dev_inspect(sender, &draft).await?;
    if results.is_empty() {
        return Err(Error::Simulation(format!("{} returned no results", target)));
    }
    Ok(results.swap_remove(0))
}

/// Decode a little-endian u256 ray into a ratio
pub fn decode_ray(bytes: &[u8]) -> Result<f64> {
    if bytes.len() != 32 {
        return Err(Error::Simulation(format!(
            "expected 32-byte u256, got {} bytes",
            bytes.len()
        )));
    }

    let mut low = [0u8; 16];
    let mut high = [0u8; 16];
    low.copy_from_slice(&bytes[..16]);
    high.copy_from_slice(&bytes[16..]);
    let low = u128::from_le_bytes(low);
    let high = u128::from_le_bytes(high);

    if high == 0 {
        let whole = low / RAY;
        let fraction = low % RAY;
        Ok(whole as f64 + fraction as f64 / RAY_F64)
    } else {
        let value = high as f64 * 2f64.powi(128) + low as f64;
        Ok(value / RAY_F64)
    }
}

/// Hypothetical position change for a dynamic health factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    pub supply: u64,
    pub borrow: u64,
    /// Whether the amounts are added to (true) or removed from the position
    pub is_increase: bool,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            supply: 0,
            borrow: 0,
            is_increase: true,
        }
    }
}

/// Reads health factors through simulation
pub struct HealthEvaluator {
    ledger: Arc<dyn LedgerClient>,
    protocol: Arc<ProtocolConfig>,
}

impl HealthEvaluator {
    pub fn new(ledger: Arc<dyn LedgerClient>, protocol: Arc<ProtocolConfig>) -> Self {
        Self { ledger, protocol }
    }

    fn object(id: Address, mutable: bool) -> Input {
        Input::Object(ObjectInput::Id { id, mutable })
    }

    fn pure<T: serde::Serialize>(value: &T) -> Result<Input> {
        Ok(Input::Pure(bcs::to_bytes(value)?))
    }

    /// Current health factor of `address`
    pub async fn evaluate(&self, address: &Address) -> Result<f64> {
        let config = &self.protocol;
        let target = config.target("logic", "user_health_factor");
        let args = vec![
            Self::object(config.clock, false),
            Self::object(config.storage, true),
            Self::object(config.price_oracle, false),
            Self::pure(address)?,
        ];

        let values = inspect_call(self.ledger.as_ref(), address, &target, args, vec![]).await?;
        let hf = first_ray(&values, &target)?;
        debug!("Health factor of {}: {}", address.short_hex(), hf);
        Ok(hf)
    }

    /// Health factor of `address` after applying `projection` in `pool_symbol`
    pub async fn evaluate_dynamic(
        &self,
        address: &Address,
        pool_symbol: &str,
        projection: Projection,
    ) -> Result<f64> {
        let config = &self.protocol;
        let pool = config.pool(pool_symbol)?;
        let target = config.target("dynamic_calculator", "dynamic_health_factor");
        let args = vec![
            Self::object(config.clock, false),
            Self::object(config.storage, true),
            Self::object(config.price_oracle, false),
            Self::object(pool.pool_id, true),
            Self::pure(address)?,
            Self::pure(&pool.asset_id)?,
            Self::pure(&projection.supply)?,
            Self::pure(&projection.borrow)?,
            Self::pure(&projection.is_increase)?,
        ];
        let type_args = vec![pool.coin_type.parse::<TypeTag>()?];

        let values = inspect_call(self.ledger.as_ref(), address, &target, args, type_args).await?;
        let hf = first_ray(&values, &target)?;
        debug!(
            "Projected health factor of {} in {} ({:?}): {}",
            address.short_hex(),
            pool.symbol,
            projection,
            hf
        );
        Ok(hf)
    }
}

fn first_ray(values: &[ReturnValue], target: &str) -> Result<f64> {
    let value = values
        .first()
        .ok_or_else(|| Error::Simulation(format!("{} returned no values", target)))?;
    decode_ray(&value.bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::MockLedger;
    use crate::transaction::Command;

    fn u256(value: u128) -> Vec<u8> {
        let mut bytes = value.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        bytes
    }

    fn ret(bytes: Vec<u8>) -> ReturnValue {
        ReturnValue {
            bytes,
            type_: "u256".to_string(),
        }
    }

    fn setup(ledger: MockLedger) -> (HealthEvaluator, Arc<MockLedger>) {
        let ledger = Arc::new(ledger);
        let evaluator = HealthEvaluator::new(ledger.clone(), Arc::new(ProtocolConfig::default()));
        (evaluator, ledger)
    }

    #[test]
    fn test_decode_exact() {
        assert_eq!(decode_ray(&u256(1_500_000_000_000_000_000_000_000_000)).unwrap(), 1.5);
        assert_eq!(decode_ray(&u256(RAY)).unwrap(), 1.0);
        assert_eq!(decode_ray(&u256(0)).unwrap(), 0.0);
    }

    #[test]
    fn test_decode_large_value() {
        let hf = decode_ray(&[0xff; 32]).unwrap();
        assert!(hf > 1e49);
    }

    #[test]
    fn test_decode_bad_shape() {
        assert!(matches!(decode_ray(&[1, 2, 3]), Err(Error::Simulation(_))));
    }

    #[tokio::test]
    async fn test_evaluate() {
        let (evaluator, ledger) = setup(
            MockLedger::new().with_inspect_result(vec![ret(u256(2 * RAY + RAY / 4))]),
        );
        let user = Address::from_u8(0x5);

        let hf = evaluator.evaluate(&user).await.unwrap();
        assert_eq!(hf, 2.25);

        let inspected = ledger.inspected.lock().unwrap();
        let call = inspected[0].move_calls()[0].clone();
        assert_eq!(call.module, "logic");
        assert_eq!(call.function, "user_health_factor");
        assert_eq!(call.arguments.len(), 4);
    }

    #[tokio::test]
    async fn test_evaluate_dynamic_call_shape() {
        let (evaluator, ledger) =
            setup(MockLedger::new().with_inspect_result(vec![ret(u256(RAY))]));
        let projection = Projection {
            supply: 0,
            borrow: 1_000,
            is_increase: true,
        };

        let hf = evaluator
            .evaluate_dynamic(&Address::from_u8(0x5), "USDC", projection)
            .await
            .unwrap();
        assert_eq!(hf, 1.0);

        let inspected = ledger.inspected.lock().unwrap();
        match &inspected[0].commands()[0] {
            Command::MoveCall(call) => {
                assert_eq!(call.function, "dynamic_health_factor");
                assert_eq!(call.arguments.len(), 9);
                assert_eq!(call.type_arguments.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        // Last argument is the encoded direction flag
        assert_eq!(inspected[0].inputs().last(), Some(&Input::Pure(vec![1])));
    }

    #[tokio::test]
    async fn test_unknown_pool() {
        let (evaluator, ledger) = setup(MockLedger::new());
        let err = evaluator
            .evaluate_dynamic(&Address::from_u8(1), "NOPE", Projection::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownPool(_)));
        assert!(ledger.inspected.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_simulation_errors() {
        let (evaluator, _) = setup(MockLedger::new().with_inspect_error("MoveAbort 12"));
        assert!(matches!(
            evaluator.evaluate(&Address::from_u8(1)).await,
            Err(Error::Simulation(_))
        ));

        let (evaluator, _) = setup(MockLedger::new().with_inspect_result(vec![]));
        assert!(matches!(
            evaluator.evaluate(&Address::from_u8(1)).await,
            Err(Error::Simulation(_))
        ));

        let (evaluator, _) = setup(MockLedger::new());
        assert!(matches!(
            evaluator.evaluate(&Address::from_u8(1)).await,
            Err(Error::Simulation(_))
        ));
    }

    #[test]
    fn test_default_projection_increases() {
        let p = Projection::default();
        assert!(p.is_increase);
        assert_eq!((p.supply, p.borrow), (0, 0));
    }
}
