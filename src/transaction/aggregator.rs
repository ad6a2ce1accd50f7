//! Coin aggregation
//!
//! Turns the caller's coin objects of one type into fragments of exactly the
//! requested amounts. The native asset is split straight off the gas coin;
//! any other asset folds every listed coin into the first one and splits
//! from there, so each transaction uses a single handle per asset.

use tracing::debug;

use super::draft::{Argument, ObjectInput, TransactionDraft};
use crate::error::{Error, Result};
use crate::ledger::{CoinObject, StructTag};

/// Whether `coin_type` names the native gas coin
pub fn is_native(coin_type: &str) -> bool {
    coin_type
        .parse::<StructTag>()
        .map(|tag| tag.is_native_coin())
        .unwrap_or(false)
}

/// Reject empty or zero requests
pub fn check_amounts(amounts: &[u64]) -> Result<u128> {
    if amounts.is_empty() {
        return Err(Error::InvalidAmount("no amounts requested".into()));
    }
    if amounts.iter().any(|a| *a == 0) {
        return Err(Error::InvalidAmount("amounts must be positive".into()));
    }
    Ok(amounts.iter().map(|a| *a as u128).sum())
}

/// Append the commands producing one fragment per amount
///
/// For the native asset `coins` is ignored. Otherwise the coin list must
/// cover the total; nothing is appended to the draft when it does not.
pub fn aggregate(
    draft: &mut TransactionDraft,
    coin_type: &str,
    amounts: &[u64],
    coins: &[CoinObject],
) -> Result<Vec<Argument>> {
    let required = check_amounts(amounts)?;

    let source = if is_native(coin_type) {
        debug!("Splitting {} fragment(s) from gas", amounts.len());
        draft.gas()
    } else {
        let available: u128 = coins.iter().map(|c| c.balance as u128).sum();
        if coins.is_empty() || available < required {
            return Err(Error::InsufficientBalance {
                coin_type: coin_type.to_string(),
                available,
                required,
            });
        }

        let handles: Vec<Argument> = coins
            .iter()
            .map(|coin| draft.object(ObjectInput::Owned(coin.object_ref())))
            .collect();
        let (target, sources) = handles
            .split_first()
            .ok_or_else(|| Error::TransactionBuild("empty coin list".into()))?;

        debug!("Merging {} coin(s) of {} into one", handles.len(), coin_type);
        for source in sources {
            draft.merge_coins(*target, vec![*source]);
        }
        *target
    };

    let amounts = amounts
        .iter()
        .map(|amount| draft.pure_u64(*amount))
        .collect::<Result<Vec<_>>>()?;
    Ok(draft.split_coins(source, amounts))
}
