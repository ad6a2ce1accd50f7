//! Protocol call builders
//!
//! Each method appends the Move calls that achieve one lending action to a
//! draft. Supply-side actions consume a coin argument; withdraw and borrow
//! produce a balance which is wrapped into a coin and sent to `recipient`.

use tracing::debug;

use super::registry::{PoolConfig, ProtocolConfig};
use crate::error::Result;
use crate::ledger::{Address, ObjectId, TypeTag};
use crate::transaction::{Argument, MoveCall, TransactionDraft};

const INCENTIVE_MODULE: &str = "incentive_v2";
const LENDING_MODULE: &str = "lending";

/// Wraps a `Balance<T>` into a `Coin<T>`
const COIN_FROM_BALANCE: &str = "0x2::coin::from_balance";

/// Appends protocol calls using one protocol deployment
pub struct ProtocolCalls<'a> {
    config: &'a ProtocolConfig,
}

/// Shared objects every lending call touches
struct CommonObjects {
    clock: Argument,
    storage: Argument,
    pool: Argument,
    asset_id: Argument,
}

impl<'a> ProtocolCalls<'a> {
    pub fn new(config: &'a ProtocolConfig) -> Self {
        Self { config }
    }

    fn coin_type(pool: &PoolConfig) -> Result<Vec<TypeTag>> {
        Ok(vec![pool.coin_type.parse()?])
    }

    fn common(&self, draft: &mut TransactionDraft, pool: &PoolConfig) -> Result<CommonObjects> {
        Ok(CommonObjects {
            clock: draft.object_id(self.config.clock, false),
            storage: draft.object_id(self.config.storage, true),
            pool: draft.object_id(pool.pool_id, true),
            asset_id: draft.pure(&pool.asset_id)?,
        })
    }

    fn oracle(&self, draft: &mut TransactionDraft) -> Argument {
        draft.object_id(self.config.price_oracle, false)
    }

    fn incentive_v1(&self, draft: &mut TransactionDraft) -> Argument {
        draft.object_id(self.config.incentive_v1, true)
    }

    fn incentive_v2(&self, draft: &mut TransactionDraft) -> Argument {
        draft.object_id(self.config.incentive_v2, true)
    }

    fn call(
        &self,
        draft: &mut TransactionDraft,
        function: &str,
        pool: &PoolConfig,
        arguments: Vec<Argument>,
    ) -> Result<Argument> {
        let target = self.config.target(INCENTIVE_MODULE, function);
        debug!("Appending {} for {}", target, pool.symbol);
        let call = MoveCall::new(&target, Self::coin_type(pool)?, arguments)?;
        Ok(draft.move_call(call))
    }

    /// Turn a returned balance into a coin owned by `recipient`
    fn send_balance(
        &self,
        draft: &mut TransactionDraft,
        pool: &PoolConfig,
        balance: Argument,
        recipient: Address,
    ) -> Result<Argument> {
        let call = MoveCall::new(COIN_FROM_BALANCE, Self::coin_type(pool)?, vec![balance])?;
        let coin = draft.move_call(call);
        let recipient = draft.pure_address(recipient)?;
        draft.transfer_objects(vec![coin], recipient);
        Ok(coin)
    }

    /// Supply `coin` to the pool
    pub fn deposit(
        &self,
        draft: &mut TransactionDraft,
        pool: &PoolConfig,
        coin: Argument,
        amount: u64,
    ) -> Result<()> {
        let common = self.common(draft, pool)?;
        let amount = draft.pure_u64(amount)?;
        let v1 = self.incentive_v1(draft);
        let v2 = self.incentive_v2(draft);

        self.call(
            draft,
            "entry_deposit",
            pool,
            vec![
                common.clock,
                common.storage,
                common.pool,
                common.asset_id,
                coin,
                amount,
                v1,
                v2,
            ],
        )?;
        Ok(())
    }

    /// Supply `coin` on behalf of the position behind `account_cap`
    pub fn deposit_with_account_cap(
        &self,
        draft: &mut TransactionDraft,
        pool: &PoolConfig,
        coin: Argument,
        account_cap: ObjectId,
    ) -> Result<()> {
        let common = self.common(draft, pool)?;
        let v1 = self.incentive_v1(draft);
        let v2 = self.incentive_v2(draft);
        let cap = draft.object_id(account_cap, false);

        self.call(
            draft,
            "deposit_with_account_cap",
            pool,
            vec![
                common.clock,
                common.storage,
                common.pool,
                common.asset_id,
                coin,
                v1,
                v2,
                cap,
            ],
        )?;
        Ok(())
    }

    /// Withdraw `amount` and send the coin to `recipient`
    pub fn withdraw(
        &self,
        draft: &mut TransactionDraft,
        pool: &PoolConfig,
        amount: u64,
        recipient: Address,
    ) -> Result<Argument> {
        let common = self.common(draft, pool)?;
        let oracle = self.oracle(draft);
        let amount = draft.pure_u64(amount)?;
        let v1 = self.incentive_v1(draft);
        let v2 = self.incentive_v2(draft);

        let balance = self.call(
            draft,
            "withdraw",
            pool,
            vec![
                common.clock,
                oracle,
                common.storage,
                common.pool,
                common.asset_id,
                amount,
                v1,
                v2,
            ],
        )?;
        self.send_balance(draft, pool, balance, recipient)
    }

    /// Withdraw from the position behind `account_cap`
    pub fn withdraw_with_account_cap(
        &self,
        draft: &mut TransactionDraft,
        pool: &PoolConfig,
        amount: u64,
        account_cap: ObjectId,
        recipient: Address,
    ) -> Result<Argument> {
        let common = self.common(draft, pool)?;
        let oracle = self.oracle(draft);
        let amount = draft.pure_u64(amount)?;
        let v1 = self.incentive_v1(draft);
        let v2 = self.incentive_v2(draft);
        let cap = draft.object_id(account_cap, false);

        let balance = self.call(
            draft,
            "withdraw_with_account_cap",
            pool,
            vec![
                common.clock,
                oracle,
                common.storage,
                common.pool,
                common.asset_id,
                amount,
                v1,
                v2,
                cap,
            ],
        )?;
        self.send_balance(draft, pool, balance, recipient)
    }

    /// Borrow `amount` and send the coin to `recipient`
    pub fn borrow(
        &self,
        draft: &mut TransactionDraft,
        pool: &PoolConfig,
        amount: u64,
        recipient: Address,
    ) -> Result<Argument> {
        let common = self.common(draft, pool)?;
        let oracle = self.oracle(draft);
        let amount = draft.pure_u64(amount)?;
        let v2 = self.incentive_v2(draft);

        let balance = self.call(
            draft,
            "borrow",
            pool,
            vec![
                common.clock,
                oracle,
                common.storage,
                common.pool,
                common.asset_id,
                amount,
                v2,
            ],
        )?;
        self.send_balance(draft, pool, balance, recipient)
    }

    /// Repay debt with `coin`
    pub fn repay(
        &self,
        draft: &mut TransactionDraft,
        pool: &PoolConfig,
        coin: Argument,
        amount: u64,
    ) -> Result<()> {
        let common = self.common(draft, pool)?;
        let oracle = self.oracle(draft);
        let amount = draft.pure_u64(amount)?;
        let v2 = self.incentive_v2(draft);

        self.call(
            draft,
            "entry_repay",
            pool,
            vec![
                common.clock,
                oracle,
                common.storage,
                common.pool,
                common.asset_id,
                coin,
                amount,
                v2,
            ],
        )?;
        Ok(())
    }

    /// Create a new account capability and send it to `recipient`
    pub fn create_account_cap(
        &self,
        draft: &mut TransactionDraft,
        recipient: Address,
    ) -> Result<Argument> {
        let target = self.config.target(LENDING_MODULE, "create_account");
        let cap = draft.move_call(MoveCall::new(&target, vec![], vec![])?);
        let recipient = draft.pure_address(recipient)?;
        draft.transfer_objects(vec![cap], recipient);
        Ok(cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{Command, Input, ObjectInput};

    fn setup() -> (ProtocolConfig, PoolConfig) {
        let config = ProtocolConfig::default();
        let pool = config.pool("USDC").unwrap().clone();
        (config, pool)
    }

    #[test]
    fn test_deposit_call_shape() {
        let (config, pool) = setup();
        let calls = ProtocolCalls::new(&config);
        let mut draft = TransactionDraft::new();

        calls.deposit(&mut draft, &pool, Argument::GasCoin, 100).unwrap();

        let moves = draft.move_calls();
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].function, "entry_deposit");
        assert_eq!(moves[0].module, "incentive_v2");
        assert_eq!(moves[0].arguments.len(), 8);
        assert_eq!(moves[0].arguments[4], Argument::GasCoin);
        assert_eq!(moves[0].type_arguments[0].to_string(), pool.coin_type.parse::<TypeTag>().unwrap().to_string());
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_clock_is_immutable_and_storage_mutable() {
        let (config, pool) = setup();
        let calls = ProtocolCalls::new(&config);
        let mut draft = TransactionDraft::new();
        calls.deposit(&mut draft, &pool, Argument::GasCoin, 1).unwrap();

        assert!(draft.inputs().contains(&Input::Object(ObjectInput::Id {
            id: config.clock,
            mutable: false
        })));
        assert!(draft.inputs().contains(&Input::Object(ObjectInput::Id {
            id: config.storage,
            mutable: true
        })));
    }

    #[test]
    fn test_withdraw_sends_coin_to_recipient() {
        let (config, pool) = setup();
        let calls = ProtocolCalls::new(&config);
        let mut draft = TransactionDraft::new();
        let me = Address::from_u8(0xaa);

        calls.withdraw(&mut draft, &pool, 500, me).unwrap();

        let functions: Vec<&str> = draft
            .move_calls()
            .iter()
            .map(|c| c.function.as_str())
            .collect();
        assert_eq!(functions, vec!["withdraw", "from_balance"]);
        assert_eq!(draft.transfer_count(), 1);
        assert!(matches!(
            draft.commands().last(),
            Some(Command::TransferObjects { objects, .. }) if objects == &vec![Argument::Result(1)]
        ));
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_account_cap_variants_pass_the_cap_last() {
        let (config, pool) = setup();
        let calls = ProtocolCalls::new(&config);
        let cap = Address::from_u8(0xcc);

        let mut draft = TransactionDraft::new();
        calls
            .deposit_with_account_cap(&mut draft, &pool, Argument::GasCoin, cap)
            .unwrap();
        let call = draft.move_calls()[0].clone();
        let last = *call.arguments.last().unwrap();
        assert_eq!(
            draft.inputs()[match last {
                Argument::Input(i) => i as usize,
                other => panic!("unexpected {:?}", other),
            }],
            Input::Object(ObjectInput::Id { id: cap, mutable: false })
        );

        let mut draft = TransactionDraft::new();
        calls
            .withdraw_with_account_cap(&mut draft, &pool, 10, cap, Address::from_u8(1))
            .unwrap();
        assert_eq!(draft.move_calls()[0].function, "withdraw_with_account_cap");
        assert_eq!(draft.move_calls()[0].arguments.len(), 9);
    }

    #[test]
    fn test_create_account_cap() {
        let (config, _) = setup();
        let calls = ProtocolCalls::new(&config);
        let mut draft = TransactionDraft::new();
        calls.create_account_cap(&mut draft, Address::from_u8(1)).unwrap();

        assert_eq!(draft.move_calls()[0].module, "lending");
        assert!(draft.move_calls()[0].type_arguments.is_empty());
        assert_eq!(draft.transfer_count(), 1);
    }
}
