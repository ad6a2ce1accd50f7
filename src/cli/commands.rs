//! CLI command implementations

use anyhow::{Context, Result};
use dialoguer::Confirm;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::ledger::{Address, JsonRpcLedger, LedgerClient, ObjectId, TransactionResult};
use crate::protocol::{AssetRef, Projection, ProtocolConfig};
use crate::transaction::TransactionDraft;
use crate::wallet::signer::derivation_path;
use crate::wallet::{format_units, parse_units, AccountManager, MnemonicSigner, TransactionSigner};

/// Health factors above this are reported as "no debt"
const NO_DEBT_THRESHOLD: f64 = 1e20;

/// Options shared by every mutating command
#[derive(Debug, Clone, Copy)]
pub struct ExecOptions {
    /// Print the draft instead of submitting
    pub dry_run: bool,
    /// Skip the confirmation prompt
    pub force: bool,
}

/// Lending actions that take an asset and an amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LendingAction {
    Deposit,
    Withdraw,
    Borrow,
    Repay,
}

impl LendingAction {
    fn verb(&self) -> &'static str {
        match self {
            LendingAction::Deposit => "Deposit",
            LendingAction::Withdraw => "Withdraw",
            LendingAction::Borrow => "Borrow",
            LendingAction::Repay => "Repay",
        }
    }
}

fn account(config: &Config) -> Result<AccountManager> {
    let ledger: Arc<dyn LedgerClient> = Arc::new(JsonRpcLedger::new(
        &config.rpc.endpoint,
        Duration::from_millis(config.rpc.timeout_ms),
    )?);
    let signer = MnemonicSigner::from_env(&config.wallet.mnemonic_env, config.wallet.account_index)
        .with_context(|| {
            format!(
                "Set {} to the account's seed phrase",
                config.wallet.mnemonic_env
            )
        })?;

    Ok(AccountManager::new(
        ledger,
        Arc::new(config.protocol.clone()),
        Arc::new(signer),
        config.transaction.gas_budget,
    ))
}

fn parse_address(s: &str) -> Result<Address> {
    s.parse::<Address>()
        .with_context(|| format!("Invalid address: {}", s))
}

async fn to_units(account: &AccountManager, asset: &AssetRef, amount: &str) -> Result<u64> {
    let decimals = account.balances().resolve_decimals(asset).await?;
    Ok(parse_units(amount, decimals)?)
}

fn format_health_factor(hf: f64) -> String {
    if hf > NO_DEBT_THRESHOLD {
        "no debt".to_string()
    } else {
        format!("{:.4}", hf)
    }
}

fn print_draft(draft: &TransactionDraft) {
    println!("\n=== DRY RUN ===");
    if let Some(sender) = draft.sender() {
        println!("Sender: {}", sender);
    }
    println!("Inputs: {}", draft.inputs().len());
    println!("Commands:");
    for (i, command) in draft.commands().iter().enumerate() {
        println!("  {}. {}", i, command.label());
    }
}

fn print_result(result: &TransactionResult) {
    println!("\nTransaction: {}", result.digest);
    println!("Status: {}", if result.success { "success" } else { "failure" });
    if let Some(gas) = result.gas_used {
        println!("Gas used: {}", format_units(gas as u128, 9));
    }
}

/// Preview, confirm and submit `draft`
async fn finish(
    account: &AccountManager,
    draft: TransactionDraft,
    prompt: String,
    opts: ExecOptions,
) -> Result<()> {
    if opts.dry_run {
        print_draft(&draft);
        return Ok(());
    }

    if !opts.force {
        let confirmed = Confirm::new()
            .with_prompt(format!("{} This cannot be undone.", prompt))
            .default(false)
            .interact()?;

        if !confirmed {
            info!("Cancelled by user");
            return Ok(());
        }
    }

    let result = account.execute(draft).await?;
    print_result(&result);
    Ok(())
}

/// Show the account address
pub fn address(config: &Config) -> Result<()> {
    let signer = MnemonicSigner::from_env(&config.wallet.mnemonic_env, config.wallet.account_index)?;
    println!("Address: {}", signer.address());
    println!("Derivation path: {}", derivation_path(signer.account_index()));
    Ok(())
}

/// Show one asset's balance, or every balance the account holds
pub async fn balance(config: &Config, asset: Option<String>) -> Result<()> {
    let account = account(config)?;

    println!("\n=== BALANCES: {} ===\n", account.address());

    if let Some(asset) = asset {
        let asset: AssetRef = asset.parse()?;
        let total = account.balance(&asset).await?;
        let decimals = account.balances().resolve_decimals(&asset).await?;
        println!("{}: {}", asset, format_units(total, decimals));
        return Ok(());
    }

    let balances = account.all_balances().await?;
    if balances.is_empty() {
        println!("No coins.");
    }
    for balance in balances {
        let asset = AssetRef::CoinType(balance.coin_type.clone());
        match account.balances().resolve_decimals(&asset).await {
            Ok(decimals) => println!(
                "{}: {} ({} object(s))",
                balance.coin_type,
                format_units(balance.total_balance, decimals),
                balance.coin_object_count
            ),
            Err(_) => println!(
                "{}: {} raw ({} object(s))",
                balance.coin_type, balance.total_balance, balance.coin_object_count
            ),
        }
    }
    Ok(())
}

/// List coin objects of one asset
pub async fn coins(config: &Config, asset: &str) -> Result<()> {
    let account = account(config)?;
    let asset: AssetRef = asset.parse()?;
    let coins = account.coins(&asset).await?;

    println!("\n=== {} COINS ({}) ===\n", asset, coins.len());
    for coin in &coins {
        println!("{}  {}  v{}", coin.object_id, coin.balance, coin.version);
    }
    Ok(())
}

/// Send an asset to one or more recipients
pub async fn send(
    config: &Config,
    asset: &str,
    recipients: &[String],
    amounts: &[String],
    opts: ExecOptions,
) -> Result<()> {
    let account = account(config)?;
    let asset: AssetRef = asset.parse()?;

    let recipients = recipients
        .iter()
        .map(|r| parse_address(r))
        .collect::<Result<Vec<_>>>()?;
    let mut units = Vec::with_capacity(amounts.len());
    for amount in amounts {
        units.push(to_units(&account, &asset, amount).await?);
    }

    let draft = account
        .builder()
        .build_send_many(account.address(), &asset, &recipients, &units)
        .await?;

    let prompt = format!(
        "Send {} {} to {} recipient(s)?",
        amounts.join(" + "),
        asset,
        recipients.len()
    );
    finish(&account, draft, prompt, opts).await
}

/// Transfer an owned object
pub async fn transfer_object(
    config: &Config,
    object_id: &str,
    recipient: &str,
    opts: ExecOptions,
) -> Result<()> {
    let account = account(config)?;
    let object_id: ObjectId = parse_address(object_id)?;
    let recipient = parse_address(recipient)?;

    let draft = account
        .builder()
        .build_transfer_object(account.address(), object_id, recipient)
        .await?;

    let prompt = format!("Transfer object {} to {}?", object_id, recipient);
    finish(&account, draft, prompt, opts).await
}

/// Deposit, withdraw, borrow or repay
pub async fn lending(
    config: &Config,
    action: LendingAction,
    asset: &str,
    amount: &str,
    account_cap: Option<String>,
    opts: ExecOptions,
) -> Result<()> {
    let account = account(config)?;
    let asset: AssetRef = asset.parse()?;
    config
        .protocol
        .resolve_asset(&asset)?
        .require_pool()
        .map_err(anyhow::Error::from)
        .with_context(|| format!("Known pools: {}", pool_symbols(&config.protocol)))?;
    let units = to_units(&account, &asset, amount).await?;
    let cap = account_cap.as_deref().map(parse_address).transpose()?;
    let sender = account.address();
    let builder = account.builder();

    let draft = match (action, cap) {
        (LendingAction::Deposit, None) => builder.build_deposit(sender, &asset, units).await?,
        (LendingAction::Deposit, Some(cap)) => {
            builder
                .build_deposit_with_account_cap(sender, &asset, units, cap)
                .await?
        }
        (LendingAction::Withdraw, None) => builder.build_withdraw(sender, &asset, units).await?,
        (LendingAction::Withdraw, Some(cap)) => {
            builder
                .build_withdraw_with_account_cap(sender, &asset, units, cap)
                .await?
        }
        (LendingAction::Borrow, None) => builder.build_borrow(sender, &asset, units).await?,
        (LendingAction::Repay, None) => builder.build_repay(sender, &asset, units).await?,
        (other, Some(_)) => {
            anyhow::bail!("{} does not support --account-cap", other.verb())
        }
    };

    let prompt = format!("{} {} {}?", action.verb(), amount, asset);
    finish(&account, draft, prompt, opts).await
}

/// Create a new account capability
pub async fn create_account_cap(config: &Config, opts: ExecOptions) -> Result<()> {
    let account = account(config)?;
    let draft = account.builder().build_create_account_cap(account.address())?;
    finish(&account, draft, "Create a new account cap?".to_string(), opts).await
}

/// Show the current health factor
pub async fn health(config: &Config, address: Option<String>) -> Result<()> {
    let account = account(config)?;
    let address = address.as_deref().map(parse_address).transpose()?;
    let hf = account.health_factor(address).await?;

    println!(
        "Health factor of {}: {}",
        address.unwrap_or_else(|| account.address()),
        format_health_factor(hf)
    );
    Ok(())
}

/// Show the health factor after a hypothetical change in one pool
pub async fn health_dynamic(
    config: &Config,
    pool: &str,
    supply: Option<String>,
    borrow: Option<String>,
    decrease: bool,
    address: Option<String>,
) -> Result<()> {
    let account = account(config)?;
    let address = address.as_deref().map(parse_address).transpose()?;
    let decimals = config.protocol.pool(pool)?.decimals;

    let units = |amount: Option<String>| -> Result<u64> {
        match amount {
            Some(a) => Ok(parse_units(&a, decimals)?),
            None => Ok(0),
        }
    };
    let projection = Projection {
        supply: units(supply)?,
        borrow: units(borrow)?,
        is_increase: !decrease,
    };

    let hf = account
        .dynamic_health_factor(address, pool, projection)
        .await?;
    println!(
        "Projected health factor in {} ({}): {}",
        pool,
        if decrease { "decrease" } else { "increase" },
        format_health_factor(hf)
    );
    Ok(())
}

/// Show supply and borrow positions across pools
pub async fn portfolio(config: &Config, address: Option<String>) -> Result<()> {
    let account = account(config)?;
    let address = address.as_deref().map(parse_address).transpose()?;
    let positions = account.portfolio(address).await?;

    println!("\n=== PORTFOLIO ===\n");
    println!("{:<8} {:>40} {:>40}", "POOL", "SUPPLY", "BORROW");
    for (symbol, position) in &positions {
        println!("{:<8} {:>40} {:>40}", symbol, position.supply, position.borrow);
    }
    if positions.values().all(|p| p.is_empty()) {
        println!("\nNo open positions.");
    }
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Pools known to the registry, for help output
pub fn pool_symbols(protocol: &ProtocolConfig) -> String {
    protocol
        .pools
        .iter()
        .map(|p| p.symbol.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
