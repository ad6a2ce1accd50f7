//! NAVI account client
//!
//! Derives an account from a seed phrase, reads balances and positions, and
//! submits deposit, withdraw, borrow and repay transactions.
//!
//! # WARNING
//! - Mutating commands move real funds once confirmed.
//! - Use `--dry-run` to inspect the built transaction first.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use navi_account::cli::commands::{self, ExecOptions, LendingAction};
use navi_account::config::Config;

/// NAVI lending account client
#[derive(Parser)]
#[command(name = "navi")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug, Clone, Copy)]
struct Exec {
    /// Print the built transaction, don't submit
    #[arg(long)]
    dry_run: bool,

    /// Skip confirmation prompt
    #[arg(long)]
    force: bool,
}

impl From<Exec> for ExecOptions {
    fn from(exec: Exec) -> Self {
        ExecOptions {
            dry_run: exec.dry_run,
            force: exec.force,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the account address
    Address,

    /// Show balances (all coin types if ASSET is omitted)
    Balance {
        /// Pool symbol (e.g. SUI) or full coin type
        asset: Option<String>,
    },

    /// List coin objects of one asset
    Coins {
        /// Pool symbol or full coin type
        asset: String,
    },

    /// Send an asset to one or more recipients
    Send {
        /// Pool symbol or full coin type
        asset: String,

        /// Recipient address (repeat for several)
        #[arg(long = "to", required = true, num_args = 1..)]
        to: Vec<String>,

        /// Amount per recipient, in whole units like "1.5"
        #[arg(long = "amount", required = true, num_args = 1..)]
        amount: Vec<String>,

        #[command(flatten)]
        exec: Exec,
    },

    /// Transfer an owned object
    TransferObject {
        /// Object id
        object: String,

        /// Recipient address
        #[arg(long)]
        to: String,

        #[command(flatten)]
        exec: Exec,
    },

    /// Supply an asset to its pool
    Deposit {
        asset: String,
        amount: String,

        /// Deposit on behalf of this account cap
        #[arg(long)]
        account_cap: Option<String>,

        #[command(flatten)]
        exec: Exec,
    },

    /// Withdraw supplied funds
    Withdraw {
        asset: String,
        amount: String,

        /// Withdraw from the position owned by this account cap
        #[arg(long)]
        account_cap: Option<String>,

        #[command(flatten)]
        exec: Exec,
    },

    /// Borrow against supplied collateral
    Borrow {
        asset: String,
        amount: String,

        #[command(flatten)]
        exec: Exec,
    },

    /// Repay borrowed funds
    Repay {
        asset: String,
        amount: String,

        #[command(flatten)]
        exec: Exec,
    },

    /// Create an account cap owned by this account
    CreateAccountCap {
        #[command(flatten)]
        exec: Exec,
    },

    /// Show the current health factor
    Health {
        /// Address to check (default: own account)
        #[arg(long)]
        address: Option<String>,
    },

    /// Show the health factor after a hypothetical change
    HealthDynamic {
        /// Pool symbol
        pool: String,

        /// Supply change, in whole units
        #[arg(long)]
        supply: Option<String>,

        /// Borrow change, in whole units
        #[arg(long)]
        borrow: Option<String>,

        /// Treat the amounts as a decrease
        #[arg(long)]
        decrease: bool,

        /// Address to check (default: own account)
        #[arg(long)]
        address: Option<String>,
    },

    /// Show supply and borrow positions per pool
    Portfolio {
        /// Address to check (default: own account)
        #[arg(long)]
        address: Option<String>,
    },

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("navi_account=info".parse()?),
        )
        .with_target(true)
        .with_line_number(true)
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Address => commands::address(&config),
        Commands::Balance { asset } => commands::balance(&config, asset).await,
        Commands::Coins { asset } => commands::coins(&config, &asset).await,
        Commands::Send {
            asset,
            to,
            amount,
            exec,
        } => commands::send(&config, &asset, &to, &amount, exec.into()).await,
        Commands::TransferObject { object, to, exec } => {
            commands::transfer_object(&config, &object, &to, exec.into()).await
        }
        Commands::Deposit {
            asset,
            amount,
            account_cap,
            exec,
        } => {
            commands::lending(&config, LendingAction::Deposit, &asset, &amount, account_cap, exec.into())
                .await
        }
        Commands::Withdraw {
            asset,
            amount,
            account_cap,
            exec,
        } => {
            commands::lending(&config, LendingAction::Withdraw, &asset, &amount, account_cap, exec.into())
                .await
        }
        Commands::Borrow { asset, amount, exec } => {
            commands::lending(&config, LendingAction::Borrow, &asset, &amount, None, exec.into()).await
        }
        Commands::Repay { asset, amount, exec } => {
            commands::lending(&config, LendingAction::Repay, &asset, &amount, None, exec.into()).await
        }
        Commands::CreateAccountCap { exec } => {
            commands::create_account_cap(&config, exec.into()).await
        }
        Commands::Health { address } => commands::health(&config, address).await,
        Commands::HealthDynamic {
            pool,
            supply,
            borrow,
            decrease,
            address,
        } => commands::health_dynamic(&config, &pool, supply, borrow, decrease, address).await,
        Commands::Portfolio { address } => commands::portfolio(&config, address).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
